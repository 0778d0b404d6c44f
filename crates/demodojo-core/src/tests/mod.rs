mod coordinator;
mod message;
mod sequence;
mod store;
mod support;
