#[allow(clippy::module_inception)]
mod coordinator;
mod settings;

pub use {
    coordinator::{Coordinator, Dispatch},
    settings::CoordinatorSettings,
};
