pub mod common;
pub mod compare;
pub mod config;
pub mod sync;

pub use common::Outcome;
pub use compare::Compare;
pub use config::Config;
pub use sync::Synchronize;
