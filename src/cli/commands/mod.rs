//! CLI command implementations

pub mod build;
pub mod config;
pub mod launch;
pub mod preflight;

pub use build::execute as build;
pub use config::execute as config;
pub use launch::execute as launch;
pub use preflight::execute as preflight;
