//! Stoker - forum service launch orchestrator
//!
//! Takes a freshly deployed host from "code present, nothing running" to
//! "service accepting traffic" and supervises the service process
//! afterward.

pub mod assets;
pub mod build;
pub mod cache;
pub mod cli;
pub mod configfile;
pub mod error;
pub mod preflight;
pub mod probe;
pub mod settings;
pub mod shutdown;
pub mod supervise;

pub use error::{StokerError, StokerResult};
