pub mod config;
pub mod error;
pub mod hook;
pub mod io;
pub mod matcher;
pub mod paths;
pub mod policy;
pub mod record;
pub mod reporter;
pub mod runner;
pub mod settings;
pub mod store;

pub use error::{GateError, Result};
