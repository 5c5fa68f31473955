pub mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod import;
pub mod model;
mod utils;

#[cfg(test)]
mod test;

pub use api::Mode;
pub use config::Config;
pub use error::{Error, ImportError, Result};
