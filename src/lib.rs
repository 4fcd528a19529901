pub mod config;
pub mod download;
mod error;
pub mod formats;
pub mod http;
pub mod locator;
pub mod paths;
pub mod reddit;
pub mod resolve;
pub mod scanner;
pub mod sources;

pub use error::{EngineError, Result};
