//! pagepack library
//!
//! Core functionality for the pagepack build pipeline.

pub mod assets;
pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use error::BuildError;
pub use pipeline::Pipeline;
