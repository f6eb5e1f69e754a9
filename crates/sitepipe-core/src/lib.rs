//! sitepipe Core Library
//!
//! Configuration, build modes and error handling shared by the pipeline and
//! the CLI.

pub mod config;
pub mod error;
pub mod layout;

pub use config::{Config, glob_base};
pub use error::{CoreError, Result};
pub use layout::{BuildMode, Layout};
