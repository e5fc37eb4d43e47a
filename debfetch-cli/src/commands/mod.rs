//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration display (path, show)
//! - [`fetch`] - Download files below a base URI
//! - [`index`] - Download suite index files
//! - [`init`] - Configuration initialization

pub mod common;
pub mod config;
pub mod fetch;
pub mod index;
pub mod init;
