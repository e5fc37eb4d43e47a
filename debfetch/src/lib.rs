//! debfetch - download coordination for Debian-style repositories
//!
//! This library fetches repository files (index files, `.deb` and `.dsc`
//! files) by driving apt acquisition method programs, one child process per
//! base URI, from a single thread.

pub mod acquire;
pub mod checksums;
pub mod config;
pub mod logging;

/// Version of the debfetch library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
