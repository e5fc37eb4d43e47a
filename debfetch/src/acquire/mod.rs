//! Method coordinator for repository downloads.
//!
//! Network access is delegated to external acquisition method programs, one
//! process per base URI. This module starts them, speaks their line protocol
//! over the child's standard input and output, and multiplexes all of them
//! from a single thread:
//! - Download requests and their fallback/redirect policy (`request`)
//! - Per-method FIFO with a send cursor (`queue`)
//! - Block framing and command encoding (`codec`)
//! - Non-blocking channels and the readiness wait (`channel`)
//! - Spawning and reaping children (`process`)
//! - Method state machine and status dispatch (`method`)
//! - Registry and run loop (`registry`)
//!
//! # Architecture
//!
//! ```text
//! MethodRegistry (run loop)
//!         │
//!         ├── MethodProcess ("http")
//!         │       ├── MethodChannels (stdin / stdout of the child)
//!         │       ├── BlockReader / PendingWrite
//!         │       └── RequestQueue ── DownloadRequest ...
//!         │
//!         ├── MethodProcess ("ftp") ...
//!         │
//!         └── Uncompressor (co-reaped helper children)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use debfetch::acquire::MethodRegistry;
//! use debfetch::config::RunConfig;
//!
//! let mut registry = MethodRegistry::new(RunConfig::new("/usr/lib/apt/methods"));
//! let http = registry.new_method("http://deb.debian.org/debian", None, &[])?;
//! registry.enqueue(http, "pool/main/h/hello/hello_2.10-3_amd64.deb", "/tmp/hello.deb", |delivery| {
//!     println!("{:?}", delivery.outcome);
//!     Ok(())
//! })?;
//!
//! let report = registry.run()?;
//! let leftovers = registry.shutdown()?;
//! ```

mod channel;
mod codec;
mod error;
mod method;
mod process;
mod queue;
mod registry;
mod report;
mod request;
mod uncompress;

pub use codec::{Block, BlockReader, Command, StatusCode};
pub use error::{AcquireError, AcquireResult, ProtocolError};
pub use method::{MethodProcess, MethodStatus};
pub use queue::{RequestId, RequestQueue};
pub use registry::{parse_scheme, MethodHandle, MethodRegistry};
pub use report::{FailedDownload, RunReport};
pub use request::{
    join_uri, CallbackResult, Delivery, DownloadCallback, DownloadRequest, Outcome, RetryDecision,
    MAX_REDIRECTS,
};
pub use uncompress::{NoUncompressor, Uncompressor};
