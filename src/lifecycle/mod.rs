//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Start supervisor → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → trigger() → every listener task stops accepting
//!     → Unix listener releases its lock → completion handles fire
//!
//! Supervision (supervisor.rs):
//!     task exit → channel → collector → crash reporter
//!     fatal exit → crash reporter → trigger()
//! ```
//!
//! # Design Decisions
//! - Shutdown is write-once; it can never be reset
//! - Task failures are values sent over a channel, not unwinding
//! - Shutdown has timeout: the binary stops waiting after a deadline

pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use supervisor::{CrashReport, CrashReporter, LogCrashReporter, Supervisor, TaskError, TaskFailure};
