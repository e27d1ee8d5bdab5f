//! Intake subsystem: the entry points that bring listeners up.
//!
//! # Data Flow
//! ```text
//! ListenAddr + PacketPool
//!     → dispatch.rs (pick the transport manager for this intake)
//!     → net::{udp, tcp, unix} (bind, spawn supervised tasks)
//!     → stream.rs (per-connection readers)
//!     → handler.rs (PacketHandler receives raw packets)
//! ```
//!
//! # Design Decisions
//! - Metrics intake speaks UDP and TCP; trace intake speaks UDP and Unix
//! - Setup errors are returned, never swallowed: a missing listener is fatal

pub mod dispatch;
pub mod handler;
pub mod server;
pub mod stream;

pub use dispatch::{start_ssf, start_statsd};
pub use handler::{LoggingHandler, PacketHandler};
pub use server::{IntakeServer, IntakeSettings};
