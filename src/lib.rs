//! Telemetry intake listeners.
//!
//! Brings up the network listeners of a telemetry intake: statsd metrics
//! over UDP and TCP (optionally TLS), SSF traces over UDP and Unix sockets.
//! Decoded packets are handed to a [`PacketHandler`].

pub mod config;
pub mod diagnostics;
pub mod intake;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::IntakeConfig;
pub use intake::{IntakeServer, IntakeSettings, PacketHandler};
pub use lifecycle::Shutdown;
pub use net::{ListenAddr, ListenerError, ListenerHandle};
