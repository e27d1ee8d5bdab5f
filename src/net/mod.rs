//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenAddr (address.rs)
//!     → socket.rs (socket2 options: SO_REUSEPORT, SO_RCVBUF)
//!     → udp.rs   (reader pool, one socket per worker)
//!     → tcp.rs   (accept loop, tls.rs handshake per connection)
//!     → unix.rs  (lock.rs path lock, accept relay + dispatch)
//!     → ListenerHandle (listener.rs), closed once resources are released
//! ```
//!
//! # Design Decisions
//! - Bind failures surface before any task is spawned
//! - Every long-running task is spawned through the supervisor
//! - TLS is optional and handled transparently on TCP

pub mod address;
pub mod listener;
pub mod lock;
pub mod pool;
pub mod socket;
pub mod tcp;
pub mod tls;
pub mod udp;
pub mod unix;

pub use address::{AddressError, ListenAddr};
pub use listener::{ListenerError, ListenerHandle};
pub use pool::PacketPool;
