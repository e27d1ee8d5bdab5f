//! Host diagnostics exposed alongside the listeners.

pub mod softnet;

pub use softnet::{parse_softnet, read_stats, SoftnetData, SoftnetError, SoftnetProcessor, SoftnetReporter};
