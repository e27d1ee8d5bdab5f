//! Reusable packet buffers for the read loops.

use std::sync::Mutex;

/// Upper bound on idle buffers kept around.
const MAX_IDLE: usize = 256;

/// A pool of fixed-size byte buffers.
///
/// The read loops never look inside a buffer beyond what they received;
/// the pool exists only to avoid an allocation per datagram.
#[derive(Debug)]
pub struct PacketPool {
    buffer_len: usize,
    idle: Mutex<Vec<Vec<u8>>>,
}

impl PacketPool {
    pub fn new(buffer_len: usize) -> Self {
        Self {
            buffer_len,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Size of every buffer handed out.
    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Take a buffer of exactly `buffer_len` bytes.
    pub fn take(&self) -> Vec<u8> {
        let reused = self.idle.lock().unwrap_or_else(|e| e.into_inner()).pop();
        reused.unwrap_or_else(|| vec![0; self.buffer_len])
    }

    /// Return a buffer. Buffers of the wrong size are discarded.
    pub fn give(&self, buf: Vec<u8>) {
        if buf.len() != self.buffer_len {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < MAX_IDLE {
            idle.push(buf);
        }
    }

    /// Number of idle buffers.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
