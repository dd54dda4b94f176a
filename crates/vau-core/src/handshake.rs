//! Pieces shared by the client and server handshake state machines.

use std::time::{SystemTime, UNIX_EPOCH};

/// Observable stage of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// Nothing sent or received yet.
    Init,
    /// Client: M1 sent.
    AwaitM2,
    /// Server: M2 sent.
    AwaitM3,
    /// Client: M3 sent.
    AwaitM4,
    /// Keys confirmed; application traffic may flow.
    Established,
    /// A step failed; the instance is unusable.
    Failed,
}

/// Source of wall-clock time in epoch seconds.
pub type Clock = fn() -> u64;

/// Current system time in epoch seconds.
pub fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
