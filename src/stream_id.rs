//! Stream-ID allocation and inbound routing.
//!
//! Stream IDs are 31-bit, partitioned by parity: the client generates odd
//! IDs, the server even ones. ID 0 addresses the connection itself. A
//! generator never reuses a value and signals exhaustion instead of
//! wrapping.

use crate::frame::MAX_STREAM_ID;

/// Which end of the connection this engine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiated the connection; generates odd stream IDs.
    Client,
    /// Accepted the connection; generates even stream IDs.
    Server,
}

/// Who owns an inbound stream ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// ID 0: the connection itself.
    Connection,
    /// A stream this side initiated; handled by the requester engine.
    Requester,
    /// A stream the peer initiated; handled by the responder engine.
    Responder,
}

impl Role {
    /// Classify an inbound stream ID for demultiplexing.
    ///
    /// IDs whose parity matches this side's generator belong to exchanges
    /// we initiated (requester-owned); the rest were initiated by the
    /// peer (responder-owned).
    pub fn classify(self, stream_id: u32) -> Owner {
        if stream_id == 0 {
            return Owner::Connection;
        }
        let locally_generated = match self {
            Role::Client => stream_id % 2 == 1,
            Role::Server => stream_id % 2 == 0,
        };
        if locally_generated {
            Owner::Requester
        } else {
            Owner::Responder
        }
    }
}

/// Monotonic odd/even stream-ID generator.
#[derive(Debug)]
pub struct StreamIdGenerator {
    next: u64,
}

impl StreamIdGenerator {
    /// Create a generator for the given role (client: 1, 3, 5, ...;
    /// server: 2, 4, 6, ...).
    pub fn new(role: Role) -> Self {
        Self {
            next: match role {
                Role::Client => 1,
                Role::Server => 2,
            },
        }
    }

    /// Allocate the next stream ID.
    ///
    /// Returns `None` once the 31-bit range is exhausted; callers must
    /// treat that as fatal for establishing further streams.
    pub fn next(&mut self) -> Option<u32> {
        if self.next > u64::from(MAX_STREAM_ID) {
            return None;
        }
        let id = self.next as u32;
        self.next += 2;
        Some(id)
    }
}
