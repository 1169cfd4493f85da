//! Delivery requirements for outbound sends.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested delivery semantics for an outbound message.
///
/// A transport advertises which values it supports; sending with anything
/// else fails before the message reaches the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    /// Fire and forget. May be dropped, duplicated or reordered.
    Unreliable,
    /// May be dropped, but stale messages are discarded on arrival.
    UnreliableSequenced,
    /// Always arrives, in any order.
    Reliable,
    /// Always arrives; stale messages are discarded on arrival.
    ReliableSequenced,
    /// Always arrives, in send order.
    ReliableOrdered,
}

impl Reliability {
    pub const ALL: [Reliability; 5] = [
        Reliability::Unreliable,
        Reliability::UnreliableSequenced,
        Reliability::Reliable,
        Reliability::ReliableSequenced,
        Reliability::ReliableOrdered,
    ];

    pub fn is_reliable(self) -> bool {
        matches!(
            self,
            Reliability::Reliable | Reliability::ReliableSequenced | Reliability::ReliableOrdered
        )
    }

    pub fn is_ordered(self) -> bool {
        self == Reliability::ReliableOrdered
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Reliability::Unreliable => "unreliable",
            Reliability::UnreliableSequenced => "unreliable_sequenced",
            Reliability::Reliable => "reliable",
            Reliability::ReliableSequenced => "reliable_sequenced",
            Reliability::ReliableOrdered => "reliable_ordered",
        }
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reliability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reliability::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown reliability: {s}"))
    }
}
