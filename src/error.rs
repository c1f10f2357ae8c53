// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Error kinds for the PPPoE link-layer subsystem.
//!
//! Every error here is recovered locally by the caller (see spec §7): none
//! of them are allowed to unwind out of the subsystem. They exist so that
//! call sites can match on *kind* (to decide a `PhysDown` reason, a log
//! level, or whether a value is a CLI validation failure) rather than on
//! opaque strings.

use thiserror::Error;

use crate::host::PhysDownReason;

/// Error kinds produced by the PPPoE subsystem.
#[derive(Debug, Error)]
pub enum PppoeError {
    /// Bad value on a `set` command; reported back to the CLI, no state
    /// change.
    #[error("config rejected: {0}")]
    ConfigRejected(String),

    /// `ParentIfRegistry` is full, or the link's parent could not be
    /// acquired.
    #[error("parent interface table full (max {max} entries)")]
    CapacityExceeded {
        /// Configured capacity of the registry.
        max: usize,
    },

    /// A send/receive on the graph control or data socket failed.
    #[error("graph channel I/O error on {path}: {source}")]
    GraphIo {
        /// Graph node path the operation was targeting.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The 9-second connect timer fired before a `SUCCESS`/`FAIL` arrived.
    #[error("connect timeout")]
    ProtocolTimeout,

    /// The peer (AC) sent `FAIL` or `CLOSE`.
    #[error("peer failure: {0:?}")]
    PeerFailure(PhysDownReason),

    /// A PADI/PADR frame, or a tag inside it, was truncated or otherwise
    /// malformed. Always non-fatal: the frame is dropped.
    #[error("malformed PPPoE frame: {0}")]
    MalformedFrame(String),

    /// A control message referenced a hook name that does not resolve to
    /// any live link (unknown link id, foreign parent, or a link that is
    /// already DOWN).
    #[error("unknown route for hook {hook:?}: {reason}")]
    UnknownRoute {
        /// The raw hook name from the control message.
        hook: String,
        /// Human-readable reason the route could not be resolved.
        reason: String,
    },
}

impl PppoeError {
    /// Maps an error to the `PhysDown` reason code a caller should report
    /// to the host, if the error implies a state transition to DOWN.
    pub fn as_phys_down_reason(&self) -> Option<PhysDownReason> {
        match self {
            PppoeError::GraphIo { .. } => Some(PhysDownReason::Error),
            PppoeError::ProtocolTimeout => Some(PhysDownReason::ConFailed),
            PppoeError::PeerFailure(reason) => Some(*reason),
            PppoeError::ConfigRejected(_)
            | PppoeError::CapacityExceeded { .. }
            | PppoeError::MalformedFrame(_)
            | PppoeError::UnknownRoute { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PppoeError>;
