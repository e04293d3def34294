//! Shared status vocabulary for the allocator, collections and console
//!
//! Every fallible operation returns its status to the immediate caller. The
//! core never retries or recovers on the caller's behalf.

use thiserror::Error;

use crate::allocator::PoolId;

/// Negative errno values reported to the firmware console
pub mod errno {
    pub const EIO: i32 = -5;
    pub const ENOMEM: i32 = -12;
    pub const EBUSY: i32 = -16;
    pub const ENODEV: i32 = -19;
    pub const EINVAL: i32 = -22;
    pub const ENOSYS: i32 = -38;
    pub const ENODATA: i32 = -61;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("out of memory: {requested} bytes requested from pool {pool}")]
    OutOfMemory { requested: usize, pool: PoolId },

    #[error("not found: {key}")]
    NotFound { key: String },

    #[error("{name}: no such command")]
    UnknownCommand { name: String },

    #[error("busy: {what}")]
    Busy { what: String },

    #[error("not implemented: {operation}")]
    Unsupported { operation: String },

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("console output rejected write")]
    Output(#[from] core::fmt::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument { reason: reason.into() }
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }

    pub fn busy(what: impl Into<String>) -> Self {
        Self::Busy { what: what.into() }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported { operation: operation.into() }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config { reason: reason.into() }
    }

    pub fn out_of_memory(requested: usize, pool: PoolId) -> Self {
        Self::OutOfMemory { requested, pool }
    }

    /// Negative errno for integer status reporting
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } | Self::Config { .. } => errno::EINVAL,
            Self::OutOfMemory { .. } => errno::ENOMEM,
            Self::NotFound { .. } => errno::ENODATA,
            Self::UnknownCommand { .. } => errno::ENODEV,
            Self::Busy { .. } => errno::EBUSY,
            Self::Unsupported { .. } => errno::ENOSYS,
            Self::Output(_) => errno::EIO,
        }
    }
}
