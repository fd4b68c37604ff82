//! Errors decided by the container domain itself.

use thiserror::Error;

use crate::id::ItemId;

pub type DomainResult<T> = Result<T, DomainError>;

/// Rejections of a command or request, decided without IO.
///
/// Store connectivity and malformed rows are `StoreError`s in the infra crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input: date range, size or place label, empty serial key.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The container's current status does not allow the command.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    #[error("invalid {kind}: {raw:?}")]
    InvalidId { kind: &'static str, raw: String },

    /// A command for a container that was never received.
    #[error("container {0} has not been received")]
    UnknownItem(ItemId),

    #[error("container {0} was already received")]
    AlreadyReceived(ItemId),

    /// A command was routed to another container's aggregate.
    #[error("command for container {command} sent to container {target}")]
    WrongItem { target: ItemId, command: ItemId },

    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: u64, actual: u64 },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn illegal(msg: impl Into<String>) -> Self {
        Self::IllegalTransition(msg.into())
    }
}
