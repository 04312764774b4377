use crate::round::Phase;
use thiserror::Error;

/// Protocol-level rejection reported to the calling client.
///
/// Every variant is local to one registration attempt: a rejected call
/// leaves round state untouched and the client may retry, possibly
/// against a later round.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("input out of range: {0}")]
    InputOutOfRange(String),

    #[error("duplicate registration")]
    DuplicateRegistration,

    #[error("credential value mismatch: presented {presented}, required {required}")]
    CredentialValueMismatch { presented: u64, required: u64 },

    #[error("credential already spent")]
    CredentialAlreadySpent,

    #[error("credential failed verification")]
    InvalidCredential,

    #[error("wrong credential group size: got {got}")]
    WrongCredentialCount { got: usize },

    #[error("operation not valid in phase {0:?}")]
    WrongPhase(Phase),

    #[error("round not found")]
    RoundNotFound,

    #[error("alice not found")]
    AliceNotFound,

    #[error("input is banned until {banned_until}")]
    InputBanned { banned_until: u64 },

    #[error("invalid ownership proof")]
    InvalidOwnershipProof,

    #[error("invalid witness")]
    InvalidWitness,

    #[error("transaction not ready")]
    NotReady,
}
