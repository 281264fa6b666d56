//! Typed failures of the BHAP core
//!
//! The engines and the store return these; the HTTP layer decides how they
//! are logged and presented.

use crate::bhap::models::Status;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BhapError {
    #[error("No BHAP with ID {0}")]
    NotFound(i64),

    #[error("Unknown vote value {0:?}")]
    InvalidVoteValue(String),

    #[error("Unknown BHAP status {0:?}")]
    InvalidStatus(String),

    #[error("No eligible voters to tally against")]
    NoEligibleVoters,

    #[error("{votes} votes cast but only {eligible} eligible voters")]
    InconsistentVoterCount { eligible: usize, votes: usize },

    #[error("User {voter_id} has already voted on BHAP {bhap_id}")]
    DuplicateVote { bhap_id: i64, voter_id: i64 },

    #[error("BHAP ID allocation collided with a concurrent create")]
    AllocationConflict,

    #[error("Cannot move a BHAP from {from} to {to}")]
    IllegalTransition { from: Status, to: Status },

    #[error("{0}")]
    Forbidden(String),

    #[error("A BHAP in {0} status cannot be edited")]
    NotEditable(Status),

    #[error("Voting is closed for a BHAP in {0} status")]
    VotingClosed(Status),

    #[error("Authors cannot vote on their own BHAP")]
    AuthorCannotVote,

    #[error("Email {0} is already registered")]
    EmailTaken(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BhapError {
    /// Errors caused by the request rather than by the server or its data
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BhapError::NotFound(_)
                | BhapError::DuplicateVote { .. }
                | BhapError::AllocationConflict
                | BhapError::IllegalTransition { .. }
                | BhapError::Forbidden(_)
                | BhapError::NotEditable(_)
                | BhapError::VotingClosed(_)
                | BhapError::AuthorCannotVote
                | BhapError::EmailTaken(_)
        )
    }
}

impl From<tokio_postgres::Error> for BhapError {
    fn from(e: tokio_postgres::Error) -> Self {
        BhapError::Storage(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for BhapError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        BhapError::Storage(format!("Database pool error: {}", e))
    }
}
