//! Error types for the ownership core
//!
//! `StoreError` is what a backend reports; `OwnershipError` is the taxonomy
//! the store exposes to its callers.

use std::{fmt, time::Duration};
use thiserror::Error;

use crate::ids::{PlaceId, UserId};

/// Kind of record a mutation referred to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    User,
    Place,
    /// An entry of a user's place-set
    Link,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Record::User => "user",
            Record::Place => "place",
            Record::Link => "place link",
        };
        f.write_str(name)
    }
}

/// Failure reported by a storage backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// A mutation referenced a record that does not exist
    #[error("{0} record is missing")]
    Missing(Record),

    /// A mutation would create a record that already exists
    #[error("duplicate {0} record")]
    Duplicate(Record),

    /// Concurrent transactions conflicted and retries were exhausted
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The transaction did not finish in time and was rolled back
    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),

    /// Any other storage fault
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The task running the transaction died before reporting back
    #[error("transaction task aborted: {0}")]
    Aborted(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the ownership store
#[derive(Error, Debug)]
pub enum OwnershipError {
    /// Referenced place is absent
    #[error("place {0} not found")]
    NotFound(PlaceId),

    /// Creator lookup failed
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// Requester is not the place's creator
    #[error("user {requester} is not allowed to modify place {place}")]
    Unauthorized { place: PlaceId, requester: UserId },

    /// An atomic multi-record operation could not commit
    #[error("transaction failed: {0}")]
    TransactionFailure(#[source] StoreError),

    /// Single-record read or write fault
    #[error("persistence failure: {0}")]
    PersistenceFailure(#[source] StoreError),

    /// Registration with an email that already has an account
    #[error("email {0} is already registered")]
    EmailTaken(String),
}

pub type OwnershipResult<T> = Result<T, OwnershipError>;
