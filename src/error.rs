//! Failure taxonomy for kinship operations.
//!
//! Every operation either succeeds or fails with exactly one
//! [`KinshipError`]. Transports translate failures through
//! [`KinshipError::kind`] and [`FailureKind::class`]; the kernel itself
//! carries no status-code table.

use std::time::Duration;

use crate::types::{PersonId, MAX_PARENTS};

/// Boxed store error carried by [`KinshipError::StoreFailure`].
pub type BoxedStoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for kinship operations.
#[derive(Debug, thiserror::Error)]
pub enum KinshipError {
    /// A referenced person does not exist.
    #[error("person not found: {0}")]
    PersonNotFound(PersonId),
    /// Person name is empty after trimming.
    #[error("person name can't be empty")]
    EmptyName,
    /// Both ends of the relation are the same person.
    #[error("a person can't be related to themselves")]
    SelfRelation,
    /// The parent is already a parent of the child.
    #[error("relation already exists")]
    DuplicateRelation,
    /// The child already has two parents.
    #[error("child already has {} parents", MAX_PARENTS)]
    MaxParentsExceeded,
    /// Parent and child already share an ancestor.
    #[error("child and parent are already relatives")]
    IncestuousRelation,
    /// A spouse pair must share at least one child.
    #[error("couple has no common child")]
    NoCommonChild,
    /// The two people are already married to each other.
    #[error("people are already spouses")]
    AlreadySpouses,
    /// One of the two people is married to someone else.
    #[error("person has spouse already")]
    SpouseAlreadyAssigned,
    /// Nothing matched the relation to delete.
    #[error("relation not found")]
    RelationNotFound,
    /// The child is the only common child of its married parents.
    #[error("can't delete the only child relation of a married couple")]
    SoleChildOfMarriedCouple,
    /// The person still has relations and can't be deleted.
    #[error("person still has relations")]
    PersonHasRelations,
    /// The operation exceeded its deadline and was abandoned.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    /// Lower-layer store error, passed through untouched.
    #[error("store failure: {0}")]
    StoreFailure(#[source] BoxedStoreError),
}

impl KinshipError {
    /// Wrap any store error.
    pub fn from_store<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::StoreFailure(Box::new(e))
    }

    /// Machine-readable failure kind.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PersonNotFound(_) => FailureKind::PersonNotFound,
            Self::EmptyName => FailureKind::EmptyName,
            Self::SelfRelation => FailureKind::SelfRelation,
            Self::DuplicateRelation => FailureKind::DuplicateRelation,
            Self::MaxParentsExceeded => FailureKind::MaxParentsExceeded,
            Self::IncestuousRelation => FailureKind::IncestuousRelation,
            Self::NoCommonChild => FailureKind::NoCommonChild,
            Self::AlreadySpouses => FailureKind::AlreadySpouses,
            Self::SpouseAlreadyAssigned => FailureKind::SpouseAlreadyAssigned,
            Self::RelationNotFound => FailureKind::RelationNotFound,
            Self::SoleChildOfMarriedCouple => FailureKind::SoleChildOfMarriedCouple,
            Self::PersonHasRelations => FailureKind::PersonHasRelations,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::StoreFailure(_) => FailureKind::StoreFailure,
        }
    }

    /// Whether this failure came from validation rather than I/O.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Timeout(_) | Self::StoreFailure(_))
    }
}

/// Failure kind, detached from the error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// See [`KinshipError::PersonNotFound`].
    PersonNotFound,
    /// See [`KinshipError::EmptyName`].
    EmptyName,
    /// See [`KinshipError::SelfRelation`].
    SelfRelation,
    /// See [`KinshipError::DuplicateRelation`].
    DuplicateRelation,
    /// See [`KinshipError::MaxParentsExceeded`].
    MaxParentsExceeded,
    /// See [`KinshipError::IncestuousRelation`].
    IncestuousRelation,
    /// See [`KinshipError::NoCommonChild`].
    NoCommonChild,
    /// See [`KinshipError::AlreadySpouses`].
    AlreadySpouses,
    /// See [`KinshipError::SpouseAlreadyAssigned`].
    SpouseAlreadyAssigned,
    /// See [`KinshipError::RelationNotFound`].
    RelationNotFound,
    /// See [`KinshipError::SoleChildOfMarriedCouple`].
    SoleChildOfMarriedCouple,
    /// See [`KinshipError::PersonHasRelations`].
    PersonHasRelations,
    /// See [`KinshipError::Timeout`].
    Timeout,
    /// See [`KinshipError::StoreFailure`].
    StoreFailure,
}

/// Coarse outcome class a transport maps onto its own status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The referenced entity does not exist.
    NotFound,
    /// The request would break a kinship invariant.
    BadRequest,
    /// The operation could not finish in time.
    Unavailable,
    /// The store failed.
    Internal,
}

impl FailureKind {
    /// Stable machine code, e.g. `PERSON_NOT_FOUND`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PersonNotFound => "PERSON_NOT_FOUND",
            Self::EmptyName => "EMPTY_NAME",
            Self::SelfRelation => "SELF_RELATION",
            Self::DuplicateRelation => "DUPLICATE_RELATION",
            Self::MaxParentsExceeded => "MAX_PARENTS_EXCEEDED",
            Self::IncestuousRelation => "INCESTUOUS_RELATION",
            Self::NoCommonChild => "NO_COMMON_CHILD",
            Self::AlreadySpouses => "ALREADY_SPOUSES",
            Self::SpouseAlreadyAssigned => "SPOUSE_ALREADY_ASSIGNED",
            Self::RelationNotFound => "RELATION_NOT_FOUND",
            Self::SoleChildOfMarriedCouple => "SOLE_CHILD_OF_MARRIED_COUPLE",
            Self::PersonHasRelations => "PERSON_HAS_RELATIONS",
            Self::Timeout => "TIMEOUT",
            Self::StoreFailure => "STORE_FAILURE",
        }
    }

    /// Outcome class for transports.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::PersonNotFound | Self::RelationNotFound => FailureClass::NotFound,
            Self::Timeout => FailureClass::Unavailable,
            Self::StoreFailure => FailureClass::Internal,
            _ => FailureClass::BadRequest,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
