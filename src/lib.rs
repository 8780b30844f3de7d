//! # kinship-kernel
//!
//! Consistency and traversal engine for a graph of people and their kinship
//! relations.
//!
//! The kernel answers two questions about a family graph:
//!
//! > May this relation be added (or removed) without breaking plausibility?
//! >
//! > How are these people connected?
//!
//! ## Core Contract
//!
//! 1. A child has at most two parents, no one is their own relative, and no
//!    PARENT edge joins two people who already share an ancestor
//! 2. Spouses must share a child and each person has at most one spouse
//! 3. Reads return degrees of separation and a deduplicated family tree
//!
//! ## Architecture
//!
//! ```text
//! KinshipService → Validator (pure checks)
//!        ↓       → Traversal (ancestor test, shortest path, tree fragment)
//!   GraphSession (one per operation, read or write)
//!        ↓
//!   GraphStore (Postgres or Memory)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Stores return ids in ascending order
//! - Family tree nodes are ordered by `PersonId`, relations by (target, type)
//! - A SPOUSE edge is listed once, on its smaller endpoint

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod validator;
pub mod traversal;
pub mod store;
pub mod kinship;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    FamilyTree, FamilyTreeNode, PaginationDetails, PeopleList, Person, PersonId, Relation,
    RelationType, TreeFragment, TreeRelation, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MAX_PARENTS,
};
pub use error::{FailureClass, FailureKind, KinshipError};
pub use store::{
    FamilyGraph, GraphSession, GraphStore, InMemoryGraphStore, PersonRemoval, PoolStats, SessionMode,
};
#[cfg(feature = "postgres")]
pub use store::{PostgresConfig, PostgresGraphStore};
pub use kinship::KinshipService;
