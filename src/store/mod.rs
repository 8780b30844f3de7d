//! Graph storage backends.
//!
//! A [`GraphStore`] hands out [`GraphSession`]s. A session is scoped to one
//! logical operation and to one [`SessionMode`]; read sessions must reject
//! writes. The kinship service threads the session explicitly through every
//! call it makes for that operation and ends it with [`GraphSession::commit`]
//! or [`GraphSession::close`]. Dropping a session without either releases it
//! as if `close` had been called.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use std::fmt;

use crate::traversal;
use crate::types::{PaginationDetails, PeopleList, Person, PersonId, Relation, TreeFragment};

/// Access mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Queries only.
    Read,
    /// Queries and mutations.
    Write,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Result of asking the store to delete a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonRemoval {
    /// The person is gone.
    Removed,
    /// The person still has relations; nothing was deleted.
    StillRelated,
}

/// Connection pool statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Trait for graph storage backends.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Session type handed out by this store.
    type Session: GraphSession;

    /// Open a session for one operation.
    async fn open_session(
        &self,
        mode: SessionMode,
    ) -> Result<Self::Session, <Self::Session as GraphSession>::Error>;

    /// Short backend name for health reports, e.g. `memory`.
    fn backend_name(&self) -> &'static str;

    /// Whether the backing storage is reachable.
    async fn is_healthy(&self) -> bool {
        true
    }

    /// Pool statistics, for backends that pool connections.
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }
}

/// One operation's view of the graph.
///
/// Implementations must return ids in a deterministic order (ascending
/// `PersonId`) so traversals are reproducible.
///
/// The closure queries (`has_common_ancestor`, `has_common_child`,
/// `marital_sibling_count`, `shortest_path_length`, `family_tree_fragment`)
/// have provided implementations in terms of the primitive reads. Backends
/// with a native query for any of them should override it.
#[async_trait]
pub trait GraphSession: Send {
    /// Error type for session operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Mode the session was opened with.
    fn mode(&self) -> SessionMode;

    /// Persist a new person and return it with its assigned id.
    async fn save_person(&mut self, name: &str) -> Result<Person, Self::Error>;

    /// Fetch a person by id.
    async fn get_person(&mut self, id: PersonId) -> Result<Option<Person>, Self::Error>;

    /// Fetch every existing person among `ids`, ordered by id.
    async fn get_persons(&mut self, ids: &[PersonId]) -> Result<Vec<Person>, Self::Error>;

    /// Fetch one page of people.
    async fn get_people(&mut self, pagination: PaginationDetails) -> Result<PeopleList, Self::Error>;

    /// Persist a relation.
    async fn save_relation(&mut self, relation: Relation) -> Result<(), Self::Error>;

    /// Fetch parent ids of a person.
    async fn get_parents(&mut self, child: PersonId) -> Result<Vec<PersonId>, Self::Error>;

    /// Fetch child ids of a person.
    async fn get_children(&mut self, parent: PersonId) -> Result<Vec<PersonId>, Self::Error>;

    /// Fetch the spouse of a person, if married.
    async fn get_spouse(&mut self, id: PersonId) -> Result<Option<PersonId>, Self::Error>;

    /// Delete a relation and return how many edges were removed.
    ///
    /// SPOUSE relations match in either direction.
    async fn delete_relation(&mut self, relation: Relation) -> Result<usize, Self::Error>;

    /// Delete a person that has no relations.
    async fn delete_person(&mut self, id: PersonId) -> Result<PersonRemoval, Self::Error>;

    /// Whether the upward PARENT closures of `a` and `b` intersect.
    async fn has_common_ancestor(&mut self, a: PersonId, b: PersonId) -> Result<bool, Self::Error> {
        traversal::has_common_ancestor(self, a, b).await
    }

    /// Whether `a` and `b` are both parents of at least one person.
    async fn has_common_child(&mut self, a: PersonId, b: PersonId) -> Result<bool, Self::Error> {
        Ok(!traversal::common_children(self, a, b).await?.is_empty())
    }

    /// Number of children shared by `child`'s two parents when they are
    /// married to each other; zero otherwise.
    async fn marital_sibling_count(&mut self, child: PersonId) -> Result<usize, Self::Error> {
        traversal::marital_sibling_count(self, child).await
    }

    /// Length of the shortest undirected path between `a` and `b`.
    async fn shortest_path_length(
        &mut self,
        a: PersonId,
        b: PersonId,
    ) -> Result<Option<usize>, Self::Error> {
        traversal::shortest_path_length(self, a, b).await
    }

    /// Raw family tree fragment around `root`.
    async fn family_tree_fragment(&mut self, root: PersonId) -> Result<TreeFragment, Self::Error> {
        traversal::collect_family_fragment(self, root).await
    }

    /// Make the session's writes durable and end it.
    async fn commit(self) -> Result<(), Self::Error>
    where
        Self: Sized;

    /// End the session, discarding anything not committed.
    async fn close(self)
    where
        Self: Sized;
}

pub use memory::{FamilyGraph, InMemoryError, InMemoryGraphStore, InMemorySession};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConfig, PostgresError, PostgresGraphStore, PostgresSession};
