//! Kinship service.
//!
//! Sequences store reads, invariant checks and store writes for every
//! operation. Each public method is one operation: it opens a session of the
//! right mode, runs a private `*_in` helper against that session, and then
//! either commits (successful write) or closes it. The whole operation runs
//! under the optional deadline; if the deadline fires the future is dropped
//! together with its session, which releases it without committing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::KinshipError;
use crate::store::{GraphSession, GraphStore, PersonRemoval, SessionMode};
use crate::types::{FamilyTree, PaginationDetails, PeopleList, Person, PersonId, Relation};
use crate::validator;

/// Kinship service over a graph store.
///
/// Stateless between calls; clones share the store.
pub struct KinshipService<S: GraphStore> {
    store: Arc<S>,
    operation_timeout: Option<Duration>,
}

impl<S: GraphStore> Clone for KinshipService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            operation_timeout: self.operation_timeout,
        }
    }
}

impl<S: GraphStore> std::fmt::Debug for KinshipService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KinshipService")
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl<S: GraphStore + 'static> KinshipService<S> {
    /// Create a service without an operation deadline.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            operation_timeout: None,
        }
    }

    /// Abandon any operation that runs longer than `timeout`.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Configured per-operation deadline.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    // ─────────────────────────────────────────────────────────────────────
    // People
    // ─────────────────────────────────────────────────────────────────────

    /// Create a person. The name is trimmed and must not be empty.
    pub async fn create_person(&self, name: &str) -> Result<Person, KinshipError> {
        let name = name.trim();
        tracing::debug!(name, "Creating person");
        if name.is_empty() {
            tracing::warn!(operation = "create_person", "Rejected empty name");
            return Err(KinshipError::EmptyName);
        }

        self.deadline("create_person", async {
            let mut session = self.open(SessionMode::Write).await?;
            let result = create_person_in(&mut session, name).await;
            finish("create_person", session, result).await
        })
        .await
    }

    /// Fetch a person by id.
    pub async fn get_person(&self, id: PersonId) -> Result<Person, KinshipError> {
        tracing::debug!(person = %id, "Fetching person");
        self.deadline("get_person", async {
            let mut session = self.open(SessionMode::Read).await?;
            let result = load(&mut session, id).await;
            finish("get_person", session, result).await
        })
        .await
    }

    /// Fetch one page of people.
    pub async fn get_people(&self, pagination: PaginationDetails) -> Result<PeopleList, KinshipError> {
        tracing::debug!(
            page = pagination.page(),
            page_size = pagination.page_size(),
            "Listing people"
        );
        self.deadline("get_people", async {
            let mut session = self.open(SessionMode::Read).await?;
            let result = session
                .get_people(pagination)
                .await
                .map_err(KinshipError::from_store);
            finish("get_people", session, result).await
        })
        .await
    }

    /// Delete a person that has no relations.
    pub async fn delete_person(&self, id: PersonId) -> Result<(), KinshipError> {
        tracing::debug!(person = %id, "Deleting person");
        self.deadline("delete_person", async {
            let mut session = self.open(SessionMode::Write).await?;
            let result = delete_person_in(&mut session, id).await;
            finish("delete_person", session, result).await
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Relations
    // ─────────────────────────────────────────────────────────────────────

    /// Make `parent` a parent of `child`.
    pub async fn create_parent_relation(&self, parent: PersonId, child: PersonId) -> Result<(), KinshipError> {
        tracing::debug!(parent = %parent, child = %child, "Creating parent relation");
        self.deadline("create_parent_relation", async {
            let mut session = self.open(SessionMode::Write).await?;
            let result = create_parent_relation_in(&mut session, parent, child).await;
            finish("create_parent_relation", session, result).await
        })
        .await
    }

    /// Marry `first` and `second`.
    pub async fn create_spouse_relation(&self, first: PersonId, second: PersonId) -> Result<(), KinshipError> {
        tracing::debug!(first = %first, second = %second, "Creating spouse relation");
        self.deadline("create_spouse_relation", async {
            let mut session = self.open(SessionMode::Write).await?;
            let result = create_spouse_relation_in(&mut session, first, second).await;
            finish("create_spouse_relation", session, result).await
        })
        .await
    }

    /// Remove the PARENT edge from `parent` to `child`.
    pub async fn delete_parent_relation(&self, parent: PersonId, child: PersonId) -> Result<(), KinshipError> {
        tracing::debug!(parent = %parent, child = %child, "Deleting parent relation");
        self.deadline("delete_parent_relation", async {
            let mut session = self.open(SessionMode::Write).await?;
            let result = delete_parent_relation_in(&mut session, parent, child).await;
            finish("delete_parent_relation", session, result).await
        })
        .await
    }

    /// Remove the SPOUSE edge between `first` and `second`, stored either way.
    pub async fn delete_spouse_relation(&self, first: PersonId, second: PersonId) -> Result<(), KinshipError> {
        tracing::debug!(first = %first, second = %second, "Deleting spouse relation");
        self.deadline("delete_spouse_relation", async {
            let mut session = self.open(SessionMode::Write).await?;
            let result = delete_spouse_relation_in(&mut session, first, second).await;
            finish("delete_spouse_relation", session, result).await
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// Degrees of separation between two people.
    ///
    /// `Some(0)` for the same person, `None` when no path connects them.
    pub async fn bacons_number(&self, from: PersonId, to: PersonId) -> Result<Option<usize>, KinshipError> {
        tracing::debug!(from = %from, to = %to, "Computing Bacon's number");
        self.deadline("bacons_number", async {
            let mut session = self.open(SessionMode::Read).await?;
            let result = bacons_number_in(&mut session, from, to).await;
            finish("bacons_number", session, result).await
        })
        .await
    }

    /// Reduced family tree rooted at `root`.
    pub async fn family_tree(&self, root: PersonId) -> Result<FamilyTree, KinshipError> {
        tracing::debug!(root = %root, "Building family tree");
        self.deadline("family_tree", async {
            let mut session = self.open(SessionMode::Read).await?;
            let result = family_tree_in(&mut session, root).await;
            finish("family_tree", session, result).await
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session plumbing
    // ─────────────────────────────────────────────────────────────────────

    async fn open(&self, mode: SessionMode) -> Result<S::Session, KinshipError> {
        self.store
            .open_session(mode)
            .await
            .map_err(KinshipError::from_store)
    }

    /// Run one operation under the configured deadline, if any.
    async fn deadline<T>(
        &self,
        operation: &'static str,
        work: impl Future<Output = Result<T, KinshipError>>,
    ) -> Result<T, KinshipError> {
        let Some(limit) = self.operation_timeout else {
            return work.await;
        };
        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Operation timed out");
                Err(KinshipError::Timeout(limit))
            }
        }
    }
}

/// Commit a successful write session, close everything else.
async fn finish<Sess, T>(
    operation: &'static str,
    session: Sess,
    result: Result<T, KinshipError>,
) -> Result<T, KinshipError>
where
    Sess: GraphSession,
{
    match result {
        Ok(value) if session.mode() == SessionMode::Write => {
            session.commit().await.map_err(|e| {
                tracing::warn!(operation, error = %e, "Commit failed");
                KinshipError::from_store(e)
            })?;
            tracing::info!(operation, "Committed");
            Ok(value)
        }
        Ok(value) => {
            session.close().await;
            Ok(value)
        }
        Err(e) => {
            session.close().await;
            if e.is_rejection() {
                tracing::warn!(operation, code = e.kind().code(), error = %e, "Rejected");
            } else {
                tracing::warn!(operation, error = %e, "Store call failed");
            }
            Err(e)
        }
    }
}

async fn load<Sess: GraphSession>(session: &mut Sess, id: PersonId) -> Result<Person, KinshipError> {
    session
        .get_person(id)
        .await
        .map_err(KinshipError::from_store)?
        .ok_or(KinshipError::PersonNotFound(id))
}

async fn create_person_in<Sess: GraphSession>(session: &mut Sess, name: &str) -> Result<Person, KinshipError> {
    session.save_person(name).await.map_err(KinshipError::from_store)
}

async fn delete_person_in<Sess: GraphSession>(session: &mut Sess, id: PersonId) -> Result<(), KinshipError> {
    load(session, id).await?;
    let removal = session.delete_person(id).await.map_err(KinshipError::from_store)?;
    validator::can_delete_person(removal == PersonRemoval::StillRelated)
}

async fn create_parent_relation_in<Sess: GraphSession>(
    session: &mut Sess,
    parent: PersonId,
    child: PersonId,
) -> Result<(), KinshipError> {
    load(session, parent).await?;
    load(session, child).await?;

    let existing = session.get_parents(child).await.map_err(KinshipError::from_store)?;
    let common_ancestor = session
        .has_common_ancestor(parent, child)
        .await
        .map_err(KinshipError::from_store)?;
    validator::can_add_parent(parent, child, &existing, common_ancestor)?;

    session
        .save_relation(Relation::parent(parent, child))
        .await
        .map_err(KinshipError::from_store)
}

async fn create_spouse_relation_in<Sess: GraphSession>(
    session: &mut Sess,
    first: PersonId,
    second: PersonId,
) -> Result<(), KinshipError> {
    load(session, first).await?;
    load(session, second).await?;

    let common_child = session
        .has_common_child(first, second)
        .await
        .map_err(KinshipError::from_store)?;
    let first_spouse = session.get_spouse(first).await.map_err(KinshipError::from_store)?;
    let second_spouse = session.get_spouse(second).await.map_err(KinshipError::from_store)?;
    validator::can_add_spouse(first, second, common_child, first_spouse, second_spouse)?;

    session
        .save_relation(Relation::spouse(first, second))
        .await
        .map_err(KinshipError::from_store)
}

async fn delete_parent_relation_in<Sess: GraphSession>(
    session: &mut Sess,
    parent: PersonId,
    child: PersonId,
) -> Result<(), KinshipError> {
    load(session, parent).await?;
    load(session, child).await?;

    let count = session
        .marital_sibling_count(child)
        .await
        .map_err(KinshipError::from_store)?;
    validator::can_delete_parent_relation(count)?;

    let removed = session
        .delete_relation(Relation::parent(parent, child))
        .await
        .map_err(KinshipError::from_store)?;
    if removed == 0 {
        return Err(KinshipError::RelationNotFound);
    }
    Ok(())
}

async fn delete_spouse_relation_in<Sess: GraphSession>(
    session: &mut Sess,
    first: PersonId,
    second: PersonId,
) -> Result<(), KinshipError> {
    load(session, first).await?;
    load(session, second).await?;

    let removed = session
        .delete_relation(Relation::spouse(first, second))
        .await
        .map_err(KinshipError::from_store)?;
    if removed == 0 {
        return Err(KinshipError::RelationNotFound);
    }
    Ok(())
}

async fn bacons_number_in<Sess: GraphSession>(
    session: &mut Sess,
    from: PersonId,
    to: PersonId,
) -> Result<Option<usize>, KinshipError> {
    load(session, from).await?;
    load(session, to).await?;

    if from == to {
        return Ok(Some(0));
    }
    session
        .shortest_path_length(from, to)
        .await
        .map_err(KinshipError::from_store)
}

async fn family_tree_in<Sess: GraphSession>(session: &mut Sess, root: PersonId) -> Result<FamilyTree, KinshipError> {
    load(session, root).await?;

    let fragment = session
        .family_tree_fragment(root)
        .await
        .map_err(KinshipError::from_store)?;
    let raw_relations = fragment.raw_relation_count();
    let tree = FamilyTree::reduce(root, fragment);
    tracing::debug!(
        root = %root,
        people = tree.len(),
        raw_relations,
        relations = tree.relation_count(),
        "Family tree reduced"
    );
    Ok(tree)
}
