//! In-memory graph store.
//!
//! Backs tests, benches and the `KINSHIP_STORE=memory` mode of the service.
//! Uses BTreeMap/BTreeSet for deterministic iteration order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use super::{GraphSession, GraphStore, PersonRemoval, SessionMode};
use crate::types::{PaginationDetails, PeopleList, Person, PersonId, Relation, RelationType};

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// A mutation was attempted through a read session.
    #[error("write attempted in a read-only session")]
    ReadOnlySession,
    /// A relation names a person that is not stored.
    #[error("Person not found: {0}")]
    PersonNotFound(PersonId),
}

/// Adjacency-indexed kinship graph.
#[derive(Debug, Clone, Default)]
pub struct FamilyGraph {
    /// People by ID.
    people: BTreeMap<PersonId, Person>,
    /// Parent -> Children mapping.
    children: BTreeMap<PersonId, BTreeSet<PersonId>>,
    /// Child -> Parents mapping.
    parents: BTreeMap<PersonId, BTreeSet<PersonId>>,
    /// Spouse of each married person, stored under both partners.
    spouses: BTreeMap<PersonId, PersonId>,
}

impl FamilyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a person to the graph, replacing any person with the same id.
    pub fn add_person(&mut self, person: Person) {
        self.people.insert(person.id, person);
    }

    /// Add a relation. Returns `false` if the edge was already present.
    ///
    /// No plausibility checks happen here; those belong to the service.
    pub fn add_relation(&mut self, relation: Relation) -> bool {
        match relation.relation_type {
            RelationType::Parent => {
                // Update parent -> child mapping
                let added = self
                    .children
                    .entry(relation.from)
                    .or_default()
                    .insert(relation.to);
                // Update child -> parent mapping
                self.parents
                    .entry(relation.to)
                    .or_default()
                    .insert(relation.from);
                added
            }
            RelationType::Spouse => {
                let previous = self.spouses.insert(relation.from, relation.to);
                self.spouses.insert(relation.to, relation.from);
                previous != Some(relation.to)
            }
        }
    }

    /// Remove a relation and return how many edges went away.
    ///
    /// SPOUSE relations match in either direction.
    pub fn remove_relation(&mut self, relation: Relation) -> usize {
        match relation.relation_type {
            RelationType::Parent => {
                let removed = remove_from(&mut self.children, relation.from, relation.to);
                remove_from(&mut self.parents, relation.to, relation.from);
                usize::from(removed)
            }
            RelationType::Spouse => {
                if self.spouses.get(&relation.from) != Some(&relation.to) {
                    return 0;
                }
                self.spouses.remove(&relation.from);
                self.spouses.remove(&relation.to);
                1
            }
        }
    }

    /// Remove a person with no relations.
    pub fn remove_person(&mut self, id: PersonId) -> PersonRemoval {
        if self.has_relations(id) {
            return PersonRemoval::StillRelated;
        }
        self.people.remove(&id);
        PersonRemoval::Removed
    }

    /// Get a person by id.
    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.people.get(&id)
    }

    /// Whether a person is stored.
    pub fn contains(&self, id: PersonId) -> bool {
        self.people.contains_key(&id)
    }

    /// Parents of `child`, ordered by id.
    pub fn parents_of(&self, child: PersonId) -> Vec<PersonId> {
        collect_ids(&self.parents, child)
    }

    /// Children of `parent`, ordered by id.
    pub fn children_of(&self, parent: PersonId) -> Vec<PersonId> {
        collect_ids(&self.children, parent)
    }

    /// Spouse of `id`, if married.
    pub fn spouse_of(&self, id: PersonId) -> Option<PersonId> {
        self.spouses.get(&id).copied()
    }

    /// Whether any edge touches `id`.
    pub fn has_relations(&self, id: PersonId) -> bool {
        self.spouses.contains_key(&id)
            || self.parents.get(&id).is_some_and(|s| !s.is_empty())
            || self.children.get(&id).is_some_and(|s| !s.is_empty())
    }

    /// All relations, SPOUSE edges listed once with the smaller id first.
    pub fn relations(&self) -> Vec<Relation> {
        let parent_edges = self.children.iter().flat_map(|(&parent, children)| {
            children.iter().map(move |&child| Relation::parent(parent, child))
        });
        let spouse_edges = self
            .spouses
            .iter()
            .filter(|(a, b)| a <= b)
            .map(|(&a, &b)| Relation::spouse(a, b));
        parent_edges.chain(spouse_edges).collect()
    }

    /// Get number of people.
    pub fn num_people(&self) -> usize {
        self.people.len()
    }

    /// Get number of relations.
    pub fn num_relations(&self) -> usize {
        let parent_edges: usize = self.children.values().map(BTreeSet::len).sum();
        let spouse_edges = self.spouses.iter().filter(|(a, b)| a <= b).count();
        parent_edges + spouse_edges
    }

    fn page(&self, pagination: PaginationDetails) -> PeopleList {
        PeopleList {
            content: self
                .people
                .values()
                .skip(pagination.offset())
                .take(pagination.page_size())
                .cloned()
                .collect(),
            page: pagination.page(),
            total_items: self.people.len(),
        }
    }
}

fn collect_ids(index: &BTreeMap<PersonId, BTreeSet<PersonId>>, key: PersonId) -> Vec<PersonId> {
    index
        .get(&key)
        .map(|set| set.iter().copied().collect())
        .unwrap_or_default()
}

fn remove_from(index: &mut BTreeMap<PersonId, BTreeSet<PersonId>>, key: PersonId, value: PersonId) -> bool {
    let Some(set) = index.get_mut(&key) else {
        return false;
    };
    let removed = set.remove(&value);
    if set.is_empty() {
        index.remove(&key);
    }
    removed
}

/// In-memory graph store.
///
/// Read sessions share the graph; a write session holds it exclusively for
/// its whole lifetime and stages its changes on a private copy that only
/// replaces the shared graph on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraphStore {
    graph: Arc<RwLock<FamilyGraph>>,
}

impl InMemoryGraphStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `graph`.
    pub fn from_graph(graph: FamilyGraph) -> Self {
        Self {
            graph: Arc::new(RwLock::new(graph)),
        }
    }

    /// Copy of the committed graph.
    pub async fn snapshot(&self) -> FamilyGraph {
        self.graph.read().await.clone()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    type Session = InMemorySession;

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn open_session(&self, mode: SessionMode) -> Result<InMemorySession, InMemoryError> {
        let session = match mode {
            SessionMode::Read => InMemorySession::Read(self.graph.clone().read_owned().await),
            SessionMode::Write => InMemorySession::Write {
                guard: self.graph.clone().write_owned().await,
                staged: None,
            },
        };
        Ok(session)
    }
}

/// Session over an [`InMemoryGraphStore`].
pub enum InMemorySession {
    /// Shared read access.
    Read(OwnedRwLockReadGuard<FamilyGraph>),
    /// Exclusive access with staged changes.
    Write {
        /// Lock on the committed graph.
        guard: OwnedRwLockWriteGuard<FamilyGraph>,
        /// Copy taken on the first mutation.
        staged: Option<FamilyGraph>,
    },
}

impl InMemorySession {
    fn graph(&self) -> &FamilyGraph {
        match self {
            Self::Read(guard) => &**guard,
            Self::Write { guard, staged } => staged.as_ref().unwrap_or(&**guard),
        }
    }

    fn graph_mut(&mut self) -> Result<&mut FamilyGraph, InMemoryError> {
        match self {
            Self::Read(_) => Err(InMemoryError::ReadOnlySession),
            Self::Write { guard, staged } => Ok(staged.get_or_insert_with(|| (**guard).clone())),
        }
    }
}

impl std::fmt::Debug for InMemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySession")
            .field("mode", &self.mode())
            .field("people", &self.graph().num_people())
            .finish()
    }
}

#[async_trait]
impl GraphSession for InMemorySession {
    type Error = InMemoryError;

    fn mode(&self) -> SessionMode {
        match self {
            Self::Read(_) => SessionMode::Read,
            Self::Write { .. } => SessionMode::Write,
        }
    }

    async fn save_person(&mut self, name: &str) -> Result<Person, Self::Error> {
        let person = Person::new(PersonId::generate(), name);
        self.graph_mut()?.add_person(person.clone());
        Ok(person)
    }

    async fn get_person(&mut self, id: PersonId) -> Result<Option<Person>, Self::Error> {
        Ok(self.graph().person(id).cloned())
    }

    async fn get_persons(&mut self, ids: &[PersonId]) -> Result<Vec<Person>, Self::Error> {
        let graph = self.graph();
        let unique: BTreeSet<PersonId> = ids.iter().copied().collect();
        Ok(unique
            .into_iter()
            .filter_map(|id| graph.person(id).cloned())
            .collect())
    }

    async fn get_people(&mut self, pagination: PaginationDetails) -> Result<PeopleList, Self::Error> {
        Ok(self.graph().page(pagination))
    }

    async fn save_relation(&mut self, relation: Relation) -> Result<(), Self::Error> {
        let graph = self.graph_mut()?;
        for id in [relation.from, relation.to] {
            if !graph.contains(id) {
                return Err(InMemoryError::PersonNotFound(id));
            }
        }
        graph.add_relation(relation);
        Ok(())
    }

    async fn get_parents(&mut self, child: PersonId) -> Result<Vec<PersonId>, Self::Error> {
        Ok(self.graph().parents_of(child))
    }

    async fn get_children(&mut self, parent: PersonId) -> Result<Vec<PersonId>, Self::Error> {
        Ok(self.graph().children_of(parent))
    }

    async fn get_spouse(&mut self, id: PersonId) -> Result<Option<PersonId>, Self::Error> {
        Ok(self.graph().spouse_of(id))
    }

    async fn delete_relation(&mut self, relation: Relation) -> Result<usize, Self::Error> {
        Ok(self.graph_mut()?.remove_relation(relation))
    }

    async fn delete_person(&mut self, id: PersonId) -> Result<PersonRemoval, Self::Error> {
        Ok(self.graph_mut()?.remove_person(id))
    }

    async fn commit(self) -> Result<(), Self::Error> {
        if let Self::Write {
            mut guard,
            staged: Some(staged),
        } = self
        {
            *guard = staged;
        }
        Ok(())
    }

    async fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use uuid::Uuid;

    fn make_person(id: u128) -> Person {
        Person::new(PersonId::new(Uuid::from_u128(id)), format!("person_{}", id))
    }

    fn id(n: u128) -> PersonId {
        PersonId::new(Uuid::from_u128(n))
    }

    fn seeded() -> InMemoryGraphStore {
        let mut graph = FamilyGraph::new();
        for n in 1..=4 {
            graph.add_person(make_person(n));
        }
        graph.add_relation(Relation::parent(id(1), id(3)));
        graph.add_relation(Relation::parent(id(2), id(3)));
        graph.add_relation(Relation::spouse(id(2), id(1)));
        InMemoryGraphStore::from_graph(graph)
    }

    #[tokio::test]
    async fn test_parents_children_and_spouse() {
        let store = seeded();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert_eq!(session.get_parents(id(3)).await.unwrap(), vec![id(1), id(2)]);
        assert_eq!(session.get_children(id(1)).await.unwrap(), vec![id(3)]);
        assert_eq!(session.get_spouse(id(1)).await.unwrap(), Some(id(2)));
        assert_eq!(session.get_spouse(id(2)).await.unwrap(), Some(id(1)));
        assert_eq!(session.get_spouse(id(4)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_session_rejects_writes() {
        let store = seeded();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        let err = session.save_person("Eve").await.unwrap_err();
        assert!(matches!(err, InMemoryError::ReadOnlySession));
        let err = session.delete_relation(Relation::parent(id(1), id(3))).await.unwrap_err();
        assert!(matches!(err, InMemoryError::ReadOnlySession));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_discarded() {
        let store = seeded();

        let mut session = store.open_session(SessionMode::Write).await.unwrap();
        session.save_person("Eve").await.unwrap();
        session.delete_relation(Relation::spouse(id(1), id(2))).await.unwrap();
        session.close().await;

        let graph = store.snapshot().await;
        assert_eq!(graph.num_people(), 4);
        assert_eq!(graph.spouse_of(id(1)), Some(id(2)));
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = seeded();

        let mut session = store.open_session(SessionMode::Write).await.unwrap();
        let eve = session.save_person("Eve").await.unwrap();
        session.save_relation(Relation::parent(id(3), eve.id)).await.unwrap();
        // Own writes are visible before commit
        assert_eq!(session.get_parents(eve.id).await.unwrap(), vec![id(3)]);
        session.commit().await.unwrap();

        let graph = store.snapshot().await;
        assert_eq!(graph.num_people(), 5);
        assert_eq!(graph.parents_of(eve.id), vec![id(3)]);
    }

    #[tokio::test]
    async fn test_save_relation_requires_both_people() {
        let store = seeded();
        let mut session = store.open_session(SessionMode::Write).await.unwrap();

        let err = session.save_relation(Relation::parent(id(1), id(99))).await.unwrap_err();
        assert!(matches!(err, InMemoryError::PersonNotFound(p) if p == id(99)));
    }

    #[tokio::test]
    async fn test_spouse_deletion_matches_either_direction() {
        let store = seeded();
        let mut session = store.open_session(SessionMode::Write).await.unwrap();

        assert_eq!(session.delete_relation(Relation::spouse(id(2), id(1))).await.unwrap(), 1);
        assert_eq!(session.delete_relation(Relation::spouse(id(1), id(2))).await.unwrap(), 0);
        assert_eq!(session.get_spouse(id(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_person_with_relations() {
        let store = seeded();
        let mut session = store.open_session(SessionMode::Write).await.unwrap();

        assert_eq!(session.delete_person(id(3)).await.unwrap(), PersonRemoval::StillRelated);
        assert_eq!(session.delete_person(id(4)).await.unwrap(), PersonRemoval::Removed);
        assert!(session.get_person(id(4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_people_pages_by_id() {
        let store = seeded();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        let page = session.get_people(PaginationDetails::new(1, 3)).await.unwrap();
        assert_eq!(page.total_items, 4);
        assert_eq!(page.page, 1);
        assert_eq!(page.content, vec![make_person(4)]);
    }

    #[tokio::test]
    async fn test_get_persons_skips_missing_and_duplicates() {
        let store = seeded();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        let people = session.get_persons(&[id(3), id(1), id(3), id(42)]).await.unwrap();
        assert_eq!(people, vec![make_person(1), make_person(3)]);
    }

    #[tokio::test]
    async fn test_write_session_is_exclusive() {
        let store = seeded();
        let writer = store.open_session(SessionMode::Write).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            store.open_session(SessionMode::Read),
        )
        .await;
        assert!(blocked.is_err());

        drop(writer);
        assert!(store.open_session(SessionMode::Read).await.is_ok());
    }

    #[test]
    fn test_relation_count() {
        let mut graph = FamilyGraph::new();
        graph.add_person(make_person(1));
        graph.add_person(make_person(2));
        assert!(graph.add_relation(Relation::parent(id(1), id(2))));
        assert!(!graph.add_relation(Relation::parent(id(1), id(2))));
        assert!(graph.add_relation(Relation::spouse(id(2), id(1))));

        assert_eq!(graph.num_relations(), 2);
        assert_eq!(
            graph.relations(),
            vec![Relation::parent(id(1), id(2)), Relation::spouse(id(1), id(2))]
        );
    }
}
