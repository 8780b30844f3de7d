//! Traversal engine over a [`GraphSession`].
//!
//! Every algorithm here walks the graph through the session's primitive
//! reads (`get_parents`, `get_children`, `get_spouse`), keeps an
//! identity-keyed visited set, and is iterative, so it terminates on any
//! graph shape and handles arbitrarily long chains.
//!
//! ## Algorithms
//!
//! - **Common ancestor**: two interleaved upward BFS walks, early exit on
//!   the first person seen by both.
//! - **Shortest path**: level-synchronous bidirectional BFS over the
//!   undirected view of PARENT and SPOUSE edges, always expanding the
//!   smaller frontier.
//! - **Family fragment**: DFS upward for ancestors, DFS downward for
//!   descendants, one hop sideways for siblings and nephews, plus SPOUSE
//!   edges inside the ancestor set.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::store::GraphSession;
use crate::types::{PersonId, Relation, TreeFragment};

/// Whether the upward PARENT closures of `a` and `b` intersect.
///
/// Both closures include the starting person, so the answer is `true`
/// when one is an ancestor of the other. Symmetric in `a` and `b`.
pub async fn has_common_ancestor<S>(
    session: &mut S,
    a: PersonId,
    b: PersonId,
) -> Result<bool, S::Error>
where
    S: GraphSession + ?Sized,
{
    if a == b {
        return Ok(true);
    }

    let mut walks = [UpwardWalk::new(a), UpwardWalk::new(b)];
    let mut side = 0;

    while !(walks[0].is_exhausted() && walks[1].is_exhausted()) {
        if walks[side].is_exhausted() {
            side = 1 - side;
        }
        let Some(person) = walks[side].queue.pop_front() else {
            continue;
        };

        for parent in session.get_parents(person).await? {
            if walks[1 - side].seen.contains(&parent) {
                return Ok(true);
            }
            if walks[side].seen.insert(parent) {
                walks[side].queue.push_back(parent);
            }
        }

        side = 1 - side;
    }

    Ok(false)
}

struct UpwardWalk {
    seen: HashSet<PersonId>,
    queue: VecDeque<PersonId>,
}

impl UpwardWalk {
    fn new(start: PersonId) -> Self {
        Self {
            seen: HashSet::from([start]),
            queue: VecDeque::from([start]),
        }
    }

    fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Children shared by `a` and `b`, ordered by id.
pub async fn common_children<S>(
    session: &mut S,
    a: PersonId,
    b: PersonId,
) -> Result<Vec<PersonId>, S::Error>
where
    S: GraphSession + ?Sized,
{
    let first: BTreeSet<PersonId> = session.get_children(a).await?.into_iter().collect();
    let second: BTreeSet<PersonId> = session.get_children(b).await?.into_iter().collect();
    Ok(first.intersection(&second).copied().collect())
}

/// Number of children shared by `child`'s parents, counted only when the
/// child has exactly two parents and they are married to each other.
///
/// Unmarried parents yield zero.
pub async fn marital_sibling_count<S>(session: &mut S, child: PersonId) -> Result<usize, S::Error>
where
    S: GraphSession + ?Sized,
{
    let parents = session.get_parents(child).await?;
    let &[first, second] = parents.as_slice() else {
        return Ok(0);
    };
    if session.get_spouse(first).await? != Some(second) {
        return Ok(0);
    }
    Ok(common_children(session, first, second).await?.len())
}

/// Everyone one edge away from `person`, ignoring direction and type.
pub async fn neighbours<S>(session: &mut S, person: PersonId) -> Result<BTreeSet<PersonId>, S::Error>
where
    S: GraphSession + ?Sized,
{
    let mut out = BTreeSet::new();
    out.extend(session.get_parents(person).await?);
    out.extend(session.get_children(person).await?);
    if let Some(spouse) = session.get_spouse(person).await? {
        out.insert(spouse);
    }
    out.remove(&person);
    Ok(out)
}

/// Length of the shortest undirected path between `a` and `b`.
///
/// Returns `None` when the two people are in different components.
pub async fn shortest_path_length<S>(
    session: &mut S,
    a: PersonId,
    b: PersonId,
) -> Result<Option<usize>, S::Error>
where
    S: GraphSession + ?Sized,
{
    if a == b {
        return Ok(Some(0));
    }

    let mut forward = Frontier::new(a);
    let mut backward = Frontier::new(b);

    while !forward.current.is_empty() && !backward.current.is_empty() {
        let (near, far) = if forward.current.len() <= backward.current.len() {
            (&mut forward, &backward)
        } else {
            (&mut backward, &forward)
        };
        if let Some(length) = near.advance(session, far).await? {
            return Ok(Some(length));
        }
    }

    Ok(None)
}

/// One side of a bidirectional BFS.
struct Frontier {
    /// Distance from this side's start for every person reached.
    depth: HashMap<PersonId, usize>,
    /// People at distance `level`, not yet expanded.
    current: Vec<PersonId>,
    level: usize,
}

impl Frontier {
    fn new(start: PersonId) -> Self {
        Self {
            depth: HashMap::from([(start, 0)]),
            current: vec![start],
            level: 0,
        }
    }

    /// Expand one whole level. Returns the shortest meeting length found in
    /// that level, if the two searches touched.
    async fn advance<S>(&mut self, session: &mut S, other: &Frontier) -> Result<Option<usize>, S::Error>
    where
        S: GraphSession + ?Sized,
    {
        let level = std::mem::take(&mut self.current);
        let next_depth = self.level + 1;
        let mut best: Option<usize> = None;

        for person in level {
            for next in neighbours(session, person).await? {
                if let Some(remaining) = other.depth.get(&next) {
                    let length = next_depth + remaining;
                    best = Some(best.map_or(length, |b| b.min(length)));
                }
                if !self.depth.contains_key(&next) {
                    self.depth.insert(next, next_depth);
                    self.current.push(next);
                }
            }
        }

        self.level = next_depth;
        Ok(best)
    }
}

/// Collect the raw family tree fragment around `root`.
///
/// The fragment holds:
/// 1. ancestors, with the PARENT edge to the child they were reached from
/// 2. descendants, with the PARENT edge from their parent
/// 3. siblings, with the shared parent's PARENT edge
/// 4. nephews, with their parent's (the sibling's) PARENT edge
/// 5. SPOUSE edges between two members of the ancestor set
///
/// People may be reached more than once; the fragment is meant to be passed
/// through [`crate::types::FamilyTree::reduce`].
pub async fn collect_family_fragment<S>(session: &mut S, root: PersonId) -> Result<TreeFragment, S::Error>
where
    S: GraphSession + ?Sized,
{
    let mut fragment = TreeFragment::new();

    // Ancestors (root included, zero hops)
    let mut ancestors: BTreeSet<PersonId> = BTreeSet::from([root]);
    let mut stack = vec![root];
    while let Some(person) = stack.pop() {
        for parent in session.get_parents(person).await? {
            fragment.relations.push(Relation::parent(parent, person));
            if ancestors.insert(parent) {
                stack.push(parent);
            }
        }
    }

    // Marriages inside the bloodline
    for &ancestor in &ancestors {
        if let Some(spouse) = session.get_spouse(ancestor).await? {
            if spouse != ancestor && ancestors.contains(&spouse) {
                fragment.relations.push(Relation::spouse(ancestor, spouse));
            }
        }
    }

    // Descendants
    let mut descendants: BTreeSet<PersonId> = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(person) = stack.pop() {
        for child in session.get_children(person).await? {
            fragment.relations.push(Relation::parent(person, child));
            if child != root && descendants.insert(child) {
                stack.push(child);
            }
        }
    }

    // Siblings through either parent
    let mut siblings: BTreeSet<PersonId> = BTreeSet::new();
    for parent in session.get_parents(root).await? {
        for child in session.get_children(parent).await? {
            fragment.relations.push(Relation::parent(parent, child));
            if child != root {
                siblings.insert(child);
            }
        }
    }

    // Nephews
    let mut nephews: BTreeSet<PersonId> = BTreeSet::new();
    for &sibling in &siblings {
        for child in session.get_children(sibling).await? {
            fragment.relations.push(Relation::parent(sibling, child));
            nephews.insert(child);
        }
    }

    let members: Vec<PersonId> = ancestors
        .into_iter()
        .chain(descendants)
        .chain(siblings)
        .chain(nephews)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    fragment.people = session.get_persons(&members).await?;

    Ok(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FamilyGraph, GraphStore, InMemoryGraphStore, SessionMode};
    use crate::types::{FamilyTree, Person, RelationType};
    use proptest::prelude::*;
    use uuid::Uuid;

    fn id(n: u128) -> PersonId {
        PersonId::new(Uuid::from_u128(n))
    }

    fn build(people: u128, relations: &[(u128, u128, RelationType)]) -> InMemoryGraphStore {
        let mut graph = FamilyGraph::new();
        for n in 1..=people {
            graph.add_person(Person::new(id(n), format!("p{}", n)));
        }
        for &(from, to, relation_type) in relations {
            graph.add_relation(Relation::new(id(from), id(to), relation_type));
        }
        InMemoryGraphStore::from_graph(graph)
    }

    use RelationType::{Parent as P, Spouse as S};

    //     1 = 2      5
    //      / \       |
    //     3   4      6
    //     |
    //     7
    fn family() -> InMemoryGraphStore {
        build(
            7,
            &[
                (1, 3, P),
                (2, 3, P),
                (1, 4, P),
                (2, 4, P),
                (1, 2, S),
                (3, 7, P),
                (5, 6, P),
            ],
        )
    }

    #[tokio::test]
    async fn test_common_ancestor_between_siblings() {
        let store = family();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert!(has_common_ancestor(&mut session, id(3), id(4)).await.unwrap());
        assert!(!has_common_ancestor(&mut session, id(3), id(6)).await.unwrap());
    }

    #[tokio::test]
    async fn test_common_ancestor_when_one_is_ancestor_of_other() {
        let store = family();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert!(has_common_ancestor(&mut session, id(1), id(7)).await.unwrap());
        assert!(has_common_ancestor(&mut session, id(7), id(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_spouses_without_shared_ancestry() {
        let store = family();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert!(!has_common_ancestor(&mut session, id(1), id(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_marital_sibling_count() {
        let store = family();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert_eq!(marital_sibling_count(&mut session, id(3)).await.unwrap(), 2);
        // Single parent
        assert_eq!(marital_sibling_count(&mut session, id(7)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_marital_sibling_count_unmarried_parents() {
        let store = build(3, &[(1, 3, P), (2, 3, P)]);
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert_eq!(marital_sibling_count(&mut session, id(3)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_shortest_path_lengths() {
        let store = family();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert_eq!(shortest_path_length(&mut session, id(1), id(2)).await.unwrap(), Some(1));
        assert_eq!(shortest_path_length(&mut session, id(3), id(4)).await.unwrap(), Some(2));
        assert_eq!(shortest_path_length(&mut session, id(7), id(4)).await.unwrap(), Some(3));
        assert_eq!(shortest_path_length(&mut session, id(7), id(2)).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_shortest_path_disconnected() {
        let store = family();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert_eq!(shortest_path_length(&mut session, id(7), id(6)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_shortest_path_long_chain() {
        let n = 2_000u128;
        let relations: Vec<_> = (1..n).map(|i| (i, i + 1, P)).collect();
        let store = build(n, &relations);
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        let length = shortest_path_length(&mut session, id(1), id(n)).await.unwrap();
        assert_eq!(length, Some((n - 1) as usize));
    }

    #[tokio::test]
    async fn test_shortest_path_prefers_spouse_shortcut() {
        // 1 -> 2 -> 3 -> 4, and 1 = 5, 5 -> 4
        let store = build(5, &[(1, 2, P), (2, 3, P), (3, 4, P), (1, 5, S), (5, 4, P)]);
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        assert_eq!(shortest_path_length(&mut session, id(1), id(4)).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_family_fragment_for_grandchild() {
        let store = family();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        let fragment = collect_family_fragment(&mut session, id(7)).await.unwrap();
        let tree = FamilyTree::reduce(id(7), fragment);

        // 7, its parent 3, grandparents 1 and 2. 4 is an aunt, not included.
        let ids: Vec<_> = tree.people.iter().map(|n| n.person.id).collect();
        assert_eq!(ids, vec![id(1), id(2), id(3), id(7)]);
        assert!(tree.has_relation(Relation::spouse(id(1), id(2))));
        assert!(tree.has_relation(Relation::parent(id(3), id(7))));
        assert!(!tree.has_relation(Relation::parent(id(1), id(4))));
    }

    #[tokio::test]
    async fn test_family_fragment_siblings_and_nephews() {
        let store = family();
        let mut session = store.open_session(SessionMode::Read).await.unwrap();

        let fragment = collect_family_fragment(&mut session, id(4)).await.unwrap();
        let tree = FamilyTree::reduce(id(4), fragment);

        assert!(tree.contains(id(3)));
        assert!(tree.contains(id(7)));
        assert!(tree.has_relation(Relation::parent(id(3), id(7))));
        assert!(!tree.contains(id(5)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_common_ancestor_is_symmetric(
            edges in proptest::collection::vec((1u128..=12, 1u128..=12), 0..24),
            a in 1u128..=12,
            b in 1u128..=12,
        ) {
            // Orient every edge from the lower to the higher id so the PARENT
            // graph stays acyclic, as validation guarantees.
            let relations: Vec<_> = edges
                .into_iter()
                .filter(|(x, y)| x != y)
                .map(|(x, y)| (x.min(y), x.max(y), P))
                .collect();
            let store = build(12, &relations);

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let (forward, backward) = runtime.block_on(async {
                let mut session = store.open_session(SessionMode::Read).await.unwrap();
                let forward = has_common_ancestor(&mut session, id(a), id(b)).await.unwrap();
                let backward = has_common_ancestor(&mut session, id(b), id(a)).await.unwrap();
                (forward, backward)
            });

            prop_assert_eq!(forward, backward);
        }
    }
}
