//! Family tree types.
//!
//! A [`TreeFragment`] is what a traversal (or a store's native query) hands
//! back: people and edges in discovery order, possibly repeated when a
//! relative is reachable along more than one path. [`FamilyTree::reduce`]
//! folds a fragment into the deduplicated view served to callers.
//!
//! ## Reduction Guarantees
//!
//! - Each person appears exactly once, ordered by `PersonId`
//! - A node never lists the same `(target, type)` pair twice
//! - PARENT edges are listed on the parent
//! - SPOUSE edges are listed once, on the endpoint with the smaller `PersonId`
//! - Edges touching a person outside the fragment are dropped

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::person::{Person, PersonId};
use super::relation::{Relation, RelationType};

/// Raw traversal output, before deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeFragment {
    /// People discovered, possibly with repeats.
    pub people: Vec<Person>,
    /// Edges discovered, possibly with repeats or in both spouse directions.
    pub relations: Vec<Relation>,
}

impl TreeFragment {
    /// Create an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of raw edges, repeats included.
    pub fn raw_relation_count(&self) -> usize {
        self.relations.len()
    }
}

/// Outgoing relation on a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TreeRelation {
    /// The relative this edge points at.
    pub person_id: PersonId,
    /// Type of edge.
    pub relation_type: RelationType,
}

/// One person in a family tree with its outgoing relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTreeNode {
    /// The person.
    pub person: Person,
    /// Outgoing relations, sorted and unique.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<TreeRelation>,
}

/// Deduplicated family tree rooted at one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTree {
    /// The person the tree was built for.
    pub root: PersonId,
    /// Every relevant person, once, sorted by id.
    pub people: Vec<FamilyTreeNode>,
}

impl FamilyTree {
    /// Reduce a raw fragment into a deduplicated tree.
    pub fn reduce(root: PersonId, fragment: TreeFragment) -> Self {
        let mut people: BTreeMap<PersonId, Person> = BTreeMap::new();
        for person in fragment.people {
            people.entry(person.id).or_insert(person);
        }

        let mut outgoing: BTreeMap<PersonId, BTreeSet<TreeRelation>> = BTreeMap::new();
        for relation in fragment.relations {
            if relation.is_self_loop() {
                continue;
            }
            if !people.contains_key(&relation.from) || !people.contains_key(&relation.to) {
                continue;
            }
            let edge = relation.canonical();
            outgoing.entry(edge.from).or_default().insert(TreeRelation {
                person_id: edge.to,
                relation_type: edge.relation_type,
            });
        }

        let people = people
            .into_values()
            .map(|person| {
                let relations = outgoing
                    .remove(&person.id)
                    .map(|set| set.into_iter().collect())
                    .unwrap_or_default();
                FamilyTreeNode { person, relations }
            })
            .collect();

        Self { root, people }
    }

    /// Number of people in the tree.
    pub fn len(&self) -> usize {
        self.people.len()
    }

    /// Whether the tree is empty (never true for a tree built from a stored root).
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// Look up a node by person id.
    pub fn node(&self, id: PersonId) -> Option<&FamilyTreeNode> {
        self.people
            .binary_search_by(|node| node.person.id.cmp(&id))
            .ok()
            .map(|idx| &self.people[idx])
    }

    /// Whether the person is part of the tree.
    pub fn contains(&self, id: PersonId) -> bool {
        self.node(id).is_some()
    }

    /// Whether the tree lists `relation` (spouse direction ignored).
    pub fn has_relation(&self, relation: Relation) -> bool {
        let edge = relation.canonical();
        self.node(edge.from).is_some_and(|node| {
            node.relations.iter().any(|r| {
                r.person_id == edge.to && r.relation_type == edge.relation_type
            })
        })
    }

    /// Total number of listed relations.
    pub fn relation_count(&self) -> usize {
        self.people.iter().map(|node| node.relations.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn person(n: u128) -> Person {
        Person::new(PersonId::new(Uuid::from_u128(n)), format!("p{}", n))
    }

    fn id(n: u128) -> PersonId {
        PersonId::new(Uuid::from_u128(n))
    }

    #[test]
    fn test_reduce_dedups_people_and_relations() {
        let fragment = TreeFragment {
            people: vec![person(1), person(2), person(1), person(3), person(2)],
            relations: vec![
                Relation::parent(id(1), id(2)),
                Relation::parent(id(1), id(2)),
                Relation::parent(id(2), id(3)),
            ],
        };

        let tree = FamilyTree::reduce(id(3), fragment);

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.relation_count(), 2);
        assert_eq!(tree.node(id(1)).unwrap().relations.len(), 1);
    }

    #[test]
    fn test_reduce_lists_spouse_once() {
        let fragment = TreeFragment {
            people: vec![person(1), person(2)],
            relations: vec![Relation::spouse(id(2), id(1)), Relation::spouse(id(1), id(2))],
        };

        let tree = FamilyTree::reduce(id(1), fragment);

        assert_eq!(tree.relation_count(), 1);
        assert!(tree.node(id(2)).unwrap().relations.is_empty());
        assert!(tree.has_relation(Relation::spouse(id(2), id(1))));
    }

    #[test]
    fn test_reduce_drops_dangling_edges() {
        let fragment = TreeFragment {
            people: vec![person(1)],
            relations: vec![Relation::parent(id(1), id(9)), Relation::parent(id(1), id(1))],
        };

        let tree = FamilyTree::reduce(id(1), fragment);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.relation_count(), 0);
    }

    #[test]
    fn test_people_sorted_by_id() {
        let fragment = TreeFragment {
            people: vec![person(5), person(2), person(9)],
            relations: vec![],
        };

        let tree = FamilyTree::reduce(id(2), fragment);
        let ids: Vec<_> = tree.people.iter().map(|n| n.person.id).collect();

        assert_eq!(ids, vec![id(2), id(5), id(9)]);
    }
}
