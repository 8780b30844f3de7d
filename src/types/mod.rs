//! Core types for the kinship kernel.

pub mod person;
pub mod relation;
pub mod tree;

pub use person::{PaginationDetails, PeopleList, Person, PersonId, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use relation::{Relation, RelationType, MAX_PARENTS};
pub use tree::{FamilyTree, FamilyTreeNode, TreeFragment, TreeRelation};
