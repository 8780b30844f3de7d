//! Relation types for the kinship kernel.

use serde::{Deserialize, Serialize};
use std::fmt;
use super::person::PersonId;

/// Maximum number of PARENT edges a child may have.
pub const MAX_PARENTS: usize = 2;

/// Type of edge in the kinship graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// Parent → child. Directional.
    Parent,
    /// Marriage. Stored once, read from either endpoint.
    Spouse,
}

impl RelationType {
    /// Parse relation type from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PARENT" => Some(Self::Parent),
            "SPOUSE" => Some(Self::Spouse),
            _ => None,
        }
    }

    /// Stable storage/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parent => "PARENT",
            Self::Spouse => "SPOUSE",
        }
    }

    /// Whether the edge direction carries meaning.
    pub fn is_directional(&self) -> bool {
        matches!(self, Self::Parent)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge in the kinship graph.
///
/// For `Parent`, `from` is the parent and `to` the child. For `Spouse` the
/// order is whatever the caller supplied; use [`Relation::canonical`] when
/// two spouse edges must compare equal regardless of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relation {
    /// Source person (the parent for PARENT edges).
    pub from: PersonId,
    /// Target person (the child for PARENT edges).
    pub to: PersonId,
    /// Type of edge.
    pub relation_type: RelationType,
}

impl Relation {
    /// Create a new relation.
    pub fn new(from: PersonId, to: PersonId, relation_type: RelationType) -> Self {
        Self {
            from,
            to,
            relation_type,
        }
    }

    /// Parent → child edge.
    pub fn parent(parent: PersonId, child: PersonId) -> Self {
        Self::new(parent, child, RelationType::Parent)
    }

    /// Spouse edge between two people.
    pub fn spouse(first: PersonId, second: PersonId) -> Self {
        Self::new(first, second, RelationType::Spouse)
    }

    /// Normalize non-directional edges so `from <= to`.
    pub fn canonical(self) -> Self {
        if !self.relation_type.is_directional() && self.to < self.from {
            Self::new(self.to, self.from, self.relation_type)
        } else {
            self
        }
    }

    /// Whether both endpoints are the same person.
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id(n: u128) -> PersonId {
        PersonId::new(Uuid::from_u128(n))
    }

    #[test]
    fn test_spouse_canonical_ignores_direction() {
        assert_eq!(
            Relation::spouse(id(2), id(1)).canonical(),
            Relation::spouse(id(1), id(2)).canonical()
        );
    }

    #[test]
    fn test_parent_canonical_keeps_direction() {
        let edge = Relation::parent(id(2), id(1));
        assert_eq!(edge.canonical(), edge);
        assert_ne!(edge, Relation::parent(id(1), id(2)));
    }

    #[test]
    fn test_relation_type_parse() {
        assert_eq!(RelationType::from_str("parent"), Some(RelationType::Parent));
        assert_eq!(RelationType::from_str("SPOUSE"), Some(RelationType::Spouse));
        assert_eq!(RelationType::from_str("cousin"), None);
        assert_eq!(RelationType::Spouse.to_string(), "SPOUSE");
    }

    #[test]
    fn test_relation_type_serializes_uppercase() {
        let json = serde_json::to_string(&RelationType::Parent).unwrap();
        assert_eq!(json, "\"PARENT\"");
    }
}
