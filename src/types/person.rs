//! Person types for the kinship kernel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default page size when the caller passes none (or a non-positive one).
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 50;

/// Unique identifier for a person in the kinship graph.
///
/// Wraps a UUID and implements `Ord` for deterministic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(Uuid);

impl PersonId {
    /// Create a new PersonId from a UUID.
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random identity.
    ///
    /// Stores call this when a person is created; identities are never
    /// reassigned afterwards.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Whether this is the all-zero UUID, which never names a stored person.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl FromStr for PersonId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PersonId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A person stored in the kinship graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    /// Store-assigned identity.
    pub id: PersonId,
    /// Display name, trimmed and non-empty.
    pub name: String,
}

impl Person {
    /// Create a person value.
    pub fn new(id: PersonId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Page request for listing people.
///
/// Constructed through [`PaginationDetails::new`], which clamps raw caller
/// input, so a value of this type always holds a valid page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationDetails {
    page: usize,
    page_size: usize,
}

impl PaginationDetails {
    /// Clamp raw paging input.
    ///
    /// - `page < 0` becomes `0`
    /// - `page_size <= 0` becomes [`DEFAULT_PAGE_SIZE`]
    /// - `page_size > MAX_PAGE_SIZE` becomes [`MAX_PAGE_SIZE`]
    pub fn new(page: i64, page_size: i64) -> Self {
        let page = usize::try_from(page.max(0)).unwrap_or(0);
        let page_size = if page_size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            usize::try_from(page_size)
                .unwrap_or(MAX_PAGE_SIZE)
                .min(MAX_PAGE_SIZE)
        };
        Self { page, page_size }
    }

    /// Zero-based page index.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Number of items per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of items to skip before this page starts.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }
}

impl Default for PaginationDetails {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// One page of people plus the totals a client needs for paging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeopleList {
    /// People on this page.
    pub content: Vec<Person>,
    /// Page index this list was produced for.
    pub page: usize,
    /// Total number of people in the store.
    pub total_items: usize,
}
