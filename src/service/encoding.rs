//! Family tree response encodings.
//!
//! The tree endpoint answers in the format named by the `Accept` header:
//!
//! | Accept | Body |
//! |--------|------|
//! | `application/xml` | XML document rooted at `<familyTree>` |
//! | `binary`, `application/octet-stream` | bincode of [`FamilyTreeDocument`] |
//! | `application/json`, anything else, absent | JSON [`FamilyTreeResponse`] |
//!
//! The first recognised media type in header order wins; `q` parameters
//! are ignored.

use axum::http::header::ACCEPT;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::FamilyTree;

use super::routes::FamilyTreeResponse;

/// Output format of a family tree response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeFormat {
    /// `application/json`.
    Json,
    /// `application/xml`.
    Xml,
    /// bincode, served as `application/octet-stream`.
    Binary,
}

impl TreeFormat {
    /// Pick the format from the request's `Accept` headers.
    pub fn from_accept(headers: &HeaderMap) -> Self {
        headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .find_map(|item| Self::from_media_type(item.split(';').next().unwrap_or_default().trim()))
            .unwrap_or(Self::Json)
    }

    fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "application/json" => Some(Self::Json),
            "application/xml" => Some(Self::Xml),
            "binary" | "application/octet-stream" => Some(Self::Binary),
            _ => None,
        }
    }

    /// `Content-Type` of a body in this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Binary => "application/octet-stream",
        }
    }
}

/// Error raised while encoding a tree.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// JSON serialization failed.
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    /// XML serialization failed.
    #[error("xml encoding failed: {0}")]
    Xml(#[from] quick_xml::SeError),
    /// bincode serialization failed.
    #[error("binary encoding failed: {0}")]
    Binary(#[from] bincode::Error),
}

/// Family tree shape shared by the XML and binary encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "familyTree")]
pub struct FamilyTreeDocument {
    /// Person the tree was built around.
    #[serde(rename = "@root")]
    pub root: Uuid,
    /// One entry per person, ordered by id.
    #[serde(default)]
    pub people: Vec<FamilyTreeDocumentNode>,
}

/// One person and the relations listed on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTreeDocumentNode {
    /// The person.
    pub person: PersonDocument,
    /// Relations listed on this person.
    #[serde(default)]
    pub relations: Vec<FamilyTreeDocumentRelation>,
}

/// Person record inside a tree document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDocument {
    /// Person id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

/// Relation record inside a tree document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTreeDocumentRelation {
    /// The other endpoint, as an attribute in XML.
    #[serde(rename = "@id")]
    pub relative_id: Uuid,
    /// `PARENT` or `SPOUSE`.
    #[serde(rename = "relationType")]
    pub relation_type: String,
}

impl From<FamilyTree> for FamilyTreeDocument {
    fn from(tree: FamilyTree) -> Self {
        Self {
            root: tree.root.as_uuid(),
            people: tree
                .people
                .into_iter()
                .map(|node| FamilyTreeDocumentNode {
                    person: PersonDocument {
                        id: node.person.id.as_uuid(),
                        name: node.person.name,
                    },
                    relations: node
                        .relations
                        .into_iter()
                        .map(|r| FamilyTreeDocumentRelation {
                            relative_id: r.person_id.as_uuid(),
                            relation_type: r.relation_type.as_str().to_string(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Encode `tree` as a response body in `format`.
pub fn encode_tree(format: TreeFormat, tree: FamilyTree) -> Result<Vec<u8>, EncodeError> {
    let body = match format {
        TreeFormat::Json => serde_json::to_vec(&FamilyTreeResponse::from(tree))?,
        TreeFormat::Xml => quick_xml::se::to_string(&FamilyTreeDocument::from(tree))?.into_bytes(),
        TreeFormat::Binary => bincode::serialize(&FamilyTreeDocument::from(tree))?,
    };
    Ok(body)
}
