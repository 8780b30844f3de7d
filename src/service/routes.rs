//! Axum routes for the kinship service.

use axum::{
    extract::{Json, Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{FailureClass, KinshipError};
use crate::store::{GraphStore, PoolStats};
use crate::types::{FamilyTree, PaginationDetails, PeopleList, Person, PersonId, RelationType};

use super::encoding::{encode_tree, TreeFormat};
use super::middleware::record_tree_metrics;
use super::state::ServiceState;

/// Query parameter carrying the page index.
pub const PAGE_PARAM: &str = "page";
/// Query parameter carrying the page size.
pub const SIZE_PARAM: &str = "size";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePersonRequest {
    /// Display name; trimmed by the service.
    pub name: String,
}

/// Request to create or delete a PARENT relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentRelationRequest {
    /// The parent.
    #[serde(rename = "parentID")]
    pub parent_id: Uuid,
    /// The child.
    #[serde(rename = "childID")]
    pub child_id: Uuid,
}

/// Request to create or delete a SPOUSE relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpouseRelationRequest {
    /// One spouse.
    #[serde(rename = "firstSpouseID")]
    pub first_spouse_id: Uuid,
    /// The other spouse.
    #[serde(rename = "secondSpouseID")]
    pub second_spouse_id: Uuid,
}

/// Degrees of separation between two people.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaconsNumberResponse {
    /// Number of edges on the shortest path.
    #[serde(rename = "pathLength")]
    pub path_length: usize,
}

/// Paging metadata returned with a people list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMetadata {
    /// Page index the list was produced for.
    pub page: usize,
    /// Total number of stored people.
    #[serde(rename = "totalItems")]
    pub total_items: usize,
}

/// One page of people.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeopleResponse {
    /// People on this page.
    pub content: Vec<Person>,
    /// Paging metadata.
    pub metadata: PaginationMetadata,
}

impl From<PeopleList> for PeopleResponse {
    fn from(list: PeopleList) -> Self {
        Self {
            content: list.content,
            metadata: PaginationMetadata {
                page: list.page,
                total_items: list.total_items,
            },
        }
    }
}

/// Relation record on a family tree node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyTreeRelationDto {
    /// The other endpoint.
    #[serde(rename = "relativeID")]
    pub relative_id: PersonId,
    /// `PARENT` (this person is the relative's parent) or `SPOUSE`.
    pub relation: RelationType,
}

/// One person in a family tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyTreeNodeDto {
    /// The person.
    #[serde(rename = "personID")]
    pub person: Person,
    /// Relations listed on this person.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<FamilyTreeRelationDto>,
}

/// Reduced family tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyTreeResponse {
    /// Person the tree was built around.
    pub root: PersonId,
    /// Every person once, ordered by id.
    pub people: Vec<FamilyTreeNodeDto>,
}

impl From<FamilyTree> for FamilyTreeResponse {
    fn from(tree: FamilyTree) -> Self {
        Self {
            root: tree.root,
            people: tree
                .people
                .into_iter()
                .map(|node| FamilyTreeNodeDto {
                    person: node.person,
                    relations: node
                        .relations
                        .into_iter()
                        .map(|r| FamilyTreeRelationDto {
                            relative_id: r.person_id,
                            relation: r.relation_type,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Store status.
    pub store: StoreHealth,
}

/// Store health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHealth {
    /// Backend name.
    pub backend: String,
    /// Whether the store answered.
    pub connected: bool,
    /// Connection pool usage, for pooled backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether traffic may be routed here.
    pub ready: bool,
    /// Whether the store answered.
    pub store: bool,
    /// Reason when not ready.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// HTTP status for a failure class.
pub fn status_for(class: FailureClass) -> StatusCode {
    match class {
        FailureClass::NotFound => StatusCode::NOT_FOUND,
        FailureClass::BadRequest => StatusCode::BAD_REQUEST,
        FailureClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        FailureClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn kinship_error(e: KinshipError) -> ApiError {
    let kind = e.kind();
    let status = status_for(kind.class());
    tracing::warn!(
        code = kind.code(),
        status = status.as_u16(),
        error = %e,
        "Request error"
    );
    (status, Json(ErrorResponse::new(kind.code(), e.to_string())))
}

fn invalid_uuid(raw: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("INVALID_UUID", "invalid uuid").with_details(raw)),
    )
}

fn path_id(raw: &str) -> Result<PersonId, ApiError> {
    raw.parse::<PersonId>().map_err(|_| invalid_uuid(raw))
}

fn body_id(uuid: Uuid, field: &str) -> Result<PersonId, ApiError> {
    let id = PersonId::new(uuid);
    if id.is_nil() {
        return Err(invalid_uuid(field));
    }
    Ok(id)
}

/// Lenient paging: anything missing or unparsable counts as zero and is
/// then clamped like any other input.
fn pagination_from(params: &HashMap<String, String>) -> PaginationDetails {
    let read = |key: &str| {
        params
            .get(key)
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(0)
    };
    PaginationDetails::new(read(PAGE_PARAM), read(SIZE_PARAM))
}

type AppState<S> = State<Arc<ServiceState<S>>>;

// ============================================================================
// Route Handlers
// ============================================================================

/// List people, one page at a time.
async fn list_people_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PeopleResponse>, ApiError> {
    let list = state
        .kinship
        .get_people(pagination_from(&params))
        .await
        .map_err(kinship_error)?;
    Ok(Json(list.into()))
}

/// Create a person.
async fn create_person_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Json(request): Json<CreatePersonRequest>,
) -> Result<(StatusCode, Json<Person>), ApiError> {
    let person = state
        .kinship
        .create_person(&request.name)
        .await
        .map_err(kinship_error)?;
    Ok((StatusCode::CREATED, Json(person)))
}

/// Fetch a person.
async fn get_person_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Path(person_id): Path<String>,
) -> Result<Json<Person>, ApiError> {
    let id = path_id(&person_id)?;
    let person = state.kinship.get_person(id).await.map_err(kinship_error)?;
    Ok(Json(person))
}

/// Delete a person without relations.
async fn delete_person_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Path(person_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = path_id(&person_id)?;
    state.kinship.delete_person(id).await.map_err(kinship_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Degrees of separation between two people.
async fn bacons_number_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Path((person_id, target_id)): Path<(String, String)>,
) -> Result<Json<BaconsNumberResponse>, ApiError> {
    let from = path_id(&person_id)?;
    let to = path_id(&target_id)?;

    match state.kinship.bacons_number(from, to).await.map_err(kinship_error)? {
        Some(path_length) => Ok(Json(BaconsNumberResponse { path_length })),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "NO_PATH_FOUND",
                "no path found between people",
            )),
        )),
    }
}

/// Reduced family tree around a person.
async fn family_tree_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Path(person_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let root = path_id(&person_id)?;
    let format = TreeFormat::from_accept(&headers);
    let start = Instant::now();
    let tree = state.kinship.family_tree(root).await.map_err(kinship_error)?;
    record_tree_metrics(tree.len(), tree.relation_count(), start.elapsed().as_millis() as u64);

    let body = encode_tree(format, tree).map_err(|e| {
        tracing::error!(error = %e, ?format, "Failed to encode family tree");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("ENCODING_FAILED", e.to_string())),
        )
    })?;
    Ok(([(CONTENT_TYPE, format.content_type())], body).into_response())
}

/// Create a PARENT relation.
async fn create_parent_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Json(request): Json<ParentRelationRequest>,
) -> Result<StatusCode, ApiError> {
    let parent = body_id(request.parent_id, "parentID")?;
    let child = body_id(request.child_id, "childID")?;
    state
        .kinship
        .create_parent_relation(parent, child)
        .await
        .map_err(kinship_error)?;
    Ok(StatusCode::CREATED)
}

/// Delete a PARENT relation.
async fn delete_parent_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Json(request): Json<ParentRelationRequest>,
) -> Result<StatusCode, ApiError> {
    let parent = body_id(request.parent_id, "parentID")?;
    let child = body_id(request.child_id, "childID")?;
    state
        .kinship
        .delete_parent_relation(parent, child)
        .await
        .map_err(kinship_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create a SPOUSE relation.
async fn create_spouse_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Json(request): Json<SpouseRelationRequest>,
) -> Result<StatusCode, ApiError> {
    let first = body_id(request.first_spouse_id, "firstSpouseID")?;
    let second = body_id(request.second_spouse_id, "secondSpouseID")?;
    state
        .kinship
        .create_spouse_relation(first, second)
        .await
        .map_err(kinship_error)?;
    Ok(StatusCode::CREATED)
}

/// Delete a SPOUSE relation.
async fn delete_spouse_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
    Json(request): Json<SpouseRelationRequest>,
) -> Result<StatusCode, ApiError> {
    let first = body_id(request.first_spouse_id, "firstSpouseID")?;
    let second = body_id(request.second_spouse_id, "secondSpouseID")?;
    state
        .kinship
        .delete_spouse_relation(first, second)
        .await
        .map_err(kinship_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Health check endpoint (detailed).
async fn health_handler<S: GraphStore + 'static>(State(state): AppState<S>) -> Json<HealthResponse> {
    let store = state.store();
    let connected = store.is_healthy().await;

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: StoreHealth {
            backend: store.backend_name().to_string(),
            connected,
            pool: store.pool_stats(),
        },
    })
}

/// Liveness check endpoint.
///
/// Does NOT check dependencies. Returns 200 if the process is alive.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness check endpoint.
///
/// Returns 200 if the store answers, 503 otherwise.
async fn readiness_handler<S: GraphStore + 'static>(
    State(state): AppState<S>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.store().is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            store: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                store: false,
                details: Some("Store connection failed".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the kinship service.
pub fn create_router<S: GraphStore + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // People
        .route("/person", get(list_people_handler::<S>).post(create_person_handler::<S>))
        .route("/person/parent", post(create_parent_handler::<S>).delete(delete_parent_handler::<S>))
        .route("/person/spouse", post(create_spouse_handler::<S>).delete(delete_spouse_handler::<S>))
        .route(
            "/person/:person_id",
            get(get_person_handler::<S>).delete(delete_person_handler::<S>),
        )
        // Queries
        .route("/person/:person_id/bacons/:target_id", get(bacons_number_handler::<S>))
        .route("/person/:person_id/tree", get(family_tree_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .with_state(state)
}
