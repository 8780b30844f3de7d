//! Kinship REST Service
//!
//! Exposes the kinship kernel as a REST API.
//!
//! ## Endpoints
//!
//! - `GET /person` - List people (`page`, `size` query parameters)
//! - `POST /person` - Create a person
//! - `GET /person/{id}` - Fetch a person
//! - `DELETE /person/{id}` - Delete a person without relations
//! - `GET /person/{id}/bacons/{target}` - Degrees of separation
//! - `GET /person/{id}/tree` - Reduced family tree (JSON, XML or binary per `Accept`)
//! - `POST /person/parent` / `DELETE /person/parent` - PARENT relations
//! - `POST /person/spouse` / `DELETE /person/spouse` - SPOUSE relations
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness check
//! - `GET /health/ready` - Readiness check

pub mod encoding;
pub mod middleware;
pub mod routes;
pub mod state;

pub use encoding::{encode_tree, EncodeError, FamilyTreeDocument, TreeFormat};
pub use middleware::{metrics_middleware, record_tree_metrics};
pub use routes::{create_router, ErrorResponse};
pub use state::{ServiceConfig, ServiceState, StoreBackend};
