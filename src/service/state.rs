//! Service state and configuration.
//!
//! Contains the shared [`ServiceState`] handed to every handler and the
//! [`ServiceConfig`] the binary loads from the environment.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::kinship::KinshipService;
use crate::store::GraphStore;

/// Which graph store the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL via sqlx.
    Postgres,
    /// Process-local graph, lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend: {}", other)),
        }
    }
}

/// Process configuration.
///
/// Environment variables:
/// - `HOST` (default: 0.0.0.0)
/// - `PORT` (default: 8080)
/// - `WEB_TIMEOUT`: whole-request timeout in seconds (default: 60)
/// - `OPERATION_TIMEOUT_SECS`: per-operation deadline, `0` disables (default: 30)
/// - `KINSHIP_STORE`: `postgres` or `memory` (default: postgres)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Request timeout applied by the HTTP layer.
    pub request_timeout: Duration,
    /// Deadline for a single kinship operation.
    pub operation_timeout: Option<Duration>,
    /// Store backend.
    pub store: StoreBackend,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let store = match std::env::var("KINSHIP_STORE") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Falling back to postgres store");
                StoreBackend::Postgres
            }),
            Err(_) => StoreBackend::Postgres,
        };
        let operation_timeout_secs: u64 = env_or("OPERATION_TIMEOUT_SECS", 30);

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8080),
            request_timeout: Duration::from_secs(env_or("WEB_TIMEOUT", 60)),
            operation_timeout: (operation_timeout_secs > 0)
                .then(|| Duration::from_secs(operation_timeout_secs)),
            store,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(60),
            operation_timeout: Some(Duration::from_secs(30)),
            store: StoreBackend::Postgres,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Shared service state.
pub struct ServiceState<S: GraphStore + 'static> {
    /// Kinship operations over the configured store.
    pub kinship: KinshipService<S>,
}

impl<S: GraphStore + 'static> ServiceState<S> {
    /// Create service state over a store, without an operation deadline.
    pub fn new(store: S) -> Self {
        Self {
            kinship: KinshipService::new(Arc::new(store)),
        }
    }

    /// Create service state with an optional per-operation deadline.
    pub fn with_operation_timeout(store: S, timeout: Option<Duration>) -> Self {
        let kinship = KinshipService::new(Arc::new(store));
        Self {
            kinship: match timeout {
                Some(limit) => kinship.with_operation_timeout(limit),
                None => kinship,
            },
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        self.kinship.store()
    }
}

impl<S: GraphStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            kinship: self.kinship.clone(),
        }
    }
}
