//! Request-scoped context passed explicitly through the call chain.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for a single request, threaded as an argument through service
/// calls instead of living in ambient/global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Correlation ID for tracing a request across components.
    pub correlation_id: Uuid,

    /// The authenticated principal, when one is known.
    pub principal: Option<String>,
}

impl RequestContext {
    /// Creates a context with a fresh correlation ID and no principal.
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            principal: None,
        }
    }

    /// Creates a context with an explicit correlation ID.
    pub fn with_correlation_id(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            principal: None,
        }
    }

    /// Returns a copy of this context carrying the given principal.
    pub fn for_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
