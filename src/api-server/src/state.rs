use crate::error::{ApiError, Result};
use crate::extract::Caller;
use hrms_authz::{AccessControlConfig, Action, AuthorizationGate, PermissionResolver};
use hrms_org::{EngineConfig, OrgConsistencyEngine, OrgStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Department consistency engine
    pub engine: Arc<OrgConsistencyEngine>,

    /// Role-based authorization gate
    pub gate: AuthorizationGate,

    /// Server start time for uptime calculation
    pub start_time: Instant,

    pub version: String,
}

impl AppState {
    pub fn new(engine: OrgConsistencyEngine, gate: AuthorizationGate) -> Self {
        Self {
            engine: Arc::new(engine),
            gate,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Standard access control and default engine settings over `store`
    pub fn with_store(store: Arc<dyn OrgStore>) -> Self {
        let gate = AuthorizationGate::new(PermissionResolver::new(Arc::new(
            AccessControlConfig::standard(),
        )));
        Self::new(OrgConsistencyEngine::new(EngineConfig::default(), store), gate)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Fail with 403 unless the caller's role may perform `action` on `resource`
    pub fn authorize(&self, caller: &Caller, resource: &str, action: Action) -> Result<()> {
        if self.gate.check(caller.role, resource, action) {
            return Ok(());
        }

        debug!(
            user = %caller.user_id,
            role = %caller.role,
            resource,
            action = %action,
            "Access denied"
        );
        Err(ApiError::Forbidden(format!(
            "Role '{}' may not {} {}",
            caller.role, action, resource
        )))
    }
}
