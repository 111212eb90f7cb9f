//! Collaborators and per-request context shared by the engines.

use pa_common::{DefinitionScope, Error, Result};

use crate::access::AccessPolicy;
use crate::definition::DefinitionService;
use crate::log_event;
use crate::logging::{event_names, generate_request_id, LogContext, Stage};
use crate::store::InstanceStore;
use crate::variables::VariableNameService;

/// External services an analysis reads from.
#[derive(Clone, Copy)]
pub struct AnalysisServices<'a> {
    pub definitions: &'a dyn DefinitionService,
    pub store: &'a dyn InstanceStore,
    pub access: &'a dyn AccessPolicy,
    pub variables: &'a dyn VariableNameService,
}

impl AnalysisServices<'_> {
    /// Fail with `AccessDenied` unless the request's user may see `scope`.
    pub fn authorize(&self, ctx: &RequestContext, scope: &DefinitionScope) -> Result<()> {
        if self.access.can_access(&ctx.user_id, scope) {
            return Ok(());
        }
        log_event!(
            ctx.log,
            WARN,
            event_names::ACCESS_DENIED,
            Stage::Init,
            "access denied",
            definition_key = scope.key.as_str()
        );
        Err(Error::AccessDenied {
            user_id: ctx.user_id.clone(),
            definition_key: scope.key.clone(),
        })
    }
}

/// Who is asking, plus the logging context of the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
    pub log: LogContext,
}

impl RequestContext {
    /// Context with a fresh request id.
    pub fn new(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        let log = LogContext::new(generate_request_id()).with_user(user_id.clone());
        Self { user_id, log }
    }

    pub fn with_log(user_id: impl Into<String>, log: LogContext) -> Self {
        Self {
            user_id: user_id.into(),
            log,
        }
    }
}
