//! Session resolution: the ordered fallback chain over credential channels.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::credentials::RequestCredentials;
use crate::auth::identity::ResolvedIdentity;
use crate::db::schema::{Department, User};
use crate::db::store::{IdentityStore, StoreError, StoreFuture};
use crate::types::DepartmentId;

/// Session resolution configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Try the personnel API key between the department API key and the
    /// session cookie. Off by default: personnel-scoped routes opt in.
    #[serde(default)]
    pub chain_personnel_api_key: bool,
}

impl SessionConfig {
    /// Create a config whose chain includes the personnel API key stage.
    pub fn with_personnel_api_key() -> Self {
        Self {
            chain_personnel_api_key: true,
        }
    }
}

/// Outcome of one resolution stage, or of the whole chain.
///
/// `error` is diagnostic only. A failed lookup has already been logged and
/// is treated as "not found", so the identity is still usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    identity: ResolvedIdentity,
    error: Option<StoreError>,
}

impl Resolution {
    fn resolved(identity: ResolvedIdentity) -> Self {
        Self {
            identity,
            error: None,
        }
    }

    fn degraded(identity: ResolvedIdentity, error: StoreError) -> Self {
        Self {
            identity,
            error: Some(error),
        }
    }

    /// Keep an earlier stage's error when this stage had none.
    fn after(mut self, earlier: Option<StoreError>) -> Self {
        if self.error.is_none() {
            self.error = earlier;
        }
        self
    }

    /// Get the resolved identity.
    pub fn identity(&self) -> &ResolvedIdentity {
        &self.identity
    }

    /// Consume and return the resolved identity.
    pub fn into_identity(self) -> ResolvedIdentity {
        self.identity
    }

    /// The store error hit while resolving, if any.
    pub fn error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    /// Shortcut for `identity().department()`.
    pub fn department(&self) -> Option<&Department> {
        self.identity.department()
    }
}

/// Resolves caller identity from request credentials.
///
/// Stages are independently callable; [`SessionResolver::resolve`] runs them
/// in priority order and stops at the first one that yields a department.
/// Each lookup is attempted at most once per call and nothing is written.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn IdentityStore>,
    config: SessionConfig,
}

impl SessionResolver {
    /// Create a resolver with the default chain.
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self::with_config(store, SessionConfig::default())
    }

    pub fn with_config(store: Arc<dyn IdentityStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the resolution chain.
    ///
    /// Department API key first; then, if configured, the personnel API key;
    /// then the session cookie. Never fails: an unauthenticated caller gets
    /// an anonymous identity.
    pub async fn resolve(&self, credentials: &RequestCredentials) -> Resolution {
        let by_api_key = self.auth_by_api_key(credentials).await;
        if by_api_key.department().is_some() {
            return by_api_key;
        }
        let mut earlier = by_api_key.error;

        if self.config.chain_personnel_api_key {
            let by_personnel_key = self.auth_by_personnel_api_key(credentials).await;
            if by_personnel_key.department().is_some() {
                return by_personnel_key;
            }
            earlier = by_personnel_key.error.or(earlier);
        }

        self.auth_by_seneca_cookie(credentials).await.after(earlier)
    }

    /// Resolve a department from its API key.
    pub async fn auth_by_api_key(&self, credentials: &RequestCredentials) -> Resolution {
        let api_key = credentials.api_key();
        if api_key.is_empty() {
            return Resolution::default();
        }

        let found = self
            .lookup(
                "find_department_by_api_key",
                self.store.find_department_by_api_key(&api_key),
            )
            .await;
        department_resolution(found)
    }

    /// Resolve a department from a personnel API key held by any of its agencies.
    pub async fn auth_by_personnel_api_key(&self, credentials: &RequestCredentials) -> Resolution {
        let personnel_api_key = credentials.personnel_api_key();
        if personnel_api_key.is_empty() {
            return Resolution::default();
        }

        let found = self
            .lookup(
                "find_department_by_personnel_api_key",
                self.store
                    .find_department_by_personnel_api_key(&personnel_api_key),
            )
            .await;
        department_resolution(found)
    }

    /// Resolve session, user and department from the session cookie.
    ///
    /// Each lookup gates the next; the identity keeps whatever prefix of the
    /// chain was found.
    pub async fn auth_by_seneca_cookie(&self, credentials: &RequestCredentials) -> Resolution {
        let token = credentials.session_token();
        if token.is_empty() {
            return Resolution::default();
        }

        let session = match self
            .lookup(
                "find_session_by_token",
                self.store.find_session_by_token(&token),
            )
            .await
        {
            Ok(Some(session)) if session.active => session,
            Ok(_) => return Resolution::default(),
            Err(e) => return Resolution::degraded(ResolvedIdentity::anonymous(), e),
        };

        let user_id = session.user.clone();
        let identity = ResolvedIdentity::anonymous().with_session(session);
        if user_id.is_empty() {
            debug!("Session has no user reference");
            return Resolution::resolved(identity);
        }

        let user = match self
            .lookup("find_user_by_id", self.store.find_user_by_id(&user_id))
            .await
        {
            Ok(Some(user)) if user.active => user,
            Ok(_) => return Resolution::resolved(identity),
            Err(e) => return Resolution::degraded(identity, e),
        };

        let department_id = effective_department_id(&user, credentials);
        let identity = identity.with_user(user);
        let Some(department_id) = department_id else {
            return Resolution::resolved(identity);
        };

        match self
            .lookup(
                "find_department_by_id",
                self.store.find_department_by_id(&department_id),
            )
            .await
        {
            Ok(Some(department)) if department.active => {
                Resolution::resolved(identity.with_department(department))
            }
            Ok(Some(_)) => {
                debug!(department_id = %department_id, "Department is inactive");
                Resolution::resolved(identity)
            }
            Ok(None) => Resolution::resolved(identity),
            Err(e) => Resolution::degraded(identity, e),
        }
    }

    /// Await a store lookup, logging any failure.
    async fn lookup<T>(
        &self,
        operation: &'static str,
        lookup: StoreFuture<'_, T>,
    ) -> Result<Option<T>, StoreError> {
        lookup.await.inspect_err(|e| {
            warn!(operation, error = %e, "Identity lookup failed, treating as not found");
        })
    }
}

fn department_resolution(found: Result<Option<Department>, StoreError>) -> Resolution {
    match found {
        Ok(Some(department)) if department.active => {
            Resolution::resolved(ResolvedIdentity::anonymous().with_department(department))
        }
        Ok(_) => Resolution::default(),
        Err(e) => Resolution::degraded(ResolvedIdentity::anonymous(), e),
    }
}

/// Pick the department a cookie-authenticated user acts in.
///
/// The user's own department wins. Without one, the `departmentId` query
/// parameter is used; a superuser without either stays tenant-less.
fn effective_department_id(user: &User, credentials: &RequestCredentials) -> Option<DepartmentId> {
    if let Some(own) = user.own_department_id() {
        return Some(own.clone());
    }

    let selected = credentials.department_id();
    if selected.is_empty() {
        if user.superuser {
            debug!(user_id = %user.id, "Superuser without department selection");
        }
        return None;
    }

    Some(DepartmentId::new(selected))
}
