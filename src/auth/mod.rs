//! Caller identity resolution.
//!
//! Determines which department, and optionally which session and user, an
//! inbound request acts as. Credentials are tried in a fixed order:
//!
//! - **API key**: `apiKey` header or query parameter, matched against a
//!   department's own key
//! - **Personnel API key**: `personnelApiKey`, matched against any agency of a
//!   department (only when the chain is configured for it, or called directly)
//! - **Session cookie**: `seneca-login` token, resolved to session, then user,
//!   then the user's department
//!
//! ## Usage
//!
//! ```ignore
//! let resolver = SessionResolver::new(Arc::new(SurrealIdentityStore::new(db)));
//! let credentials = RequestCredentials::from_http(&headers, &uri);
//! let identity = resolver.resolve(&credentials).await.into_identity();
//! ```
//!
//! Resolution never rejects a request. Store failures are logged and treated
//! as "not found"; downstream authorization decides what an anonymous caller
//! may do.

mod credentials;
mod identity;
mod middleware;
mod resolver;

pub use credentials::{
    API_KEY_PARAM, DEPARTMENT_ID_PARAM, PERSONNEL_API_KEY_PARAM, RequestCredentials,
    SESSION_COOKIE_NAME, ValueMap, detect_api_key, detect_cookie_session, detect_department_id,
    detect_personnel_api_key,
};
pub use identity::ResolvedIdentity;
pub use middleware::{access_log, session_middleware};
pub use resolver::{Resolution, SessionConfig, SessionResolver};
