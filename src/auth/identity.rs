//! Resolved caller identity for request-scoped use.

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::db::schema::{Department, DepartmentLog, Session, User};

/// Identity resolved for one request.
///
/// Built by the session resolver and placed in the request extensions. Each
/// field is independently optional: an API-key caller has a department and
/// nothing else, a cookie caller may have any prefix of session, user and
/// department. It is never modified after resolution.
///
/// Serializes the session under both `session` and `login`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedIdentity {
    department: Option<Department>,
    department_log: Option<DepartmentLog>,
    session: Option<Session>,
    user: Option<User>,
}

impl ResolvedIdentity {
    /// An identity with nothing resolved.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attach a department together with its logging projection.
    pub fn with_department(mut self, department: Department) -> Self {
        self.department_log = Some(DepartmentLog::from(&department));
        self.department = Some(department);
        self
    }

    /// Attach the login session.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    /// Attach the session's user.
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Get the resolved department.
    pub fn department(&self) -> Option<&Department> {
        self.department.as_ref()
    }

    /// Get the logging-safe department projection.
    pub fn department_log(&self) -> Option<&DepartmentLog> {
        self.department_log.as_ref()
    }

    /// Get the login session.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The login session, under the name older handlers use.
    pub fn login(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Get the session's user.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// True when nothing was resolved.
    pub fn is_anonymous(&self) -> bool {
        self.department.is_none() && self.session.is_none() && self.user.is_none()
    }
}

impl Serialize for ResolvedIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ResolvedIdentity", 5)?;
        state.serialize_field("department", &self.department)?;
        state.serialize_field("departmentLog", &self.department_log)?;
        state.serialize_field("session", &self.session)?;
        state.serialize_field("login", &self.session)?;
        state.serialize_field("user", &self.user)?;
        state.end()
    }
}
