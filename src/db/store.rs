//! Read-side lookups for the identity records.
//!
//! `IdentityStore` is the seam between session resolution and whatever holds
//! the department, session and user records. `SurrealIdentityStore` is the
//! SurrealDB-backed implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use serde::de::DeserializeOwned;

use crate::db::Db;
use crate::db::schema::{Department, Session, User};
use crate::types::{DepartmentId, UserId};

/// Boxed future returned by every store lookup.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<Option<T>, StoreError>> + Send + 'a>>;

/// Failure talking to the backing store.
///
/// A lookup that simply finds nothing is `Ok(None)`, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The query could not be executed (connectivity, syntax, permissions)
    Backend(String),
    /// The query ran but its rows did not decode into the expected record
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "Identity store error: {}", msg),
            Self::Decode(msg) => write!(f, "Identity record decode error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Lookups the session resolver needs, one per credential shape.
///
/// Implementations filter on `active = true` where noted; the resolver checks
/// the flag again so a lax implementation cannot resolve a disabled record.
pub trait IdentityStore: Send + Sync {
    /// Active department whose top-level API key equals `api_key`.
    fn find_department_by_api_key<'a>(&'a self, api_key: &'a str) -> StoreFuture<'a, Department>;

    /// Active department with any agency holding `personnel_api_key`.
    fn find_department_by_personnel_api_key<'a>(
        &'a self,
        personnel_api_key: &'a str,
    ) -> StoreFuture<'a, Department>;

    /// Department by identifier, regardless of its active flag.
    fn find_department_by_id<'a>(&'a self, id: &'a DepartmentId) -> StoreFuture<'a, Department>;

    /// Active session whose token matches exactly.
    fn find_session_by_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Session>;

    /// Active user by identifier.
    fn find_user_by_id<'a>(&'a self, id: &'a UserId) -> StoreFuture<'a, User>;
}

/// SurrealDB-backed identity store.
#[derive(Clone)]
pub struct SurrealIdentityStore {
    db: Db,
}

impl SurrealIdentityStore {
    /// Create a new store over an open connection.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Get reference to the database.
    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Run a single-parameter query and return its first row.
    async fn first<T: DeserializeOwned>(
        &self,
        query: &str,
        param: &'static str,
        value: String,
    ) -> Result<Option<T>, StoreError> {
        let mut res = self
            .db
            .query(query)
            .bind((param, value))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let rows: Vec<T> = res
            .take(0)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    /// Insert a department record.
    pub async fn insert_department(&self, department: &Department) -> Result<()> {
        self.db
            .query("CREATE department CONTENT $record")
            .bind(("record", department.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// Insert a session record.
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        self.db
            .query("CREATE session CONTENT $record")
            .bind(("record", session.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// Insert a user record.
    pub async fn insert_user(&self, user: &User) -> Result<()> {
        self.db
            .query("CREATE user CONTENT $record")
            .bind(("record", user.clone()))
            .await?
            .check()?;
        Ok(())
    }
}

impl IdentityStore for SurrealIdentityStore {
    fn find_department_by_api_key<'a>(&'a self, api_key: &'a str) -> StoreFuture<'a, Department> {
        Box::pin(async move {
            let query = r#"
                SELECT * FROM department
                WHERE apikey = $apikey
                  AND active = true
                LIMIT 1
            "#;
            self.first(query, "apikey", api_key.to_string()).await
        })
    }

    fn find_department_by_personnel_api_key<'a>(
        &'a self,
        personnel_api_key: &'a str,
    ) -> StoreFuture<'a, Department> {
        Box::pin(async move {
            let query = r#"
                SELECT * FROM department
                WHERE agencies.*.personnelApiKey CONTAINS $key
                  AND active = true
                LIMIT 1
            "#;
            self.first(query, "key", personnel_api_key.to_string()).await
        })
    }

    fn find_department_by_id<'a>(&'a self, id: &'a DepartmentId) -> StoreFuture<'a, Department> {
        Box::pin(async move {
            let query = "SELECT * FROM department WHERE _id = $id LIMIT 1";
            self.first(query, "id", id.to_string()).await
        })
    }

    fn find_session_by_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Session> {
        Box::pin(async move {
            let query = r#"
                SELECT * FROM session
                WHERE token = $session_token
                  AND active = true
                LIMIT 1
            "#;
            self.first(query, "session_token", token.to_string()).await
        })
    }

    fn find_user_by_id<'a>(&'a self, id: &'a UserId) -> StoreFuture<'a, User> {
        Box::pin(async move {
            let query = r#"
                SELECT * FROM user
                WHERE _id = $id
                  AND active = true
                LIMIT 1
            "#;
            self.first(query, "id", id.to_string()).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::Agency;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};

    async fn setup_test_store() -> SurrealIdentityStore {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        SurrealIdentityStore::new(db)
    }

    fn department(id: &str, apikey: &str, active: bool) -> Department {
        Department {
            id: DepartmentId::new(id),
            department: format!("Department {}", id),
            apikey: apikey.to_string(),
            agencies: vec![
                Agency {
                    name: "Fire".to_string(),
                    personnel_api_key: format!("{}-fire", apikey),
                },
                Agency {
                    name: "EMS".to_string(),
                    personnel_api_key: format!("{}-ems", apikey),
                },
            ],
            active,
            cad_bidirectional_enabled: false,
            profile: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_find_department_by_api_key() {
        let store = setup_test_store().await;
        let d1 = department("d-1", "key-1", true);
        store.insert_department(&d1).await.unwrap();

        let found = store.find_department_by_api_key("key-1").await.unwrap();
        assert_eq!(found, Some(d1));

        let missing = store.find_department_by_api_key("nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_inactive_department_not_found_by_api_key() {
        let store = setup_test_store().await;
        store
            .insert_department(&department("d-1", "key-1", false))
            .await
            .unwrap();

        let found = store.find_department_by_api_key("key-1").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_department_by_personnel_api_key_any_agency() {
        let store = setup_test_store().await;
        store
            .insert_department(&department("d-1", "key-1", true))
            .await
            .unwrap();

        let first = store
            .find_department_by_personnel_api_key("key-1-fire")
            .await
            .unwrap();
        let second = store
            .find_department_by_personnel_api_key("key-1-ems")
            .await
            .unwrap();

        assert_eq!(first.map(|d| d.id), Some(DepartmentId::new("d-1")));
        assert_eq!(second.map(|d| d.id), Some(DepartmentId::new("d-1")));

        let top_level = store
            .find_department_by_personnel_api_key("key-1")
            .await
            .unwrap();
        assert!(top_level.is_none());
    }

    #[tokio::test]
    async fn test_find_department_by_id_ignores_active_flag() {
        let store = setup_test_store().await;
        store
            .insert_department(&department("d-9", "key-9", false))
            .await
            .unwrap();

        let found = store
            .find_department_by_id(&DepartmentId::new("d-9"))
            .await
            .unwrap();
        assert!(found.is_some_and(|d| !d.active));
    }

    #[tokio::test]
    async fn test_department_profile_round_trips_through_store() {
        let store = setup_test_store().await;
        store
            .db()
            .query(
                r#"CREATE department CONTENT {
                    _id: 'd-city',
                    department: 'X',
                    apikey: 'k-city',
                    agencies: [],
                    active: true,
                    city: 'Springfield'
                }"#,
            )
            .await
            .unwrap()
            .check()
            .unwrap();

        let found = store
            .find_department_by_api_key("k-city")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.profile.get("city"), Some(&serde_json::json!("Springfield")));
        assert!(!found.profile.contains_key("id"));

        let json = serde_json::to_value(&found).unwrap();
        assert_eq!(json["city"], "Springfield");
        assert!(json.get("id").is_none());
        assert!(json.get("profile").is_none());

        let mut seeded = department("d-2", "key-2", true);
        seeded
            .profile
            .insert("city".to_string(), serde_json::json!("Shelbyville"));
        store.insert_department(&seeded).await.unwrap();
        assert_eq!(
            store.find_department_by_api_key("key-2").await.unwrap(),
            Some(seeded)
        );
    }

    #[tokio::test]
    async fn test_find_session_and_user() {
        let store = setup_test_store().await;
        let session = Session {
            token: "tok-1".to_string(),
            user: UserId::new("u-1"),
            active: true,
            nick: None,
            email: Some("a@example.com".to_string()),
        };
        let user = User {
            id: UserId::new("u-1"),
            department_id: Some(DepartmentId::new("d-1")),
            superuser: false,
            active: true,
            nick: Some("alice".to_string()),
            email: None,
        };
        store.insert_session(&session).await.unwrap();
        store.insert_user(&user).await.unwrap();

        assert_eq!(
            store.find_session_by_token("tok-1").await.unwrap(),
            Some(session)
        );
        assert!(store.find_session_by_token("tok-").await.unwrap().is_none());
        assert_eq!(
            store.find_user_by_id(&UserId::new("u-1")).await.unwrap(),
            Some(user)
        );
    }

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::Backend("connection refused".to_string()).to_string(),
            "Identity store error: connection refused"
        );
        assert_eq!(
            StoreError::Decode("missing field".to_string()).to_string(),
            "Identity record decode error: missing field"
        );
    }
}
