use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SENECA_DB_URL")
                .unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SENECA_DB_NAMESPACE")
                .unwrap_or_else(|_| "seneca".to_string()),
            database: env::var("SENECA_DB_DATABASE")
                .unwrap_or_else(|_| "identity".to_string()),
            username: env::var("SENECA_DB_USERNAME").ok(),
            password: env::var("SENECA_DB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

/// Define the identity tables and the indexes the resolver queries on.
///
/// Records themselves are owned by provisioning and sign-in flows elsewhere;
/// this only makes a fresh (e.g. in-memory) database queryable.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        "DEFINE TABLE IF NOT EXISTS department SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS department_uid ON TABLE department COLUMNS _id UNIQUE;
         DEFINE INDEX IF NOT EXISTS department_apikey ON TABLE department COLUMNS apikey;",

        "DEFINE TABLE IF NOT EXISTS session SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS session_token ON TABLE session COLUMNS token;",

        "DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS user_uid ON TABLE user COLUMNS _id UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}
