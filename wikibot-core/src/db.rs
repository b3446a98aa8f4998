use std::sync::Arc;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{Connection, PgConnection};

use crate::config::{DatabaseAuth, DatabaseConfig, WikibotConfig};
use crate::credential::{ClientSecretCredential, TokenCredential};
use crate::error::WikibotError;
use crate::models::SimilarityResult;

/// Environment variable holding the static database password
pub const PASSWORD_ENV: &str = "DATABASE_PASSWORD";

/// Opens one connection per use, presenting either the static password or a
/// freshly issued access token.
#[derive(Clone)]
pub struct Connector {
    config: DatabaseConfig,
    credential: Option<(Arc<dyn TokenCredential>, String)>,
}

impl Connector {
    pub fn new(config: DatabaseConfig, credential: Option<(Arc<dyn TokenCredential>, String)>) -> Self {
        Self { config, credential }
    }

    pub fn from_config(config: &WikibotConfig) -> Result<Self, WikibotError> {
        let credential = match (config.database.auth, &config.identity) {
            (DatabaseAuth::Token, Some(identity)) => {
                let credential: Arc<dyn TokenCredential> =
                    Arc::new(ClientSecretCredential::from_config(identity)?);
                Some((credential, identity.scope.clone()))
            }
            (DatabaseAuth::Token, None) => {
                return Err(WikibotError::InvalidConfig(
                    "token auth requires an [identity] section".to_string(),
                ))
            }
            (DatabaseAuth::Password, _) => None,
        };
        Ok(Self::new(config.database.clone(), credential))
    }

    async fn connect_options(&self) -> Result<PgConnectOptions, WikibotError> {
        let ssl_mode: PgSslMode = self.config.ssl_mode.parse()?;
        let password = match &self.credential {
            Some((credential, scope)) => {
                let token = credential.get_token(scope).await?;
                tracing::debug!(expires_on = %token.expires_on, "Acquired database access token");
                token.token
            }
            None => std::env::var(PASSWORD_ENV).unwrap_or_default(),
        };

        Ok(PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.database)
            .username(&self.config.user)
            .password(&password)
            .ssl_mode(ssl_mode))
    }

    pub async fn connect(&self) -> Result<PgConnection, WikibotError> {
        let options = self.connect_options().await?;
        Ok(PgConnection::connect_with(&options).await?)
    }

    pub fn similarity_function(&self) -> &str {
        &self.config.similarity_function
    }
}

pub async fn health_check(conn: &mut PgConnection) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(&mut *conn).await?;
    Ok(row.0)
}

pub async fn check_pgvector(conn: &mut PgConnection) -> Result<String, sqlx::Error> {
    let row: (String,) =
        sqlx::query_as("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
            .fetch_one(&mut *conn)
            .await?;
    Ok(row.0)
}

/// Call the table-valued similarity function with the query vector bound as a
/// parameter. `function` must already be a validated identifier.
pub async fn similar_articles(
    conn: &mut PgConnection,
    function: &str,
    vector: &Vector,
    limit: i64,
) -> Result<Vec<SimilarityResult>, sqlx::Error> {
    let sql = format!(
        "SELECT cosine_distance::float8 AS cosine_distance, title, url \
         FROM {}($1::vector) AS r \
         ORDER BY cosine_distance DESC \
         LIMIT $2",
        function
    );

    sqlx::query_as::<_, SimilarityResult>(&sql)
        .bind(vector)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
}

/// Nearest-article lookup over the precomputed embedding store.
#[async_trait]
pub trait ArticleIndex: Send + Sync {
    async fn nearest(
        &self,
        embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>, WikibotError>;
}

pub struct PgArticleIndex {
    connector: Connector,
}

impl PgArticleIndex {
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl ArticleIndex for PgArticleIndex {
    async fn nearest(
        &self,
        embedding: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>, WikibotError> {
        let mut conn = self.connector.connect().await?;
        let vector = Vector::from(embedding);
        let rows = similar_articles(
            &mut conn,
            self.connector.similarity_function(),
            &vector,
            limit as i64,
        )
        .await?;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Error closing lookup connection");
        }
        Ok(rows)
    }
}
