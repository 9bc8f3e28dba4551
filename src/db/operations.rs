use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::models::{NewPost, Post, User};
use crate::db::{PostRepository, UserRepository};
use crate::error::{AppError, DatabaseError};
use crate::Result;

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";
const POST_COLUMNS: &str = "id, title, content, user_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool(&self) -> &Arc<PgPool> {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn create_user_with_transaction(
        &self,
        user: &User,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<User> {
        let query = format!(
            "INSERT INTO users ({cols}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {cols}",
            cols = USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&mut **transaction)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl UserRepository for DbOperations {
    async fn create_user(&self, user: &User) -> Result<User> {
        let mut transaction = self.begin_transaction().await?;

        match self.create_user_with_transaction(user, &mut transaction).await {
            Ok(user) => {
                transaction.commit().await?;
                debug!("Created user {}", user.id);
                Ok(user)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let query = format!(
            "UPDATE users SET name = $2, email = $3, password_hash = $4, updated_at = $5 \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(Utc::now())
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PostRepository for DbOperations {
    async fn list_posts(&self) -> Result<Vec<Post>> {
        let query = format!("SELECT {} FROM posts ORDER BY id", POST_COLUMNS);
        let posts = sqlx::query_as::<_, Post>(&query)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(posts)
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let query = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(post)
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO posts (title, content, user_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {}",
            POST_COLUMNS
        );
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.user_id)
            .bind(now)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(post)
    }

    async fn update_post(&self, post: &Post) -> Result<Post> {
        // user_id is never written: ownership is fixed at creation.
        let query = format!(
            "UPDATE posts SET title = $2, content = $3, updated_at = $4 WHERE id = $1 RETURNING {}",
            POST_COLUMNS
        );
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(Utc::now())
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
