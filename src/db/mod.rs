//! Database module for the blog API
//!
//! Repository traits describe what the HTTP layer needs from storage;
//! `DbOperations` implements them over Postgres.

pub mod models;
pub mod operations;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;

pub use models::{NewPost, Post, User, UserProfile};
pub use operations::DbOperations;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<User>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn update_user(&self, user: &User) -> Result<User>;

    /// Deletes the user and, through the foreign key, every post they own.
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn list_posts(&self) -> Result<Vec<Post>>;

    async fn get_post(&self, id: i64) -> Result<Option<Post>>;

    async fn create_post(&self, post: &NewPost) -> Result<Post>;

    async fn update_post(&self, post: &Post) -> Result<Post>;

    async fn delete_post(&self, id: i64) -> Result<bool>;
}
