use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::api::is_blank;
use crate::auth::{authorize, Authenticated, Decision};
use crate::db::{NewPost, Post};
use crate::error::{AppError, AuthError};
use crate::{AppState, Result};

/// Body wrapper: only the `post` key is read, and only the known fields in it.
#[derive(Debug, Deserialize)]
pub struct PostRequest {
    pub post: PostParams,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostParams {
    pub title: Option<String>,
    pub content: Option<String>,
}

fn validate(title: &str, content: &str) -> Result<()> {
    let mut errors = Vec::new();
    if is_blank(title) {
        errors.push("Title can't be blank".to_string());
    }
    if is_blank(content) {
        errors.push("Content can't be blank".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationError(errors))
    }
}

async fn find_post(state: &AppState, id: i64) -> Result<Post> {
    state
        .posts
        .get_post(id)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))
}

fn ensure_owner(auth: &Authenticated, post: &Post) -> Result<()> {
    match authorize(&auth.identity, post) {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            warn!("User {} denied access to post {}", auth.identity.user_id, post.id);
            Err(AuthError::Forbidden("You are not authorized to modify this post".into()).into())
        }
    }
}

pub async fn index(state: web::Data<AppState>) -> Result<HttpResponse> {
    let posts = state.posts.list_posts().await?;
    Ok(HttpResponse::Ok().json(json!({ "data": posts })))
}

pub async fn show(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let post = find_post(&state, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn create(
    auth: Authenticated,
    req: web::Json<PostRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    // A still-valid token may outlive its account.
    state
        .users
        .get_user_by_id(auth.identity.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let params = req.into_inner().post;
    let new_post = NewPost {
        title: params.title.unwrap_or_default(),
        content: params.content.unwrap_or_default(),
        user_id: auth.identity.user_id,
    };
    validate(&new_post.title, &new_post.content)?;

    let post = state.posts.create_post(&new_post).await?;
    info!("User {} created post {}", post.user_id, post.id);
    Ok(HttpResponse::Created().json(json!({ "data": post })))
}

pub async fn update(
    auth: Authenticated,
    path: web::Path<i64>,
    req: web::Json<PostRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let mut post = find_post(&state, path.into_inner()).await?;
    ensure_owner(&auth, &post)?;

    let params = req.into_inner().post;
    if let Some(title) = params.title {
        post.title = title;
    }
    if let Some(content) = params.content {
        post.content = content;
    }
    validate(&post.title, &post.content)?;

    let post = state.posts.update_post(&post).await?;
    info!("User {} updated post {}", auth.identity.user_id, post.id);
    Ok(HttpResponse::Ok().json(post))
}

pub async fn destroy(
    auth: Authenticated,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let post = find_post(&state, path.into_inner()).await?;
    ensure_owner(&auth, &post)?;

    if !state.posts.delete_post(post.id).await? {
        return Err(AppError::not_found("Post"));
    }

    info!("User {} deleted post {}", auth.identity.user_id, post.id);
    Ok(HttpResponse::NoContent().finish())
}
