use actix_web::http::header::AUTHORIZATION;
use actix_web::{test, web, App};
use async_trait::async_trait;
use blog_api::db::NewPost;
use blog_api::error::DatabaseError;
use blog_api::{
    api, AppError, AppState, MemorySessionStore, Post, PostRepository, Settings, SystemClock,
    User, UserRepository,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory stand-in for Postgres.
#[derive(Default)]
struct FakeDb {
    users: Mutex<HashMap<Uuid, User>>,
    posts: Mutex<BTreeMap<i64, Post>>,
    next_post_id: Mutex<i64>,
}

#[async_trait]
impl UserRepository for FakeDb {
    async fn create_user(&self, user: &User) -> blog_api::Result<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn get_user_by_id(&self, id: Uuid) -> blog_api::Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> blog_api::Result<Option<User>> {
        Ok(self.users.lock().unwrap().values().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, user: &User) -> blog_api::Result<User> {
        let mut users = self.users.lock().unwrap();
        let mut updated = user.clone();
        updated.updated_at = Utc::now();
        users.insert(user.id, updated.clone());
        Ok(updated)
    }

    async fn delete_user(&self, id: Uuid) -> blog_api::Result<bool> {
        let removed = self.users.lock().unwrap().remove(&id).is_some();
        if removed {
            self.posts.lock().unwrap().retain(|_, p| p.user_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl PostRepository for FakeDb {
    async fn list_posts(&self) -> blog_api::Result<Vec<Post>> {
        Ok(self.posts.lock().unwrap().values().cloned().collect())
    }

    async fn get_post(&self, id: i64) -> blog_api::Result<Option<Post>> {
        Ok(self.posts.lock().unwrap().get(&id).cloned())
    }

    async fn create_post(&self, post: &NewPost) -> blog_api::Result<Post> {
        let id = {
            let mut next = self.next_post_id.lock().unwrap();
            *next += 1;
            *next
        };
        let now = Utc::now();
        let post = Post {
            id,
            title: post.title.clone(),
            content: post.content.clone(),
            user_id: post.user_id,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().unwrap().insert(id, post.clone());
        Ok(post)
    }

    async fn update_post(&self, post: &Post) -> blog_api::Result<Post> {
        let mut posts = self.posts.lock().unwrap();
        let stored = posts.get_mut(&post.id).ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;
        stored.title = post.title.clone();
        stored.content = post.content.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_post(&self, id: i64) -> blog_api::Result<bool> {
        Ok(self.posts.lock().unwrap().remove(&id).is_some())
    }
}

fn state() -> (AppState, Arc<FakeDb>) {
    let db = Arc::new(FakeDb::default());
    let state = AppState::from_parts(
        Settings::new_for_test().expect("Failed to load test config"),
        db.clone(),
        db.clone(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(SystemClock),
    );
    (state, db)
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(api::configure),
        )
        .await
    };
}

fn bearer(token: &str) -> (actix_web::http::header::HeaderName, String) {
    (AUTHORIZATION, format!("Bearer {}", token))
}

#[actix_web::test]
async fn test_register_and_login() {
    let (state, _) = state();
    let app = app!(state);

    let resp = test::TestRequest::post()
        .uri("/signup")
        .set_json(json!({ "user": { "name": "Test User", "email": "test@example.com", "password": "password123" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"]["message"], "Signed up successfully.");
    assert!(body["status"]["token"].is_string());

    let resp = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({ "user": { "email": "test@example.com", "password": "password123" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"]["message"], "Logged in successfully.");
    assert!(body["status"]["token"].is_string());
}

#[actix_web::test]
async fn test_invalid_login() {
    let (state, _) = state();
    let app = app!(state);

    let resp = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({ "user": { "email": "nonexistent@example.com", "password": "wrongpassword" } }))
        .send_request(&app)
        .await;

    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_duplicate_registration() {
    let (state, _) = state();
    let app = app!(state);
    let payload = json!({ "user": { "name": "Test", "email": "dup@example.com", "password": "password123" } });

    let resp = test::TestRequest::post().uri("/signup").set_json(&payload).send_request(&app).await;
    assert_eq!(resp.status(), 200);

    let resp = test::TestRequest::post().uri("/signup").set_json(&payload).send_request(&app).await;
    assert_eq!(resp.status(), 422);
}

#[actix_web::test]
async fn test_malformed_body_is_bad_request() {
    let (state, _) = state();
    let app = app!(state);

    let resp = test::TestRequest::post()
        .uri("/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .send_request(&app)
        .await;

    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].is_string());
}

macro_rules! sign_up {
    ($app:expr, $name:expr, $email:expr) => {{
        let resp = test::TestRequest::post()
            .uri("/signup")
            .set_json(json!({ "user": { "name": $name, "email": $email, "password": "password" } }))
            .send_request(&$app)
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        body["status"]["token"].as_str().unwrap().to_string()
    }};
}

#[actix_web::test]
async fn test_post_ownership_and_session_lifecycle() {
    let (state, db) = state();
    let app = app!(state);

    let alice = sign_up!(app, "Alice", "alice@example.com");
    let bob = sign_up!(app, "Bob", "bob@example.com");

    // Alice creates a post.
    let resp = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(&alice))
        .set_json(json!({ "post": { "title": "Test Post", "content": "This is a test post" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let resp = test::TestRequest::get().uri("/api/v1/posts").send_request(&app).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Bob may read but not modify it.
    let resp = test::TestRequest::put()
        .uri(&format!("/api/v1/posts/{}", id))
        .insert_header(bearer(&bob))
        .set_json(json!({ "post": { "title": "Malicious Update" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 403);
    assert_eq!(db.posts.lock().unwrap()[&id].title, "Test Post");

    let resp = test::TestRequest::delete()
        .uri(&format!("/api/v1/posts/{}", id))
        .insert_header(bearer(&bob))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 403);
    assert_eq!(db.posts.lock().unwrap().len(), 1);

    // Alice may.
    let resp = test::TestRequest::put()
        .uri(&format!("/api/v1/posts/{}", id))
        .insert_header(bearer(&alice))
        .set_json(json!({ "post": { "title": "Updated Title" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Updated Title");

    // After logout her old token is rejected.
    let resp = test::TestRequest::delete()
        .uri("/logout")
        .insert_header(bearer(&alice))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);

    let resp = test::TestRequest::delete()
        .uri(&format!("/api/v1/posts/{}", id))
        .insert_header(bearer(&alice))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);

    // A fresh login works.
    let resp = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({ "user": { "email": "alice@example.com", "password": "password" } }))
        .send_request(&app)
        .await;
    let body: Value = test::read_body_json(resp).await;
    let alice = body["status"]["token"].as_str().unwrap().to_string();

    let resp = test::TestRequest::delete()
        .uri(&format!("/api/v1/posts/{}", id))
        .insert_header(bearer(&alice))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 204);

    let resp = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}", id))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_account_deletion_cascades_and_ends_session() {
    let (state, db) = state();
    let app = app!(state);

    let carol = sign_up!(app, "Carol", "carol@example.com");
    let resp = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(&carol))
        .set_json(json!({ "post": { "title": "Mine", "content": "All mine" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 201);

    let resp = test::TestRequest::delete()
        .uri("/signup")
        .insert_header(bearer(&carol))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    assert!(db.users.lock().unwrap().is_empty());
    assert!(db.posts.lock().unwrap().is_empty());

    let resp = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(&carol))
        .set_json(json!({ "post": { "title": "Ghost", "content": "Post" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_second_session_cannot_post_after_account_deletion() {
    let (state, db) = state();
    let app = app!(state);

    let first = sign_up!(app, "Dave", "dave@example.com");
    let resp = test::TestRequest::post()
        .uri("/login")
        .set_json(json!({ "user": { "email": "dave@example.com", "password": "password" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let second = body["status"]["token"].as_str().unwrap().to_string();

    let resp = test::TestRequest::delete()
        .uri("/signup")
        .insert_header(bearer(&first))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);

    let resp = test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(&second))
        .set_json(json!({ "post": { "title": "Orphan", "content": "No author" } }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
    assert!(db.posts.lock().unwrap().is_empty());
}
