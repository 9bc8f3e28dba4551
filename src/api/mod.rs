//! HTTP surface: route table and the post and registration endpoints.

pub mod posts;
pub mod registrations;

use actix_web::{error, web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::warn;

use crate::auth::handlers::{login, logout};
use crate::health_check;

/// Register every route. Shared by the binary and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .route("/health", web::get().to(health_check))
        .route("/login", web::post().to(login))
        .route("/logout", web::delete().to(logout))
        .service(
            web::resource("/signup")
                .route(web::post().to(registrations::register))
                .route(web::put().to(registrations::update))
                .route(web::patch().to(registrations::update))
                .route(web::delete().to(registrations::destroy)),
        )
        .service(
            web::scope("/api/v1/posts")
                .service(
                    web::resource("")
                        .route(web::get().to(posts::index))
                        .route(web::post().to(posts::create)),
                )
                .service(
                    web::resource("/{id}")
                        .route(web::get().to(posts::show))
                        .route(web::put().to(posts::update))
                        .route(web::patch().to(posts::update))
                        .route(web::delete().to(posts::destroy)),
                ),
        );
}

fn json_error(err: error::JsonPayloadError, req: &HttpRequest) -> error::Error {
    warn!("Rejected request body on {}: {}", req.path(), err);
    let response = HttpResponse::BadRequest().json(json!({ "error": err.to_string() }));
    error::InternalError::from_response(err, response).into()
}

/// Rails-style joining: "a", "a and b", "a, b, and c".
pub(crate) fn to_sentence(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
