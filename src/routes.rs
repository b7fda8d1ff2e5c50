use axum::{
    routing::{get, post},
    Router,
};

use crate::{ai, auth, billing};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/register", post(auth::register_user))
        .route("/api/login", post(auth::login_user))
        .route("/api/logout", post(auth::logout_user))
        .route("/api/me", get(auth::current_user))
        .route("/api/ai/description", post(ai::generate_description))
        .merge(billing::api::routes())
}
