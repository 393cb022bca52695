// routes.rs
use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers, AppState};

pub fn create_routes(state: AppState, allow_origin: Option<HeaderValue>) -> Router {
    let origin = match allow_origin {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::any(),
    };

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/polls", get(handlers::list_polls).post(handlers::create_poll))
        .route(
            "/polls/{id}",
            get(handlers::get_poll)
                .patch(handlers::update_poll)
                .delete(handlers::delete_poll),
        )
        .route(
            "/polls/{id}/items",
            get(handlers::list_items).post(handlers::create_item),
        )
        .route("/polls/{id}/vote", post(handlers::cast_vote))
        .route("/polls/{id}/results", get(handlers::results))
        .route("/polls/{id}/share", get(handlers::share))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
