//! HTTP surface: payment initiation, gateway callback and ratings.

pub mod error;
pub mod handlers;
pub mod payload;

use crate::application::Services;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(services: Services, enable_cors: bool) -> Router {
    let mpesa = Router::new()
        .route("/stkpush", post(handlers::initiate_payment))
        .route("/stkcallback", post(handlers::payment_callback))
        .route("/payments/:id", get(handlers::get_payment));

    let ratings = Router::new()
        .route("/", post(handlers::submit_rating))
        .route("/:subject_id", get(handlers::list_ratings));

    let app = Router::new()
        .route("/", get(handlers::index))
        .nest("/api/mpesa", mpesa)
        .nest("/api/ratings", ratings)
        .layer(TraceLayer::new_for_http());

    let app = if enable_cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    };

    app.with_state(services)
}
