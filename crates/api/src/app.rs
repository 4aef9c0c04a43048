use axum::{extract::State, http::StatusCode, middleware, routing::get, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::middleware::api_key_middleware;
use crate::routes::games;
use crate::state::AppState;

/// Build the Axum router: health check plus the API-key protected game routes.
pub fn build_router(state: AppState) -> Router {
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        state.config().request_timeout,
    );

    let game_routes = games::router()
        .layer(timeout.clone())
        .merge(games::process_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    Router::new()
        // Liveness check; also proves store connectivity.
        .route("/health", get(health).layer(timeout))
        .nest("/api/games", game_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.store.ping().await?;
    Ok("ok")
}
