mod offer;
mod status;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Signaling
        .route("/offer", post(offer::post_offer))
        // Status
        .route("/track-status", get(status::get_track_status))
        .route("/session", get(status::get_session))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::StatusBoard;
    use crate::signaling::signaling_channel;
    use crate::state::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn router() -> Router {
        let config = Config::from_lookup(|_| None).unwrap();
        let (bridge, _inbox) = signaling_channel(Duration::from_secs(1));
        create_router(AppState::new(config, bridge, StatusBoard::new()))
    }

    #[tokio::test]
    async fn test_offer_with_empty_body_is_bad_request() {
        let response = router()
            .oneshot(Request::post("/offer").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_offer_without_controller_is_server_error() {
        let body = r#"{"type":"offer","sdp":"v=0"}"#;
        let response = router()
            .oneshot(Request::post("/offer").body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
