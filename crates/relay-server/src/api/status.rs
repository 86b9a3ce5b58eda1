use crate::state::AppState;
use axum::{extract::State, Json};
use relay_protocol::{SessionStatus, TrackStatus};

pub async fn get_track_status(State(state): State<AppState>) -> Json<TrackStatus> {
    Json(state.status.track_status())
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.status.session_status().await)
}
