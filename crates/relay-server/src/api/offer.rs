use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{body::Bytes, extract::State, Json};
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Accept a JSON offer and answer once the current session has negotiated it.
///
/// The body is parsed by hand so a malformed offer maps to our own 400 body
/// rather than axum's rejection.
pub async fn post_offer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RTCSessionDescription>> {
    let offer: RTCSessionDescription = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed session description: {}", e)))?;

    if offer.sdp_type != RTCSdpType::Offer {
        return Err(AppError::BadRequest(format!(
            "expected an offer, got {}",
            offer.sdp_type
        )));
    }

    let answer = state.signaling.exchange(offer).await?;
    Ok(Json(answer))
}
