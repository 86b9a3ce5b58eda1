//! Console signaling: one base64 session description per line.
//!
//! Offers are read from the input, answers written to the output. Logs go to
//! stderr so the output carries nothing but answers.

use super::SignalingBridge;
use anyhow::Result;
use relay_media::LifecycleToken;
use relay_protocol::{decode_description, encode_description};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Serve offers from `input` until it ends or `shutdown` fires
pub async fn run_console<R, W>(
    mut input: R,
    mut output: W,
    bridge: SignalingBridge,
    mut shutdown: LifecycleToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();

    loop {
        tracing::info!("Waiting for a base64 encoded offer on stdin");

        buf.clear();
        let read = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = input.read_until(b'\n', &mut buf) => read?,
        };

        if read == 0 {
            tracing::info!("Console input closed");
            return Ok(());
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                tracing::warn!("Ignoring console line that is not UTF-8: {}", e);
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let offer: RTCSessionDescription = match decode_description(line) {
            Ok(offer) => offer,
            Err(e) => {
                tracing::warn!("Failed to decode offer: {}", e);
                continue;
            }
        };

        if offer.sdp_type != RTCSdpType::Offer {
            tracing::warn!(sdp_type = %offer.sdp_type, "Ignoring session description that is not an offer");
            continue;
        }

        match bridge.exchange(offer).await {
            Ok(answer) => {
                let encoded = encode_description(&answer)?;
                output.write_all(encoded.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
                tracing::info!("Answer written to stdout");
            }
            Err(e) => tracing::error!("Signaling failed: {}", e),
        }
    }
}
