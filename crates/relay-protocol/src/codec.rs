//! Console encoding of session descriptions
//!
//! The console surface carries a session description as one line of text:
//! the JSON form of the description, base64 encoded with the standard alphabet.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid base64 session description: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid JSON session description: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a description to JSON and wrap it in base64
pub fn encode_description<T: Serialize>(description: &T) -> Result<String, CodecError> {
    let json = serde_json::to_vec(description)?;
    Ok(STANDARD.encode(json))
}

/// Reverse of [`encode_description`]. Surrounding whitespace is ignored.
pub fn decode_description<T: DeserializeOwned>(input: &str) -> Result<T, CodecError> {
    let bytes = STANDARD.decode(input.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Description {
        #[serde(rename = "type")]
        kind: String,
        sdp: String,
    }

    #[test]
    fn test_decode_accepts_trailing_newline() {
        let encoded = STANDARD.encode(r#"{"type":"offer","sdp":"v=0"}"#);
        let decoded: Description = decode_description(&format!("{encoded}\n")).unwrap();
        assert_eq!(decoded.kind, "offer");
        assert_eq!(decoded.sdp, "v=0");
    }

    #[test]
    fn test_encoded_output_is_base64_json() {
        let description = Description {
            kind: "answer".to_string(),
            sdp: "v=0\r\n".to_string(),
        };
        let encoded = encode_description(&description).unwrap();
        let raw = STANDARD.decode(&encoded).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["type"], "answer");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            decode_description::<Description>("not base64!"),
            Err(CodecError::Base64(_))
        ));
        let not_json = STANDARD.encode("hello");
        assert!(matches!(
            decode_description::<Description>(&not_json),
            Err(CodecError::Json(_))
        ));
    }
}
