//! Draft tokens carried inside preview artifacts
//!
//! A draft is not stored anywhere else: the preview artifact holds a base64
//! JSON envelope in one or more embed fields, so a publish click can be
//! handled by a different process than the one that rendered the preview.
//!
//! Envelope: `{"v":1,"platform":"X","account_id":..,"account_name":..,"text":..,"image_ref":..}`.
//! Payloads without `v` were written with camelCase keys
//! (`accountId`, `accountName`, `imageUrl`) and decode as version 1.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::DraftDecodeError;
use crate::transport::EmbeddedField;
use crate::types::{AccountId, PlatformKind};

pub const DRAFT_VERSION: u32 = 1;

/// Name of the embed fields holding the token (a zero-width space)
pub const DATA_FIELD_NAME: &str = "\u{200b}";

/// Longest value an embed field accepts
const FIELD_VALUE_LIMIT: usize = 1024;
const FENCE: &str = "```";
const CHUNK_LEN: usize = FIELD_VALUE_LIMIT - 2 * FENCE.len();

/// A composed post waiting for confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftState {
    pub platform: PlatformKind,
    #[serde(alias = "accountId")]
    pub account_id: AccountId,
    #[serde(alias = "accountName")]
    pub account_name: String,
    pub text: String,
    /// Transport URL of the image uploaded with the preview
    #[serde(default, alias = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

impl DraftState {
    /// Encode as a base64 token
    pub fn encode(&self) -> String {
        let mut envelope = json!({
            "v": DRAFT_VERSION,
            "platform": self.platform,
            "account_id": self.account_id,
            "account_name": self.account_name,
            "text": self.text,
        });
        if let Some(image_ref) = &self.image_ref {
            envelope["image_ref"] = json!(image_ref);
        }
        STANDARD.encode(envelope.to_string())
    }

    pub fn decode(token: &str) -> Result<Self, DraftDecodeError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DraftDecodeError::Missing);
        }

        let bytes = STANDARD
            .decode(token)
            .map_err(|e| DraftDecodeError::Encoding(e.to_string()))?;
        let value: Value =
            serde_json::from_slice(&bytes).map_err(|e| DraftDecodeError::Malformed(e.to_string()))?;

        let version = match value.get("v") {
            None => DRAFT_VERSION,
            Some(v) => v
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| DraftDecodeError::Malformed(format!("invalid version {}", v)))?,
        };
        if version != DRAFT_VERSION {
            return Err(DraftDecodeError::UnsupportedVersion(version));
        }

        serde_json::from_value(value).map_err(|e| DraftDecodeError::Malformed(e.to_string()))
    }

    /// Token split into fenced embed fields that each fit the field limit
    pub fn to_fields(&self) -> Vec<EmbeddedField> {
        let token = self.encode();
        // base64 is ASCII, so byte chunks are valid str slices
        token
            .as_bytes()
            .chunks(CHUNK_LEN)
            .map(|chunk| {
                let chunk = String::from_utf8_lossy(chunk);
                EmbeddedField::new(DATA_FIELD_NAME, format!("{}{}{}", FENCE, chunk, FENCE), false)
            })
            .collect()
    }

    /// Rejoin and decode the token from an artifact's fields
    pub fn from_fields(fields: &[EmbeddedField]) -> Result<Self, DraftDecodeError> {
        let token: String = fields
            .iter()
            .filter(|f| f.name == DATA_FIELD_NAME)
            .map(|f| f.value.replace(FENCE, "").trim().to_string())
            .collect();
        Self::decode(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(image_ref: Option<&str>) -> DraftState {
        DraftState {
            platform: PlatformKind::LinkedIn,
            account_id: "page-li".into(),
            account_name: "Studio".into(),
            text: "Shipping the new site 🚀".into(),
            image_ref: image_ref.map(str::to_string),
        }
    }

    #[test]
    fn test_round_trip_with_and_without_image() {
        for state in [draft(None), draft(Some("https://cdn.example/preview.png"))] {
            assert_eq!(DraftState::decode(&state.encode()).unwrap(), state);
            assert_eq!(DraftState::from_fields(&state.to_fields()).unwrap(), state);
        }
    }

    #[test]
    fn test_envelope_is_versioned() {
        let bytes = STANDARD.decode(draft(None).encode()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["platform"], "LinkedIn");
        assert!(value.get("image_ref").is_none());
    }

    #[test]
    fn test_long_text_spans_several_fields() {
        let mut state = draft(None);
        state.text = "word ".repeat(600);
        let fields = state.to_fields();

        assert!(fields.len() > 1);
        for field in &fields {
            assert_eq!(field.name, DATA_FIELD_NAME);
            assert!(field.value.len() <= FIELD_VALUE_LIMIT);
            assert!(field.value.starts_with(FENCE) && field.value.ends_with(FENCE));
        }
        assert_eq!(DraftState::from_fields(&fields).unwrap(), state);
    }

    #[test]
    fn test_other_fields_are_ignored() {
        let state = draft(None);
        let mut fields = vec![EmbeddedField::new("🔗 Post Link", "n/a", true)];
        fields.extend(state.to_fields());
        assert_eq!(DraftState::from_fields(&fields).unwrap(), state);
    }

    #[test]
    fn test_legacy_camel_case_payload() {
        let legacy = json!({
            "platform": "X",
            "accountId": "abc-123",
            "accountName": "Personal",
            "text": "hello",
            "imageUrl": null
        });
        let token = STANDARD.encode(legacy.to_string());
        let fields = vec![EmbeddedField::new(DATA_FIELD_NAME, format!("```{}```", token), false)];

        let state = DraftState::from_fields(&fields).unwrap();
        assert_eq!(state.platform, PlatformKind::X);
        assert_eq!(state.account_id, AccountId::from("abc-123"));
        assert_eq!(state.account_name, "Personal");
        assert_eq!(state.image_ref, None);
    }

    #[test]
    fn test_unknown_version_is_typed_error() {
        let token = STANDARD.encode(
            json!({"v": 2, "platform": "X", "account_id": "a", "account_name": "A", "text": ""})
                .to_string(),
        );
        assert_eq!(
            DraftState::decode(&token).unwrap_err(),
            DraftDecodeError::UnsupportedVersion(2)
        );
    }

    #[test]
    fn test_missing_and_corrupt_tokens() {
        assert_eq!(DraftState::from_fields(&[]).unwrap_err(), DraftDecodeError::Missing);
        assert!(matches!(
            DraftState::decode("not base64!!"),
            Err(DraftDecodeError::Encoding(_))
        ));
        assert!(matches!(
            DraftState::decode(&STANDARD.encode("{\"platform\":\"X\"}")),
            Err(DraftDecodeError::Malformed(_))
        ));
        assert!(matches!(
            DraftState::decode(&STANDARD.encode("[]")),
            Err(DraftDecodeError::Malformed(_))
        ));
    }
}
