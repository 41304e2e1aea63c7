//! Core data types for Crosspost

use std::fmt;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Platforms a post can be published to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformKind {
    X,
    LinkedIn,
    Instagram,
    Dribbble,
}

/// Whether a platform takes an image with the post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePolicy {
    Optional,
    Required,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 4] = [
        PlatformKind::X,
        PlatformKind::LinkedIn,
        PlatformKind::Instagram,
        PlatformKind::Dribbble,
    ];

    /// Canonical name, as stored in the credential store and draft tokens
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::X => "X",
            PlatformKind::LinkedIn => "LinkedIn",
            PlatformKind::Instagram => "Instagram",
            PlatformKind::Dribbble => "Dribbble",
        }
    }

    pub fn image_policy(&self) -> ImagePolicy {
        match self {
            PlatformKind::X | PlatformKind::LinkedIn => ImagePolicy::Optional,
            PlatformKind::Instagram | PlatformKind::Dribbble => ImagePolicy::Required,
        }
    }

    /// Instagram captions may be empty; every other platform publishes the text itself
    /// (Dribbble takes its title from it).
    pub fn requires_text(&self) -> bool {
        !matches!(self, PlatformKind::Instagram)
    }

    /// Credential fields an account must carry to publish on this platform
    pub fn required_credentials(&self) -> &'static [CredentialField] {
        match self {
            PlatformKind::X => &[
                CredentialField::ApiKey,
                CredentialField::ApiSecret,
                CredentialField::AccessToken,
                CredentialField::AccessTokenSecret,
            ],
            PlatformKind::LinkedIn | PlatformKind::Instagram => {
                &[CredentialField::AccessToken, CredentialField::PlatformUserId]
            }
            PlatformKind::Dribbble => &[CredentialField::AccessToken],
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformKind {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x" | "twitter" => Ok(PlatformKind::X),
            "linkedin" => Ok(PlatformKind::LinkedIn),
            "instagram" => Ok(PlatformKind::Instagram),
            "dribbble" => Ok(PlatformKind::Dribbble),
            _ => Err(PlatformError::Unsupported(s.to_string())),
        }
    }
}

/// Opaque, stable reference to an account record in the credential store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

/// Named credential fields, used for fail-fast validation messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    ApiKey,
    ApiSecret,
    AccessToken,
    AccessTokenSecret,
    PlatformUserId,
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialField::ApiKey => "API Key",
            CredentialField::ApiSecret => "API Secret",
            CredentialField::AccessToken => "Access Token",
            CredentialField::AccessTokenSecret => "Access Token Secret",
            CredentialField::PlatformUserId => "Platform User ID",
        };
        f.write_str(name)
    }
}

/// Platform-dependent credential set for one account
///
/// Every field is optional at this level; adapters check the fields their
/// platform needs with [`Credentials::require`] before any network call.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_key: Option<SecretString>,
    pub api_secret: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub access_token_secret: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    /// LinkedIn person URN suffix or Instagram business account id
    pub platform_user_id: Option<String>,
}

impl Credentials {
    /// Value of a credential field, `None` when absent or blank
    pub fn get(&self, field: CredentialField) -> Option<&str> {
        let value = match field {
            CredentialField::ApiKey => self.api_key.as_ref().map(|s| s.expose_secret()),
            CredentialField::ApiSecret => self.api_secret.as_ref().map(|s| s.expose_secret()),
            CredentialField::AccessToken => self.access_token.as_ref().map(|s| s.expose_secret()),
            CredentialField::AccessTokenSecret => {
                self.access_token_secret.as_ref().map(|s| s.expose_secret())
            }
            CredentialField::PlatformUserId => self.platform_user_id.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Check that every listed field is present and non-empty
    pub fn require(
        &self,
        platform: PlatformKind,
        fields: &[CredentialField],
    ) -> Result<(), PlatformError> {
        let missing: Vec<CredentialField> = fields
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PlatformError::MissingCredentials {
                platform,
                fields: missing,
            })
        }
    }

    /// Like [`Credentials::get`] but for a field already checked by `require`
    pub(crate) fn field(
        &self,
        platform: PlatformKind,
        field: CredentialField,
    ) -> Result<&str, PlatformError> {
        self.get(field).ok_or(PlatformError::MissingCredentials {
            platform,
            fields: vec![field],
        })
    }
}

/// A credential bundle for one (platform, identity) pair
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub platform: PlatformKind,
    pub display_name: String,
    pub username: Option<String>,
    pub credentials: Credentials,
}

impl Account {
    /// Username with a leading `@`, or `None` when the account has none
    pub fn handle(&self) -> Option<String> {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| {
                if u.starts_with('@') {
                    u.to_string()
                } else {
                    format!("@{}", u)
                }
            })
    }

    /// Username without a leading `@`
    pub fn bare_username(&self) -> Option<&str> {
        self.username
            .as_deref()
            .map(|u| u.trim().trim_start_matches('@'))
            .filter(|u| !u.is_empty())
    }
}

/// Buffered image bytes with their MIME type
///
/// The bytes and MIME type travel together so image fields are never
/// partially set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Publicly reachable URL of the same image, if the transport has one
    pub source_url: Option<String>,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            source_url: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// File extension matching the MIME type
    pub fn extension(&self) -> &'static str {
        ImageMimeType::from_mime_str(&self.mime_type)
            .map(|m| m.extension())
            .unwrap_or("png")
    }
}

/// Supported image MIME types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Parse MIME type from a MIME string (e.g., "image/jpeg"), ignoring parameters
    pub fn from_mime_str(s: &str) -> Option<Self> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }
}

impl fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The payload to publish
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostContent {
    pub text: String,
    pub image: Option<ImagePayload>,
    /// Comma-separated, interpreted per platform
    pub tags: Option<String>,
    /// Required by Dribbble only
    pub title: Option<String>,
}

impl PostContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Build the content for a platform from collected draft text
    ///
    /// Dribbble shots need a title: the first non-empty line becomes the
    /// title and the rest the description.
    pub fn for_platform(platform: PlatformKind, text: &str, image: Option<ImagePayload>) -> Self {
        let mut content = PostContent::text(text);
        content.image = image;

        if platform == PlatformKind::Dribbble {
            let mut lines = text.lines();
            let title = lines
                .by_ref()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string);
            let description = lines.collect::<Vec<_>>().join("\n").trim().to_string();
            content.title = title;
            content.text = description;
        }

        content
    }

    /// Tags split on commas, trimmed, empties dropped
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .map(|t| {
                t.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub post_id: String,
    pub url: String,
    /// Auxiliary step that failed while the primary content went out
    pub warning: Option<String>,
}

/// Outcome of one adapter call
pub type PublishResult = std::result::Result<Published, PlatformError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn account(username: Option<&str>) -> Account {
        Account {
            id: "page-1".into(),
            platform: PlatformKind::X,
            display_name: "Studio".into(),
            username: username.map(str::to_string),
            credentials: Credentials::default(),
        }
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("X".parse::<PlatformKind>().unwrap(), PlatformKind::X);
        assert_eq!("twitter".parse::<PlatformKind>().unwrap(), PlatformKind::X);
        assert_eq!("LINKEDIN".parse::<PlatformKind>().unwrap(), PlatformKind::LinkedIn);
        assert_eq!(
            "Mastodon".parse::<PlatformKind>(),
            Err(PlatformError::Unsupported("Mastodon".into()))
        );
    }

    #[test]
    fn test_image_policy() {
        assert_eq!(PlatformKind::X.image_policy(), ImagePolicy::Optional);
        assert_eq!(PlatformKind::LinkedIn.image_policy(), ImagePolicy::Optional);
        assert_eq!(PlatformKind::Instagram.image_policy(), ImagePolicy::Required);
        assert_eq!(PlatformKind::Dribbble.image_policy(), ImagePolicy::Required);
    }

    #[test]
    fn test_require_reports_all_missing_fields() {
        let credentials = Credentials {
            api_key: Some(SecretString::from("key".to_string())),
            access_token: Some(SecretString::from("   ".to_string())),
            ..Default::default()
        };

        let err = credentials
            .require(PlatformKind::X, PlatformKind::X.required_credentials())
            .unwrap_err();

        assert_eq!(
            err,
            PlatformError::MissingCredentials {
                platform: PlatformKind::X,
                fields: vec![
                    CredentialField::ApiSecret,
                    CredentialField::AccessToken,
                    CredentialField::AccessTokenSecret,
                ],
            }
        );
    }

    #[test]
    fn test_handle_formatting() {
        assert_eq!(account(Some("studio")).handle().as_deref(), Some("@studio"));
        assert_eq!(account(Some("@studio")).handle().as_deref(), Some("@studio"));
        assert_eq!(account(Some("")).handle(), None);
        assert_eq!(account(None).handle(), None);
        assert_eq!(account(Some("@studio")).bare_username(), Some("studio"));
    }

    #[test]
    fn test_dribbble_content_takes_title_from_first_line() {
        let content = PostContent::for_platform(
            PlatformKind::Dribbble,
            "\nShot\nA new landing page\nwith gradients",
            None,
        );
        assert_eq!(content.title.as_deref(), Some("Shot"));
        assert_eq!(content.text, "A new landing page\nwith gradients");
    }

    #[test]
    fn test_other_platforms_keep_text() {
        let content = PostContent::for_platform(PlatformKind::X, "Hello\nworld", None);
        assert_eq!(content.text, "Hello\nworld");
        assert!(content.title.is_none());
    }

    #[test]
    fn test_tag_list() {
        let content = PostContent::text("x").with_tags(" ui, ,design ,web ");
        assert_eq!(content.tag_list(), vec!["ui", "design", "web"]);
    }

    #[test]
    fn test_mime_parsing_ignores_parameters() {
        assert_eq!(
            ImageMimeType::from_mime_str("image/PNG; charset=binary"),
            Some(ImageMimeType::Png)
        );
        assert_eq!(ImagePayload::new(vec![], "image/jpeg").extension(), "jpg");
        assert_eq!(ImagePayload::new(vec![], "application/octet-stream").extension(), "png");
    }
}
