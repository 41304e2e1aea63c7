//! X (Twitter) publisher
//!
//! Uses the v1.1 media upload endpoint and the v2 tweet endpoint, both signed
//! with OAuth 1.0a user context. A failed image upload does not stop the
//! tweet: the text goes out alone and the upload error comes back as a
//! warning on the result.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;
use crate::platforms::oauth1::{authorization_header, OAuth1Keys, OAuth1Nonce};
use crate::platforms::{network_error, read_json, Publisher};
use crate::types::{
    Account, CredentialField, ImagePayload, PlatformKind, PostContent, PublishResult, Published,
};

const API_BASE: &str = "https://api.twitter.com";
const UPLOAD_BASE: &str = "https://upload.twitter.com";
const WEB_BASE: &str = "https://twitter.com";

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Serialize)]
struct TweetRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<TweetMedia<'a>>,
}

#[derive(Debug, Serialize)]
struct TweetMedia<'a> {
    media_ids: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

pub struct XPublisher {
    client: reqwest::Client,
    api_base: String,
    upload_base: String,
    web_base: String,
}

impl XPublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_urls(client, API_BASE, UPLOAD_BASE, WEB_BASE)
    }

    /// Point the adapter at other hosts (used by tests)
    pub fn with_base_urls(
        client: reqwest::Client,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
        web_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            upload_base: upload_base.into(),
            web_base: web_base.into(),
        }
    }

    fn post_url(&self, account: &Account, id: &str) -> String {
        match account.bare_username() {
            Some(username) => format!("{}/{}/status/{}", self.web_base, username, id),
            None => format!("{}/i/web/status/{}", self.web_base, id),
        }
    }

    async fn upload_media(
        &self,
        keys: &OAuth1Keys<'_>,
        image: &ImagePayload,
    ) -> Result<String, PlatformError> {
        let url = format!("{}/1.1/media/upload.json", self.upload_base);
        let auth = authorization_header(keys, "POST", &url, &[], &OAuth1Nonce::generate())?;

        let part = Part::bytes(image.bytes.clone())
            .file_name(format!("image.{}", image.extension()))
            .mime_str(&image.mime_type)
            .map_err(|e| PlatformError::UploadFailed(e.to_string()))?;

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .multipart(Form::new().part("media", part))
            .send()
            .await
            .map_err(|e| PlatformError::UploadFailed(e.to_string()))?;

        let uploaded: MediaUploadResponse = read_json(response).await.map_err(|e| match e {
            PlatformError::RemoteRejected { message, .. } => PlatformError::UploadFailed(message),
            other => PlatformError::UploadFailed(other.to_string()),
        })?;
        Ok(uploaded.media_id_string)
    }

    async fn create_tweet(
        &self,
        keys: &OAuth1Keys<'_>,
        text: &str,
        media_id: Option<&str>,
    ) -> Result<String, PlatformError> {
        let url = format!("{}/2/tweets", self.api_base);
        let auth = authorization_header(keys, "POST", &url, &[], &OAuth1Nonce::generate())?;

        let body = TweetRequest {
            text,
            media: media_id.map(|id| TweetMedia { media_ids: [id] }),
        };

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let tweet: TweetResponse = read_json(response).await?;
        Ok(tweet.data.id)
    }
}

#[async_trait]
impl Publisher for XPublisher {
    fn kind(&self) -> PlatformKind {
        PlatformKind::X
    }

    async fn publish(&self, account: &Account, content: &PostContent) -> PublishResult {
        let credentials = &account.credentials;
        credentials.require(PlatformKind::X, PlatformKind::X.required_credentials())?;

        let keys = OAuth1Keys {
            consumer_key: credentials.field(PlatformKind::X, CredentialField::ApiKey)?,
            consumer_secret: credentials.field(PlatformKind::X, CredentialField::ApiSecret)?,
            token: credentials.field(PlatformKind::X, CredentialField::AccessToken)?,
            token_secret: credentials.field(PlatformKind::X, CredentialField::AccessTokenSecret)?,
        };

        let mut warning = None;
        let mut media_id = None;
        if let Some(image) = &content.image {
            tracing::debug!(
                bytes = image.bytes.len(),
                mime = %image.mime_type,
                "Uploading image to X"
            );
            match self.upload_media(&keys, image).await {
                Ok(id) => media_id = Some(id),
                Err(e) => {
                    tracing::warn!(error = %e, "X image upload failed, posting text only");
                    warning = Some(e.to_string());
                }
            }
        }

        let id = self
            .create_tweet(&keys, &content.text, media_id.as_deref())
            .await?;

        Ok(Published {
            url: self.post_url(account, &id),
            post_id: id,
            warning,
        })
    }
}
