//! LinkedIn publisher
//!
//! Image posts are three calls with the same bearer token: register an upload
//! for the member's URN, PUT the bytes to the returned upload URL, then create
//! the UGC post referencing the asset. Any failure aborts the whole publish.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::PlatformError;
use crate::platforms::{network_error, read_json, remote_message, Publisher};
use crate::types::{
    Account, CredentialField, ImagePayload, PlatformKind, PostContent, PublishResult, Published,
};

const API_BASE: &str = "https://api.linkedin.com";
const FEED_URL: &str = "https://www.linkedin.com/feed/update";
const RESTLI_VERSION: (&str, &str) = ("X-Restli-Protocol-Version", "2.0.0");

#[derive(Debug, Deserialize)]
struct RegisterUploadResponse {
    value: RegisterUploadValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterUploadValue {
    upload_mechanism: UploadMechanism,
    asset: String,
}

#[derive(Debug, Deserialize)]
struct UploadMechanism {
    #[serde(rename = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest")]
    http_request: UploadHttpRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadHttpRequest {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct UgcPostResponse {
    #[serde(default)]
    id: Option<String>,
}

pub struct LinkedInPublisher {
    client: reqwest::Client,
    api_base: String,
}

impl LinkedInPublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, API_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    /// Register an upload, send the bytes, return the asset URN
    async fn upload_image(
        &self,
        token: &str,
        person_urn: &str,
        image: &ImagePayload,
    ) -> Result<String, PlatformError> {
        let register = json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": person_urn,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });

        let response = self
            .client
            .post(format!("{}/v2/assets?action=registerUpload", self.api_base))
            .bearer_auth(token)
            .header(RESTLI_VERSION.0, RESTLI_VERSION.1)
            .json(&register)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body = response.text().await.map_err(network_error)?;
        if !status.is_success() {
            return Err(PlatformError::UploadFailed(format!(
                "Failed to register LinkedIn image upload: {}",
                body.trim()
            )));
        }
        let registered: RegisterUploadResponse = serde_json::from_str(&body).map_err(|e| {
            PlatformError::UploadFailed(format!("Unexpected registerUpload response: {}", e))
        })?;

        let upload_url = registered.value.upload_mechanism.http_request.upload_url;
        tracing::debug!(asset = %registered.value.asset, "Registered LinkedIn upload");

        let response = self
            .client
            .put(&upload_url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, image.mime_type.as_str())
            .body(image.bytes.clone())
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::UploadFailed(format!(
                "Failed to upload image to LinkedIn ({}): {}",
                status.as_u16(),
                remote_message(&body)
            )));
        }

        Ok(registered.value.asset)
    }
}

#[async_trait]
impl Publisher for LinkedInPublisher {
    fn kind(&self) -> PlatformKind {
        PlatformKind::LinkedIn
    }

    async fn publish(&self, account: &Account, content: &PostContent) -> PublishResult {
        let platform = PlatformKind::LinkedIn;
        let credentials = &account.credentials;
        credentials.require(platform, platform.required_credentials())?;

        let token = credentials.field(platform, CredentialField::AccessToken)?;
        let person_urn = format!(
            "urn:li:person:{}",
            credentials.field(platform, CredentialField::PlatformUserId)?
        );

        let mut share = json!({
            "shareCommentary": { "text": content.text },
            "shareMediaCategory": "NONE"
        });
        if let Some(image) = &content.image {
            let asset = self.upload_image(token, &person_urn, image).await?;
            share["shareMediaCategory"] = json!("IMAGE");
            share["media"] = json!([{
                "status": "READY",
                "description": { "text": "Image" },
                "media": asset,
                "title": { "text": "Image" }
            }]);
        }

        let post: Value = json!({
            "author": person_urn,
            "lifecycleState": "PUBLISHED",
            "specificContent": { "com.linkedin.ugc.ShareContent": share },
            "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
        });

        let response = self
            .client
            .post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer_auth(token)
            .header(RESTLI_VERSION.0, RESTLI_VERSION.1)
            .json(&post)
            .send()
            .await
            .map_err(network_error)?;

        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let created: UgcPostResponse = read_json(response).await?;
        let id = created.id.or(header_id).ok_or_else(|| PlatformError::RemoteRejected {
            status: 201,
            message: "LinkedIn did not return a post id".to_string(),
        })?;

        Ok(Published {
            url: format!("{}/{}", FEED_URL, id),
            post_id: id,
            warning: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Credentials;
    use secrecy::SecretString;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn account() -> Account {
        Account {
            id: "page-li".into(),
            platform: PlatformKind::LinkedIn,
            display_name: "Studio".into(),
            username: None,
            credentials: Credentials {
                access_token: Some(SecretString::from("li-token".to_string())),
                platform_user_id: Some("abc123".into()),
                ..Default::default()
            },
        }
    }

    fn image_content() -> PostContent {
        PostContent::text("Launch day").with_image(ImagePayload::new(vec![1, 2, 3], "image/png"))
    }

    #[tokio::test]
    async fn test_missing_person_id_makes_no_requests() {
        let server = MockServer::start().await;
        let mut account = account();
        account.credentials.platform_user_id = None;

        let err = LinkedInPublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account, &PostContent::text("hi"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            PlatformError::MissingCredentials {
                platform: PlatformKind::LinkedIn,
                fields: vec![CredentialField::PlatformUserId],
            }
        );
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_text_only_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(header("X-Restli-Protocol-Version", "2.0.0"))
            .and(header("Authorization", "Bearer li-token"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "id": "urn:li:share:42" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let published = LinkedInPublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account(), &PostContent::text("hi"))
            .await
            .unwrap();

        assert_eq!(published.post_id, "urn:li:share:42");
        assert_eq!(published.url, "https://www.linkedin.com/feed/update/urn:li:share:42");
    }

    #[tokio::test]
    async fn test_image_post_runs_three_phases() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/assets"))
            .and(query_param("action", "registerUpload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": {
                    "uploadMechanism": {
                        "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest": {
                            "headers": {},
                            "uploadUrl": format!("{}/upload/asset-1", server.uri())
                        }
                    },
                    "asset": "urn:li:digitalmediaAsset:asset-1"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/upload/asset-1"))
            .and(header("Authorization", "Bearer li-token"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-restli-id", "urn:li:share:77")
                    .set_body_json(json!({})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let published = LinkedInPublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account(), &image_content())
            .await
            .unwrap();
        assert_eq!(published.post_id, "urn:li:share:77");

        let requests = server.received_requests().await.unwrap_or_default();
        let upload = requests.iter().find(|r| r.url.path() == "/upload/asset-1").unwrap();
        assert_eq!(upload.body, vec![1, 2, 3]);

        let post = requests.iter().find(|r| r.url.path() == "/v2/ugcPosts").unwrap();
        let body: Value = serde_json::from_slice(&post.body).unwrap();
        let share = &body["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(body["author"], "urn:li:person:abc123");
        assert_eq!(share["shareMediaCategory"], "IMAGE");
        assert_eq!(share["media"][0]["media"], "urn:li:digitalmediaAsset:asset-1");
    }

    #[tokio::test]
    async fn test_failed_registration_aborts_before_share() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/assets"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "message": "Internal Server Error",
                "status": 500
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "never" })))
            .expect(0)
            .mount(&server)
            .await;

        let err = LinkedInPublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account(), &image_content())
            .await
            .unwrap_err();

        match err {
            PlatformError::UploadFailed(message) => {
                assert!(message.starts_with("Failed to register LinkedIn image upload"));
                assert!(message.contains("Internal Server Error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_share_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "message": "ERROR :: /specificContent/com.linkedin.ugc.ShareContent/shareCommentary/text :: length exceeded",
                "status": 422
            })))
            .mount(&server)
            .await;

        let err = LinkedInPublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account(), &PostContent::text("long"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("length exceeded"));
    }
}
