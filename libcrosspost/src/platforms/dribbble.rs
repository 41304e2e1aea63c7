//! Dribbble publisher
//!
//! A shot is one multipart POST carrying the title, description, up to 12
//! tags and the image file.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::error::PlatformError;
use crate::platforms::{network_error, remote_message, Publisher};
use crate::types::{Account, CredentialField, PlatformKind, PostContent, PublishResult, Published};

const API_BASE: &str = "https://api.dribbble.com";
const SHOT_URL: &str = "https://dribbble.com/shots";
const MAX_TAGS: usize = 12;

pub struct DribbblePublisher {
    client: reqwest::Client,
    api_base: String,
}

impl DribbblePublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, API_BASE)
    }

    pub fn with_base_url(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }
}

/// Shot id and page from either a JSON body or a `Location` header
fn created_shot(body: &str, location: Option<&str>) -> Option<(String, String)> {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let id = match value.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        if let Some(id) = id {
            let url = value
                .get("html_url")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}/{}", SHOT_URL, id));
            return Some((id, url));
        }
    }

    let id = location?.trim_end_matches('/').rsplit('/').next()?.to_string();
    (!id.is_empty()).then(|| (id.clone(), format!("{}/{}", SHOT_URL, id)))
}

#[async_trait]
impl Publisher for DribbblePublisher {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Dribbble
    }

    async fn publish(&self, account: &Account, content: &PostContent) -> PublishResult {
        let platform = PlatformKind::Dribbble;
        let credentials = &account.credentials;
        credentials.require(platform, platform.required_credentials())?;

        let title = content
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                PlatformError::Validation("Dribbble shots require a title".to_string())
            })?;
        let image = content
            .image
            .as_ref()
            .ok_or_else(|| {
                PlatformError::Validation("Dribbble shots require an image".to_string())
            })?;
        let token = credentials.field(platform, CredentialField::AccessToken)?;

        let mut form = Form::new().text("title", title.to_string());
        if !content.text.trim().is_empty() {
            form = form.text("description", content.text.clone());
        }
        let tags = content.tag_list();
        if !tags.is_empty() {
            let capped: Vec<String> = tags.into_iter().take(MAX_TAGS).collect();
            form = form.text("tags", capped.join(","));
        }
        let part = Part::bytes(image.bytes.clone())
            .file_name(format!("shot.{}", image.extension()))
            .mime_str(&image.mime_type)
            .map_err(|e| PlatformError::UploadFailed(e.to_string()))?;
        form = form.part("image", part);

        let response = self
            .client
            .post(format!("{}/v2/shots", self.api_base))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(network_error)?;

        if !status.is_success() {
            return Err(PlatformError::RemoteRejected {
                status: status.as_u16(),
                message: remote_message(&body),
            });
        }

        let (post_id, url) =
            created_shot(&body, location.as_deref()).ok_or_else(|| PlatformError::RemoteRejected {
                status: status.as_u16(),
                message: "Dribbble did not return a shot id".to_string(),
            })?;

        Ok(Published {
            post_id,
            url,
            warning: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Credentials, ImagePayload};
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn account() -> Account {
        Account {
            id: "page-dr".into(),
            platform: PlatformKind::Dribbble,
            display_name: "Studio".into(),
            username: None,
            credentials: Credentials {
                access_token: Some(SecretString::from("dr-token".to_string())),
                ..Default::default()
            },
        }
    }

    fn shot() -> PostContent {
        PostContent::text("")
            .with_title("Shot")
            .with_image(ImagePayload::new(b"PNGDATA".to_vec(), "image/png"))
    }

    #[tokio::test]
    async fn test_single_multipart_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/shots"))
            .and(header("Authorization", "Bearer dr-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "42",
                "html_url": "https://dribbble.com/shots/42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let published = DribbblePublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account(), &shot())
            .await
            .unwrap();

        assert_eq!(
            published,
            Published {
                post_id: "42".into(),
                url: "https://dribbble.com/shots/42".into(),
                warning: None,
            }
        );

        let requests = server.received_requests().await.unwrap_or_default();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"title\""));
        assert!(body.contains("filename=\"shot.png\""));
        assert!(body.contains("PNGDATA"));
        assert!(!body.contains("name=\"tags\""));
        assert!(!body.contains("name=\"description\""));
    }

    #[tokio::test]
    async fn test_tags_capped_at_twelve() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/shots"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
            .mount(&server)
            .await;

        let tags = (1..=15).map(|i| format!("t{}", i)).collect::<Vec<_>>().join(", ");
        let published = DribbblePublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account(), &shot().with_tags(tags))
            .await
            .unwrap();
        assert_eq!(published.post_id, "7");
        assert_eq!(published.url, "https://dribbble.com/shots/7");

        let requests = server.received_requests().await.unwrap_or_default();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("t1,t2,t3,t4,t5,t6,t7,t8,t9,t10,t11,t12\r\n"));
        assert!(!body.contains("t13"));
    }

    #[tokio::test]
    async fn test_accepted_with_location_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/shots"))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Location", "https://api.dribbble.com/v2/shots/471756"),
            )
            .mount(&server)
            .await;

        let published = DribbblePublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account(), &shot())
            .await
            .unwrap();
        assert_eq!(published.post_id, "471756");
        assert_eq!(published.url, "https://dribbble.com/shots/471756");
    }

    #[tokio::test]
    async fn test_title_and_image_required_before_any_request() {
        let server = MockServer::start().await;
        let publisher = DribbblePublisher::with_base_url(reqwest::Client::new(), server.uri());

        let mut untitled = shot();
        untitled.title = Some("  ".into());
        let err = publisher.publish(&account(), &untitled).await.unwrap_err();
        assert_eq!(err, PlatformError::Validation("Dribbble shots require a title".into()));

        let mut no_image = shot();
        no_image.image = None;
        let err = publisher.publish(&account(), &no_image).await.unwrap_err();
        assert_eq!(err, PlatformError::Validation("Dribbble shots require an image".into()));

        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_message_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/shots"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "message": "You must be a player to upload shots."
            })))
            .mount(&server)
            .await;

        let err = DribbblePublisher::with_base_url(reqwest::Client::new(), server.uri())
            .publish(&account(), &shot())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You must be a player to upload shots.");
    }
}
