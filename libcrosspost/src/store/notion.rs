//! Notion-backed credential store
//!
//! A main database holds `Name`/`Value` rows: channel ids and the ids of the
//! other databases (platform accounts, site inspirations, publish channels).
//! The main database is cached for a configurable TTL; account rows are always
//! read fresh so rotated credentials are picked up.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::cache::{Clock, SystemClock, TtlCache};
use super::{CredentialStore, Destination, Inspiration, StoreConfig};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::types::{Account, AccountId, Credentials, PlatformKind};

const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;

/// Values parsed out of the main configuration database
#[derive(Debug, Clone, Default)]
struct MainDatabase {
    config: StoreConfig,
    accounts_db: Option<String>,
    inspirations_db: Option<String>,
    destinations_db: Option<String>,
}

impl MainDatabase {
    fn from_rows(rows: &[(String, Option<String>)]) -> Self {
        let mut main = MainDatabase::default();
        for (name, value) in rows {
            let Some(value) = value.as_ref().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
            else {
                continue;
            };
            match name.as_str() {
                "Draft Channel ID" | "POST_DRAFT_CHANNEL_ID" => {
                    main.config.draft_channel = Some(value)
                }
                "Publish Channel ID" | "POST_PUBLISH_CHANNEL_ID" => {
                    main.config.publish_channel = Some(value)
                }
                "Post Server ID" | "POST_SERVER_ID" => main.config.server_id = Some(value),
                "Site Inspiration Channel ID" | "SITE_INSPIRATION_CHANNEL_ID" => {
                    main.config.default_destination = Some(value)
                }
                "DB - Publish Channel IDs" => main.destinations_db = Some(value),
                n if n == "PLATFORM_ACCOUNTS_DB_ID" || n.contains("PlatformAccounts") => {
                    main.accounts_db = Some(value)
                }
                n if n == "SITE_INSPIRATIONS_DB_ID" || n.contains("SiteInspirations") => {
                    main.inspirations_db = Some(value)
                }
                _ => {}
            }
        }
        main
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<NotionPage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotionPage {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl NotionPage {
    /// First plain-text run of a title, rich text or url property
    fn text(&self, name: &str) -> Option<String> {
        let property = self.properties.get(name)?;
        let first_run = |kind: &str| {
            property
                .get(kind)
                .and_then(|runs| runs.get(0))
                .and_then(|run| run.get("plain_text"))
                .and_then(Value::as_str)
        };
        first_run("rich_text")
            .or_else(|| property.get("url").and_then(Value::as_str))
            .or_else(|| first_run("title"))
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
    }

    fn select(&self, name: &str) -> Option<String> {
        self.properties
            .get(name)?
            .get("select")?
            .get("name")?
            .as_str()
            .map(str::to_string)
    }

    fn secret(&self, name: &str) -> Option<SecretString> {
        self.text(name).map(SecretString::from)
    }

    fn to_account(&self, platform: PlatformKind) -> Account {
        let platform = self
            .select("Platform")
            .and_then(|p| p.parse().ok())
            .unwrap_or(platform);
        Account {
            id: AccountId(self.id.clone()),
            platform,
            display_name: self
                .text("Name")
                .unwrap_or_else(|| "Unnamed Account".to_string()),
            username: self.text("Username"),
            credentials: Credentials {
                api_key: self.secret("API Key"),
                api_secret: self.secret("API Secret"),
                access_token: self.secret("Access Token"),
                access_token_secret: self.secret("Access Token Secret"),
                refresh_token: self.secret("Refresh Token"),
                platform_user_id: self.text("Platform User ID"),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    message: String,
}

fn rich_text(content: &str) -> Value {
    json!({ "rich_text": [{ "text": { "content": content } }] })
}

/// Credential store backed by the Notion REST API
pub struct NotionStore {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    main_database_id: String,
    main_cache: TtlCache<MainDatabase>,
}

impl NotionStore {
    pub fn new(
        api_key: SecretString,
        main_database_id: impl Into<String>,
        api_base: impl Into<String>,
        config_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
            main_database_id: main_database_id.into(),
            main_cache: TtlCache::new(config_ttl, clock),
        }
    }

    /// Build a store from loaded configuration and the `NOTION_API_KEY` secret
    pub fn from_config(config: &Config, api_key: SecretString) -> Result<Self> {
        Ok(Self::new(
            api_key,
            config.main_database_id()?,
            config.notion.api_base.clone(),
            config.config_ttl()?,
            Arc::new(SystemClock),
        ))
    }

    /// Drop the cached main database so the next read goes to Notion
    pub fn clear_cache(&self) {
        self.main_cache.invalidate();
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(self.api_key.expose_secret())
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<NotionErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Query every page of a database, following pagination cursors
    async fn query_all(
        &self,
        database_id: &str,
        filter: Option<Value>,
    ) -> std::result::Result<Vec<NotionPage>, StoreError> {
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response = self
                .send(
                    self.request(
                        reqwest::Method::POST,
                        &format!("/v1/databases/{}/query", database_id),
                    )
                    .json(&body),
                )
                .await?;
            let parsed: QueryResponse = response
                .json()
                .await
                .map_err(|e| StoreError::Malformed(e.to_string()))?;

            pages.extend(parsed.results);
            match parsed.next_cursor {
                Some(next) if parsed.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(pages)
    }

    async fn main_database(&self) -> std::result::Result<MainDatabase, StoreError> {
        if let Some(main) = self.main_cache.get() {
            return Ok(main);
        }

        tracing::debug!(database = %self.main_database_id, "Fetching main configuration database");
        let pages = self.query_all(&self.main_database_id, None).await?;
        let rows: Vec<(String, Option<String>)> = pages
            .iter()
            .map(|p| (p.text("Name").unwrap_or_default(), p.text("Value")))
            .collect();

        let main = MainDatabase::from_rows(&rows);
        self.main_cache.put(main.clone());
        Ok(main)
    }
}

#[async_trait]
impl CredentialStore for NotionStore {
    async fn accounts(
        &self,
        platform: PlatformKind,
    ) -> std::result::Result<Vec<Account>, StoreError> {
        let Some(db) = self.main_database().await?.accounts_db else {
            tracing::warn!("Platform accounts database is not configured in Notion");
            return Ok(Vec::new());
        };

        let filter = json!({
            "and": [{ "property": "Platform", "select": { "equals": platform.as_str() } }]
        });
        let pages = self.query_all(&db, Some(filter)).await?;
        tracing::debug!(platform = %platform, count = pages.len(), "Loaded platform accounts");

        Ok(pages.iter().map(|p| p.to_account(platform)).collect())
    }

    async fn config(&self) -> std::result::Result<StoreConfig, StoreError> {
        Ok(self.main_database().await?.config)
    }

    async fn update_account_tokens(
        &self,
        account_id: &AccountId,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> std::result::Result<(), StoreError> {
        let mut properties = HashMap::new();
        properties.insert("Access Token", rich_text(access_token));
        if let Some(refresh) = refresh_token {
            properties.insert("Refresh Token", rich_text(refresh));
        }

        self.send(
            self.request(reqwest::Method::PATCH, &format!("/v1/pages/{}", account_id))
                .json(&json!({ "properties": properties })),
        )
        .await?;

        tracing::info!(account = %account_id, "Platform account tokens updated");
        Ok(())
    }

    async fn publish_destinations(&self) -> std::result::Result<Vec<Destination>, StoreError> {
        let Some(db) = self.main_database().await?.destinations_db else {
            return Err(StoreError::NotConfigured(
                "No \"DB - Publish Channel IDs\" found in main database. Please add it to your Notion main database."
                    .to_string(),
            ));
        };

        let pages = self.query_all(&db, None).await?;
        Ok(pages
            .iter()
            .filter_map(|p| {
                p.text("Channel ID").map(|id| Destination {
                    id: id.trim().to_string(),
                    name: p.text("Name").unwrap_or_else(|| "Unnamed".to_string()),
                })
            })
            .collect())
    }

    async fn save_inspiration(
        &self,
        inspiration: &Inspiration,
    ) -> std::result::Result<(), StoreError> {
        let Some(db) = self.main_database().await?.inspirations_db else {
            return Err(StoreError::NotConfigured(
                "Site Inspirations database ID not configured in Notion".to_string(),
            ));
        };

        let name = if inspiration.title.trim().is_empty() {
            inspiration.url.as_str()
        } else {
            inspiration.title.as_str()
        };
        let mut properties = json!({
            "Name": { "title": [{ "text": { "content": name } }] },
            "URL": { "url": inspiration.url },
        });
        if let Some(description) = inspiration.description.as_deref().filter(|d| !d.is_empty()) {
            properties["Description"] = rich_text(description);
        }

        self.send(
            self.request(reqwest::Method::POST, "/v1/pages").json(&json!({
                "parent": { "database_id": db },
                "properties": properties,
            })),
        )
        .await?;

        tracing::info!(title = %name, "Site inspiration saved to Notion");
        Ok(())
    }
}
