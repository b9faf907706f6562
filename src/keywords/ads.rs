//! Ads keyword planner client (REST `generateKeywordIdeas`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AdsErrorDetail, ConfigError, KeywordError};

use super::ideas::{Competition, KeywordIdea};
use super::{KeywordRequest, KeywordSource};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_API_ROOT: &str = "https://googleads.googleapis.com";
const DEFAULT_API_VERSION: &str = "v19";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Account the keyword planner is queried under unless overridden.
pub const DEFAULT_CUSTOMER_ID: &str = "9910458952";

/// Japanese.
pub const DEFAULT_LANGUAGE_ID: &str = "1005";

/// The ten most populous prefectures: Tokyo, Kanagawa, Osaka, Aichi, Saitama,
/// Chiba, Hyogo, Hokkaido, Fukuoka, Shizuoka.
pub const DEFAULT_LOCATION_IDS: [&str; 10] = [
    "20636", "20637", "2392", "20646", "20634", "20635", "20651", "20624", "20663", "20645",
];

/// Credentials and request defaults for the keyword planner.
#[derive(Debug, Clone)]
pub struct AdsConfig {
    pub developer_token: SecretString,
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    pub login_customer_id: Option<String>,
    pub customer_id: String,
    pub language_id: String,
    pub location_ids: Vec<String>,
    pub api_version: String,
    pub api_root: String,
}

impl AdsConfig {
    /// Build config from environment variables.
    /// Returns `Ok(None)` if `GOOGLE_ADS_DEVELOPER_TOKEN` is not set (feature disabled).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(developer_token) = std::env::var("GOOGLE_ADS_DEVELOPER_TOKEN") else {
            return Ok(None);
        };

        let required = |key: &str| {
            std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
        };

        let location_ids: Vec<String> = std::env::var("GOOGLE_ADS_LOCATION_IDS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .filter(|ids: &Vec<String>| !ids.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION_IDS.iter().map(|s| s.to_string()).collect());

        Ok(Some(Self {
            developer_token: SecretString::from(developer_token),
            client_id: required("GOOGLE_ADS_CLIENT_ID")?,
            client_secret: SecretString::from(required("GOOGLE_ADS_CLIENT_SECRET")?),
            refresh_token: SecretString::from(required("GOOGLE_ADS_REFRESH_TOKEN")?),
            login_customer_id: std::env::var("GOOGLE_ADS_LOGIN_CUSTOMER_ID")
                .ok()
                .map(|id| digits_only(&id)),
            customer_id: std::env::var("GOOGLE_ADS_CUSTOMER_ID")
                .map(|id| digits_only(&id))
                .unwrap_or_else(|_| DEFAULT_CUSTOMER_ID.to_string()),
            language_id: std::env::var("GOOGLE_ADS_LANGUAGE_ID")
                .unwrap_or_else(|_| DEFAULT_LANGUAGE_ID.to_string()),
            location_ids,
            api_version: std::env::var("GOOGLE_ADS_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            api_root: DEFAULT_API_ROOT.to_string(),
        }))
    }
}

/// Customer ids are often written as `123-456-7890`.
fn digits_only(id: &str) -> String {
    id.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Build the `generateKeywordIdeas` request body.
///
/// Exactly one of `keywordSeed`, `urlSeed`, `keywordAndUrlSeed` is set,
/// depending on which inputs were supplied.
pub fn build_request_body(
    config: &AdsConfig,
    request: &KeywordRequest,
    page_token: Option<&str>,
) -> Result<Value, KeywordError> {
    let mut body = json!({
        "language": format!("languageConstants/{}", config.language_id),
        "geoTargetConstants": config
            .location_ids
            .iter()
            .map(|id| format!("geoTargetConstants/{id}"))
            .collect::<Vec<_>>(),
        "includeAdultKeywords": false,
        "keywordPlanNetwork": "GOOGLE_SEARCH_AND_PARTNERS",
    });

    match (request.keywords.is_empty(), request.page_url.as_deref()) {
        (true, None) => return Err(KeywordError::NoSeed),
        (true, Some(url)) => {
            body["urlSeed"] = json!({ "url": url });
        }
        (false, None) => {
            body["keywordSeed"] = json!({ "keywords": request.keywords });
        }
        (false, Some(url)) => {
            body["keywordAndUrlSeed"] = json!({ "url": url, "keywords": request.keywords });
        }
    }

    if let Some(token) = page_token {
        body["pageToken"] = json!(token);
    }
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdeasPage {
    #[serde(default)]
    results: Vec<IdeaResult>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdeaResult {
    #[serde(default)]
    text: String,
    keyword_idea_metrics: Option<IdeaMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdeaMetrics {
    /// int64 fields are encoded as JSON strings.
    avg_monthly_searches: Option<Value>,
    #[serde(default)]
    competition: Competition,
}

fn parse_int64(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        _ => 0,
    }
}

/// Convert one response page into ideas plus the next page token.
fn parse_page(raw: &str) -> Result<(Vec<KeywordIdea>, Option<String>), KeywordError> {
    let page: IdeasPage =
        serde_json::from_str(raw).map_err(|e| KeywordError::InvalidResponse(e.to_string()))?;
    let ideas = page
        .results
        .into_iter()
        .map(|r| {
            let (volume, competition) = match r.keyword_idea_metrics {
                Some(m) => (parse_int64(m.avg_monthly_searches.as_ref()), m.competition),
                None => (0, Competition::Unspecified),
            };
            KeywordIdea::new(r.text, volume, competition)
        })
        .collect();
    let next = page.next_page_token.filter(|t| !t.is_empty());
    Ok((ideas, next))
}

/// Parse an API error payload into a structured `KeywordError::Api`.
fn parse_api_failure(status: u16, header_request_id: Option<String>, raw: &str) -> KeywordError {
    let mut request_id = header_request_id;
    let mut errors = Vec::new();

    if let Ok(payload) = serde_json::from_str::<Value>(raw) {
        let error = &payload["error"];
        if let Some(details) = error["details"].as_array() {
            for detail in details {
                if request_id.is_none() {
                    request_id = detail["requestId"].as_str().map(String::from);
                }
                for entry in detail["errors"].as_array().into_iter().flatten() {
                    let field_path = entry["location"]["fieldPathElements"]
                        .as_array()
                        .into_iter()
                        .flatten()
                        .filter_map(|f| f["fieldName"].as_str().map(String::from))
                        .collect();
                    errors.push(AdsErrorDetail {
                        message: entry["message"].as_str().unwrap_or_default().to_string(),
                        field_path,
                    });
                }
            }
        }
        if errors.is_empty()
            && let Some(message) = error["message"].as_str()
        {
            errors.push(AdsErrorDetail {
                message: message.to_string(),
                field_path: Vec::new(),
            });
        }
    }

    KeywordError::Api {
        status,
        request_id,
        errors,
    }
}

/// Keyword planner backed by the ads REST API.
pub struct AdsKeywordPlanner {
    client: Client,
    config: AdsConfig,
}

impl AdsKeywordPlanner {
    pub fn new(config: AdsConfig) -> Result<Self, KeywordError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| KeywordError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/customers/{}:generateKeywordIdeas",
            self.config.api_root, self.config.api_version, self.config.customer_id
        )
    }

    async fn access_token(&self) -> Result<String, KeywordError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("refresh_token", self.config.refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| KeywordError::Auth(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(KeywordError::Auth(format!("HTTP {}: {}", status.as_u16(), text)));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| KeywordError::Auth(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn fetch_page(
        &self,
        access_token: &str,
        request: &KeywordRequest,
        page_token: Option<&str>,
    ) -> Result<(Vec<KeywordIdea>, Option<String>), KeywordError> {
        let body = build_request_body(&self.config, request, page_token)?;
        let mut builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(access_token)
            .header("developer-token", self.config.developer_token.expose_secret())
            .json(&body);
        if let Some(ref login) = self.config.login_customer_id {
            builder = builder.header("login-customer-id", login);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| KeywordError::Http(e.to_string()))?;
        let status = response.status();
        let request_id = response
            .headers()
            .get("request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let text = response
            .text()
            .await
            .map_err(|e| KeywordError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_api_failure(status.as_u16(), request_id, &text));
        }
        parse_page(&text)
    }
}

/// The token for the following page, or `None` when paging should stop,
/// including when the server repeats the token it was just given.
fn next_page_token(current: Option<&str>, next: Option<String>) -> Option<String> {
    match next {
        Some(next) if current == Some(next.as_str()) => {
            tracing::warn!(page_token = %next, "Repeated page token, stopping");
            None
        }
        next => next,
    }
}

#[async_trait]
impl KeywordSource for AdsKeywordPlanner {
    async fn keyword_ideas(
        &self,
        request: &KeywordRequest,
    ) -> Result<Vec<KeywordIdea>, KeywordError> {
        if request.keywords.is_empty() && request.page_url.is_none() {
            return Err(KeywordError::NoSeed);
        }

        let token = self.access_token().await?;
        let mut ideas = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let (mut page, next) = self
                .fetch_page(&token, request, page_token.as_deref())
                .await?;
            ideas.append(&mut page);
            match next_page_token(page_token.as_deref(), next) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::info!(
            customer_id = %self.config.customer_id,
            seeds = request.keywords.len(),
            ideas = ideas.len(),
            "Fetched keyword ideas"
        );
        Ok(ideas)
    }
}
