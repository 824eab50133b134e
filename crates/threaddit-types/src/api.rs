use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// -- JWT Claims --

/// Bearer token claims. Tokens are minted by the auth service and only
/// verified here, so this is the single shared definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Query parameters --

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_OFFSET: u32 = 0;

/// `?limit=&offset=` for the subpost listing.
///
/// Values are kept as raw strings: anything that does not parse as an
/// unsigned integer falls back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListQuery {
    pub fn limit(&self) -> u32 {
        parse_or(self.limit.as_deref(), DEFAULT_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        parse_or(self.offset.as_deref(), DEFAULT_OFFSET)
    }
}

fn parse_or(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub name: String,
}

// -- Subposts --

/// Base record of a subpost as seen by a particular viewer.
#[derive(Debug, Clone, Serialize)]
pub struct SubpostView {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<i64>,
    #[serde(rename = "modList")]
    pub mod_list: Vec<String>,
    /// Only present for authenticated viewers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_subscribed: Option<bool>,
}

/// Aggregate counters for a subpost, used for ranking.
#[derive(Debug, Clone, Serialize)]
pub struct SubpostInfoView {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    #[serde(rename = "subscriberCount")]
    pub subscriber_count: Option<i64>,
    #[serde(rename = "PostsCount")]
    pub posts_count: Option<i64>,
    #[serde(rename = "CommentsCount")]
    pub comments_count: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SubpostListing {
    pub subscribed: Vec<SubpostView>,
    pub all: Vec<SubpostInfoView>,
    pub popular: Vec<SubpostInfoView>,
}

#[derive(Debug, Serialize)]
pub struct PostData {
    #[serde(rename = "postData")]
    pub post_data: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub message: String,
    #[serde(rename = "postData")]
    pub post_data: SubpostView,
}

/// `{postData}` wrapper around a single base view.
#[derive(Debug, Serialize)]
pub struct SubpostData {
    #[serde(rename = "postData")]
    pub post_data: SubpostView,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub message: String,
    pub new_data: SubpostData,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Overlay the aggregate view onto the base view.
///
/// Keys present in `info` replace the same keys from `base`; keys only in
/// `base` are kept. With no info row the base fields are returned alone.
pub fn overlay(
    base: &SubpostView,
    info: Option<&SubpostInfoView>,
) -> serde_json::Result<Map<String, Value>> {
    let mut merged = into_object(serde_json::to_value(base)?);
    if let Some(info) = info {
        for (key, value) in into_object(serde_json::to_value(info)?) {
            merged.insert(key, value);
        }
    }
    Ok(merged)
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
