//! Wire types shared by the Pockets server, its operator CLI and the upstream
//! link-storage service.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier of an upstream record. The storage service emits either numbers
/// or strings depending on the project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkId {
    Number(i64),
    Text(String),
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkId::Number(value) => write!(f, "{value}"),
            LinkId::Text(value) => f.write_str(value),
        }
    }
}

/// A single stored value: a bookmarked link, a text note or a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkItem {
    pub id: LinkId,
    pub name: String,
    pub slug: String,
    pub value: String,
    /// `text`, `url` or `link` for bookmarks; `comment:{id}` for comments.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl LinkItem {
    /// Whether the value is an outbound URL rather than free text.
    pub fn is_external(&self) -> bool {
        matches!(self.kind.as_str(), "url" | "link")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLinks {
    pub first: Option<String>,
    pub last: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMeta {
    pub current_page: u32,
    pub from: Option<u64>,
    pub last_page: u32,
    pub per_page: u32,
    pub to: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Paginated envelope returned by the listing endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinksResponse {
    #[serde(default)]
    pub data: Vec<LinkItem>,
    #[serde(default)]
    pub links: PageLinks,
    #[serde(default)]
    pub meta: PageMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetails {
    pub id: LinkId,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDetailsResponse {
    pub data: LinkItem,
    pub project: ProjectDetails,
}

/// Body accepted by the upstream service when storing a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewValue {
    pub name: String,
    pub slug: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Snapshot of the link cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub has_cache: bool,
    /// Seconds since the entry was written.
    pub age: u64,
    /// Seconds until the entry expires.
    pub expires_in: u64,
    pub is_stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatusResponse {
    pub success: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub cache: CacheStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheRefreshRequest {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub before: CacheStats,
    pub after: CacheStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRefreshResponse {
    pub success: bool,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub stats: RefreshStats,
    #[serde(rename = "itemsCount")]
    pub items_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevalidateRequest {
    pub path: Option<String>,
    /// `page` (exact path) or `layout` (path and everything below it).
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevalidateResponse {
    pub revalidated: bool,
    pub path: String,
    /// Milliseconds since the Unix epoch.
    pub now: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinRequest {
    pub pin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateLinkRequest {
    pub pin: String,
    pub name: String,
    pub slug: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLinkResponse {
    pub success: bool,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentRequest {
    #[serde(rename = "linkId")]
    pub link_id: Option<LinkId>,
    pub name: Option<String>,
    pub comment: Option<String>,
    /// Slug of the commented link; lets the server drop its rendered page.
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_id_accepts_numbers_and_strings() {
        let numeric: LinkItem = serde_json::from_str(
            r#"{"id":7,"name":"Rust","slug":"rust","value":"https://rust-lang.org","type":"url"}"#,
        )
        .expect("numeric id");
        assert_eq!(numeric.id, LinkId::Number(7));
        assert!(numeric.is_external());

        let text: LinkItem = serde_json::from_str(
            r#"{"id":"abc","name":"Note","slug":"note","value":"hello","type":"text"}"#,
        )
        .expect("string id");
        assert_eq!(text.id.to_string(), "abc");
        assert!(!text.is_external());
    }

    #[test]
    fn links_response_tolerates_missing_envelope_fields() {
        let page: LinksResponse = serde_json::from_str(r#"{"data":[]}"#).expect("minimal page");
        assert!(page.data.is_empty());
        assert_eq!(page.meta.current_page, 0);
        assert!(page.links.next.is_none());
    }

    #[test]
    fn cache_stats_use_camel_case_keys() {
        let stats = CacheStats {
            has_cache: true,
            age: 12,
            expires_in: 3588,
            is_stale: false,
        };
        let json = serde_json::to_value(stats).expect("serialize stats");
        assert_eq!(json["hasCache"], true);
        assert_eq!(json["expiresIn"], 3588);
        assert_eq!(json["isStale"], false);
    }

    #[test]
    fn revalidate_request_reads_type_field() {
        let request: RevalidateRequest =
            serde_json::from_str(r#"{"path":"/","type":"layout"}"#).expect("revalidate body");
        assert_eq!(request.path.as_deref(), Some("/"));
        assert_eq!(request.kind.as_deref(), Some("layout"));
        assert!(request.tag.is_none());
    }
}
