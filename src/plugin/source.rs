//! Content source interface
//!
//! This module defines the interface a converted plugin exposes to the rest
//! of the application, and the entities it produces:
//! - Listing and searching works page by page
//! - Enriching a work with its detail page
//! - Getting chapter lists
//! - Getting chapter content

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Content source trait
///
/// Operations never fail: fetch and parse problems surface as an empty
/// result, or as the unchanged input for [`ContentSource::fetch_details`].
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;

    fn lang(&self) -> &str;

    fn base_url(&self) -> &str;

    /// Filters the source understands
    fn filters(&self) -> Vec<Filter>;

    /// Browse works
    ///
    /// # Arguments
    /// * `listing` - Requested listing; sources may ignore it
    /// * `page` - Page number (1-indexed)
    async fn list_page(&self, listing: Option<&Listing>, page: u32) -> MangasPageInfo;

    /// Search works
    ///
    /// # Arguments
    /// * `filters` - Only a [`Filter::Title`] is consulted, as the query
    /// * `page` - Page number (1-indexed)
    async fn search(&self, filters: &[Filter], page: u32) -> MangasPageInfo;

    /// Enrich `manga` from its detail page
    ///
    /// Fields that cannot be recovered keep their current value.
    async fn fetch_details(&self, manga: MangaInfo) -> MangaInfo;

    /// Chapters of `manga` in page order
    async fn fetch_chapter_list(&self, manga: &MangaInfo) -> Vec<ChapterInfo>;

    /// Content of `chapter`
    async fn fetch_page_list(&self, chapter: &ChapterInfo) -> Vec<Page>;
}

/// A named listing such as "latest" or "popular"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
}

/// Search filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Filter {
    /// Free-text title query
    Title(String),
}

impl Filter {
    /// The query of the first filter, or an empty string.
    pub fn title_query(filters: &[Filter]) -> &str {
        filters.first().map_or("", |Filter::Title(query)| query.as_str())
    }
}

/// Publication status of a work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MangaStatus {
    #[default]
    Unknown,
    Ongoing,
    Completed,
    OnHiatus,
    Cancelled,
}

impl MangaStatus {
    /// Map free status text by case-insensitive containment.
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("ongoing") {
            MangaStatus::Ongoing
        } else if lower.contains("completed") {
            MangaStatus::Completed
        } else if lower.contains("hiatus") {
            MangaStatus::OnHiatus
        } else if lower.contains("cancelled") {
            MangaStatus::Cancelled
        } else {
            MangaStatus::Unknown
        }
    }
}

/// A work as listed by a source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MangaInfo {
    /// Absolute URL of the detail page
    pub key: String,

    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(default)]
    pub status: MangaStatus,

    /// Cover image URL, empty when unknown
    #[serde(default)]
    pub cover: String,
}

impl MangaInfo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

/// One page of listing results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MangasPageInfo {
    pub mangas: Vec<MangaInfo>,
    pub has_next_page: bool,
}

impl MangasPageInfo {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Chapter information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterInfo {
    /// Absolute URL of the chapter page
    pub key: String,

    pub name: String,

    /// 1-based position in the chapter list
    pub number: f32,
}

impl ChapterInfo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }
}

/// A unit of chapter content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "lowercase")]
pub enum Page {
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_text() {
        assert_eq!(MangaStatus::from_text("Status: OnGoing"), MangaStatus::Ongoing);
        assert_eq!(MangaStatus::from_text("COMPLETED"), MangaStatus::Completed);
        assert_eq!(MangaStatus::from_text("on hiatus"), MangaStatus::OnHiatus);
        assert_eq!(MangaStatus::from_text("Cancelled"), MangaStatus::Cancelled);
        assert_eq!(MangaStatus::from_text("dropped"), MangaStatus::Unknown);
        assert_eq!(MangaStatus::from_text(""), MangaStatus::Unknown);
    }

    #[test]
    fn test_title_query() {
        let filters = vec![Filter::Title("dragon".into()), Filter::Title("ignored".into())];
        assert_eq!(Filter::title_query(&filters), "dragon");
        assert_eq!(Filter::title_query(&[]), "");
    }

    #[test]
    fn test_manga_info_serialization() {
        let manga = MangaInfo {
            key: "https://site.example/novel/1".to_string(),
            title: "Test Novel".to_string(),
            status: MangaStatus::OnHiatus,
            ..MangaInfo::default()
        };

        let json = serde_json::to_string(&manga).unwrap();
        assert!(json.contains("\"on_hiatus\""));
        let deserialized: MangaInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, manga);
    }

    #[test]
    fn test_manga_info_defaults() {
        let json = r#"{"key":"https://site.example/n","title":"N"}"#;
        let manga: MangaInfo = serde_json::from_str(json).unwrap();
        assert_eq!(manga.status, MangaStatus::Unknown);
        assert!(manga.genres.is_empty());
    }

    #[test]
    fn test_page_serialization() {
        let json = serde_json::to_string(&Page::Text("Once upon".into())).unwrap();
        assert_eq!(json, r#"{"type":"text","text":"Once upon"}"#);
    }
}
