//! Analysis result types
//!
//! These are the values handed from an analyzer to the converter. They are
//! plain data: built once per analysis and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Fallback values used when a heuristic finds nothing.
pub mod defaults {
    pub const NAME: &str = "Unknown Plugin";
    pub const VERSION: &str = "1.0.0";
    pub const LANG: &str = "en";

    pub const SEARCH_URL_TEMPLATE: &str = "/search?q=${query}&page=${page}";
    pub const SEARCH_ITEM: &str =
        ".novel-item, .book-item, .manga-item, .series-item, .item, .post, article";
    pub const SEARCH_TITLE: &str = ".title, h3, h2, h1, .name, .book-title";
    pub const SEARCH_LINK: &str = "a, .link";

    pub const AUTHOR: &str = ".author, .writer, .author-name";
    pub const DESCRIPTION: &str = ".description, .summary, .synopsis, .about";
    pub const GENRES: &str = ".genre, .tag, .category, .genres";
    pub const STATUS: &str = ".status, .book-status";
    pub const CHAPTERS: &str = ".chapter, .chapter-item, .episode, li.chapter";

    /// Content selector when no content function exists at all.
    pub const CONTENT_GENERIC: &str = ".content, .chapter-content, #content, .text";
    /// Content selector when a content function exists but names no selector.
    pub const CONTENT_IN_FUNCTION: &str = ".content, .chapter-content, #content, .text, p";
    pub const TEXT_JOIN: &str = "\n\n";
}

/// Normalised plugin identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub lang: String,
    pub base_url: String,
    #[serde(default)]
    pub icon: String,
    /// Only the structural analyzer reports the raw id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl PluginMetadata {
    /// Turn an id such as `"wuxia-world.site"` into `"Wuxia World Site"`.
    pub fn name_from_id(id: &str) -> String {
        id.split(|c| matches!(c, '.' | '-' | '_'))
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_valid_version(version: &str) -> bool {
        !version.is_empty() && version.chars().all(|c| c.is_ascii_digit() || c == '.')
    }

    pub fn is_valid_lang(lang: &str) -> bool {
        (2..=5).contains(&lang.chars().count())
    }
}

impl Default for PluginMetadata {
    fn default() -> Self {
        Self {
            name: defaults::NAME.to_string(),
            version: defaults::VERSION.to_string(),
            lang: defaults::LANG.to_string(),
            base_url: String::new(),
            icon: String::new(),
            id: None,
        }
    }
}

/// How to list works from a search or browse page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPattern {
    /// URL with `${query}` / `${page}` style placeholders.
    pub url_template: String,
    /// Comma-separated candidate selectors for result items.
    pub selector: String,
    pub title_selector: String,
    pub link_selector: String,
    #[serde(default)]
    pub cover_selector: Option<String>,
}

/// Selectors for a work's detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsPattern {
    pub author_selector: Option<String>,
    pub description_selector: Option<String>,
    pub genres_selector: Option<String>,
    pub status_selector: Option<String>,
    pub cover_selector: Option<String>,
    pub chapters_selector: Option<String>,
    pub chapter_name_selector: Option<String>,
    pub chapter_url_selector: Option<String>,
}

impl DetailsPattern {
    /// The pattern used when no details function could be located.
    pub fn generic() -> Self {
        Self {
            author_selector: Some(defaults::AUTHOR.to_string()),
            description_selector: Some(defaults::DESCRIPTION.to_string()),
            genres_selector: Some(defaults::GENRES.to_string()),
            status_selector: Some(defaults::STATUS.to_string()),
            cover_selector: None,
            chapters_selector: Some(defaults::CHAPTERS.to_string()),
            chapter_name_selector: None,
            chapter_url_selector: None,
        }
    }
    /// Whether any work-level field (author through cover) has a selector.
    pub fn has_detail_selectors(&self) -> bool {
        [
            &self.author_selector,
            &self.description_selector,
            &self.genres_selector,
            &self.status_selector,
            &self.cover_selector,
        ]
        .iter()
        .any(|selector| selector.is_some())
    }
}

/// How to assemble chapter text from a chapter page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPattern {
    pub selector: String,
    /// Separator between matched text blocks: `"\n\n"`, `"\n"` or `" "`.
    pub text_join: String,
}

impl ContentPattern {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            text_join: defaults::TEXT_JOIN.to_string(),
        }
    }

    /// The pattern used when no content function could be located.
    pub fn generic() -> Self {
        Self::new(defaults::CONTENT_GENERIC)
    }
}

/// Everything an analyzer learned about one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedPlugin {
    pub metadata: PluginMetadata,
    /// `None` means the plugin cannot browse or search.
    pub search_pattern: Option<SearchPattern>,
    pub details_pattern: Option<DetailsPattern>,
    pub content_pattern: Option<ContentPattern>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_from_id() {
        assert_eq!(PluginMetadata::name_from_id("wuxiaworld.site"), "Wuxiaworld Site");
        assert_eq!(PluginMetadata::name_from_id("novel-full_en"), "Novel Full En");
        assert_eq!(PluginMetadata::name_from_id("a..b"), "A  B");
    }

    #[test]
    fn test_detail_selectors_presence() {
        assert!(DetailsPattern::generic().has_detail_selectors());
        assert!(!DetailsPattern::default().has_detail_selectors());

        let chapters_only = DetailsPattern {
            chapters_selector: Some("li.chapter".to_string()),
            ..DetailsPattern::default()
        };
        assert!(!chapters_only.has_detail_selectors());
    }

    #[test]
    fn test_version_and_lang_validation() {
        assert!(PluginMetadata::is_valid_version("2.1.0"));
        assert!(!PluginMetadata::is_valid_version("v2"));
        assert!(!PluginMetadata::is_valid_version(""));
        assert!(PluginMetadata::is_valid_lang("en"));
        assert!(PluginMetadata::is_valid_lang("pt-BR"));
        assert!(!PluginMetadata::is_valid_lang("english"));
        assert!(!PluginMetadata::is_valid_lang("e"));
    }

    #[test]
    fn test_generic_patterns() {
        let details = DetailsPattern::generic();
        assert_eq!(details.chapters_selector.as_deref(), Some(defaults::CHAPTERS));
        assert!(details.cover_selector.is_none());

        let content = ContentPattern::generic();
        assert_eq!(content.selector, defaults::CONTENT_GENERIC);
        assert_eq!(content.text_join, "\n\n");
    }

    #[test]
    fn test_analyzed_plugin_serialization() {
        let analyzed = AnalyzedPlugin {
            metadata: PluginMetadata::default(),
            search_pattern: None,
            details_pattern: Some(DetailsPattern::generic()),
            content_pattern: Some(ContentPattern::generic()),
        };

        let json = serde_json::to_string(&analyzed).unwrap();
        let back: AnalyzedPlugin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, analyzed);
        assert!(!json.contains("\"id\""));
    }
}
