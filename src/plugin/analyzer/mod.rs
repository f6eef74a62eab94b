//! Plugin analysis
//!
//! One analyzer, two ways of deciding *where* to look. A [`ScopeProvider`]
//! supplies the plugin metadata and the source regions that hold listing,
//! details and content logic, and knows how to pull a selector for a
//! [`SelectorField`] out of a region. [`PluginAnalyzer`] owns everything else:
//! the URL template chain, the per-field defaults, join detection and the
//! final [`AnalyzedPlugin`] assembly.
//!
//! - [`RegexScope`] scans the whole raw source with anchored call patterns.
//! - [`StructuralScope`] looks up named functions in a [`ParsedPlugin`] and
//!   scans only their bodies with generic call patterns.

mod regex_scope;
mod structural_scope;

pub use regex_scope::RegexScope;
pub use structural_scope::StructuralScope;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::extract::{Attempt, Chain};
use super::js_parser::{JsParser, ParsedPlugin};
use super::logger::{AnalysisEvent, AnalysisLogger, TracingAnalysisLogger};
use super::types::{defaults, AnalyzedPlugin, ContentPattern, DetailsPattern, PluginMetadata, SearchPattern};

/// Which scope provider an analysis runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    /// Whole-source pattern matching, tolerant of minified code.
    Regex,
    /// Function-body scoped matching over the structural parse.
    Structural,
    /// Structural when the parse finds a metadata object, regex otherwise.
    #[default]
    Auto,
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalyzerKind::Regex => "regex",
            AnalyzerKind::Structural => "structural",
            AnalyzerKind::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// Selector-producing call shapes recognised in plugin code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallForm {
    /// `$('sel')`
    Dollar,
    /// `.select('sel')`
    Select,
    /// `.find('sel')`
    Find,
    /// `.querySelector('sel')`
    QuerySelector,
    /// `.querySelectorAll('sel')`
    QuerySelectorAll,
}

impl CallForm {
    pub fn label(self) -> &'static str {
        match self {
            CallForm::Dollar => "dollar-call",
            CallForm::Select => "select-call",
            CallForm::Find => "find-call",
            CallForm::QuerySelector => "query-selector",
            CallForm::QuerySelectorAll => "query-selector-all",
        }
    }

    /// Escaped regex prefix that precedes the `(` of the call.
    pub fn prefix(self) -> &'static str {
        match self {
            CallForm::Dollar => r"\$",
            CallForm::Select => r"\.select",
            CallForm::Find => r"\.find",
            CallForm::QuerySelector => r"\.querySelector",
            CallForm::QuerySelectorAll => r"\.querySelectorAll",
        }
    }
}

/// One selector the analysis tries to recover, with its fallback.
pub struct SelectorField {
    pub name: &'static str,
    /// Case-insensitive words a selector must contain to belong to this field.
    pub keywords: &'static [&'static str],
    /// Field-specific `(label, pattern)` pairs tried before `call_forms`.
    pub patterns: &'static [(&'static str, &'static str)],
    /// Keyword-anchored calls tried by the whole-source scope.
    pub call_forms: &'static [CallForm],
    pub default: Option<&'static str>,
    pub accept: fn(&str) -> bool,
}

impl SelectorField {
    pub fn matches_keyword(&self, candidate: &str) -> bool {
        let lower = candidate.to_lowercase();
        self.keywords.iter().any(|keyword| lower.contains(keyword))
    }
}

fn any_selector(_: &str) -> bool {
    true
}

/// Item selectors must look like CSS rather than a bare word.
fn has_selector_syntax(candidate: &str) -> bool {
    candidate.contains('-') || candidate.contains('.') || candidate.contains('#')
}

pub static SEARCH_ITEM: SelectorField = SelectorField {
    name: "search.selector",
    keywords: &["novel", "book", "manga", "series", "story", "item", "entry", "post", "article"],
    patterns: &[
        ("dollar-iterate", r#"\$\(['"]([^'"]+)['"]\)\.(?:map|each|find)"#),
        ("select-call", r#"\.select\(['"]([^'"]+)['"]\)"#),
        (
            "listing-keyword",
            r#"['"]([^'"]*(?:novel|book|manga|series|story|item|entry|post|article)[^'"]*)['"]\)"#,
        ),
    ],
    call_forms: &[],
    default: Some(defaults::SEARCH_ITEM),
    accept: has_selector_syntax,
};

pub static SEARCH_TITLE: SelectorField = SelectorField {
    name: "search.title",
    keywords: &["title"],
    patterns: &[],
    call_forms: &[CallForm::Find, CallForm::Select, CallForm::QuerySelector],
    default: Some(defaults::SEARCH_TITLE),
    accept: any_selector,
};

pub static SEARCH_LINK: SelectorField = SelectorField {
    name: "search.link",
    keywords: &["link", "href"],
    patterns: &[],
    call_forms: &[],
    default: Some(defaults::SEARCH_LINK),
    accept: any_selector,
};

pub static SEARCH_COVER: SelectorField = SelectorField {
    name: "search.cover",
    keywords: &["img", "cover", "image"],
    patterns: &[],
    call_forms: &[CallForm::Find, CallForm::Select],
    default: None,
    accept: any_selector,
};

pub static AUTHOR: SelectorField = SelectorField {
    name: "details.author",
    keywords: &["author", "writer"],
    patterns: &[],
    call_forms: &[CallForm::Dollar, CallForm::Select, CallForm::QuerySelector],
    default: Some(defaults::AUTHOR),
    accept: any_selector,
};

pub static DESCRIPTION: SelectorField = SelectorField {
    name: "details.description",
    keywords: &["description", "summary", "synopsis"],
    patterns: &[],
    call_forms: &[CallForm::Dollar, CallForm::Select],
    default: Some(defaults::DESCRIPTION),
    accept: any_selector,
};

pub static GENRES: SelectorField = SelectorField {
    name: "details.genres",
    keywords: &["genre", "tag", "category"],
    patterns: &[],
    call_forms: &[CallForm::Dollar, CallForm::Select],
    default: Some(defaults::GENRES),
    accept: any_selector,
};

pub static STATUS: SelectorField = SelectorField {
    name: "details.status",
    keywords: &["status"],
    patterns: &[],
    call_forms: &[CallForm::Dollar, CallForm::Select],
    default: Some(defaults::STATUS),
    accept: any_selector,
};

pub static DETAILS_COVER: SelectorField = SelectorField {
    name: "details.cover",
    keywords: &["cover", "image", "img"],
    patterns: &[],
    call_forms: &[CallForm::Dollar, CallForm::Select],
    default: None,
    accept: any_selector,
};

pub static CHAPTERS: SelectorField = SelectorField {
    name: "details.chapters",
    keywords: &["chapter", "episode"],
    patterns: &[],
    call_forms: &[CallForm::Dollar, CallForm::Select],
    default: Some(defaults::CHAPTERS),
    accept: any_selector,
};

pub static CONTENT: SelectorField = SelectorField {
    name: "content.selector",
    keywords: &["content", "text", "chapter"],
    patterns: &[],
    call_forms: &[CallForm::Dollar, CallForm::Select, CallForm::QuerySelectorAll],
    default: Some(defaults::CONTENT_IN_FUNCTION),
    accept: any_selector,
};

pub static ALL_FIELDS: [&SelectorField; 11] = [
    &SEARCH_ITEM,
    &SEARCH_TITLE,
    &SEARCH_LINK,
    &SEARCH_COVER,
    &AUTHOR,
    &DESCRIPTION,
    &GENRES,
    &STATUS,
    &DETAILS_COVER,
    &CHAPTERS,
    &CONTENT,
];

lazy_static! {
    static ref URL_TEMPLATE_FORMS: [(&'static str, Regex); 4] = [
        (
            "query-string-literal",
            Regex::new(r#"['"]([^'"]*(?:search|page|novel|series|browse)[^'"]*\?[^'"]+)['"]"#)
                .expect("static pattern"),
        ),
        ("fetch-api-call", Regex::new(r#"fetchApi\s*\(\s*['"]([^'"]+)['"]"#).expect("static pattern")),
        ("site-concatenation", Regex::new(r#"this\.site\s*\+\s*['"]([^'"]+)['"]"#).expect("static pattern")),
        ("absolute-url", Regex::new(r#"https?://[^'"]+"#).expect("static pattern")),
    ];

    /// Recognised `join(...)` spellings and the separator each implies.
    static ref JOIN_FORMS: [(Regex, &'static str); 3] = [
        (Regex::new(r#"join\(\s*['"]\\n\\n['"]\s*\)"#).expect("static pattern"), "\n\n"),
        (Regex::new(r#"join\(\s*['"]\\n['"]\s*\)"#).expect("static pattern"), "\n"),
        (Regex::new(r#"join\(\s*['"] +['"]\s*\)"#).expect("static pattern"), " "),
    ];
}

/// Where an analysis looks, and how it reads selectors there.
pub trait ScopeProvider {
    /// Short name used in log output.
    fn label(&self) -> &'static str;

    fn metadata(&self, logger: &dyn AnalysisLogger) -> PluginMetadata;

    /// Text holding the listing logic; `None` when the plugin has none.
    fn search_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str>;

    /// Text holding the details logic; `None` when no details function exists.
    fn details_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str>;

    /// Pattern used when [`ScopeProvider::details_scope`] finds nothing.
    fn details_default(&self) -> DetailsPattern {
        DetailsPattern::generic()
    }

    /// Text holding the chapter content logic; `None` when no content function exists.
    fn content_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str>;

    /// Recover the selector for `field` from `scope`.
    fn selector(&self, field: &SelectorField, scope: &str, logger: &dyn AnalysisLogger) -> Attempt<String>;
}

/// Derives an [`AnalyzedPlugin`] from plugin source text.
pub struct PluginAnalyzer {
    kind: AnalyzerKind,
    logger: Arc<dyn AnalysisLogger>,
}

impl PluginAnalyzer {
    pub fn new(kind: AnalyzerKind) -> Self {
        Self::with_logger(kind, Arc::new(TracingAnalysisLogger::new("analyzer")))
    }

    pub fn with_logger(kind: AnalyzerKind, logger: Arc<dyn AnalysisLogger>) -> Self {
        Self { kind, logger }
    }

    pub fn kind(&self) -> AnalyzerKind {
        self.kind
    }

    pub fn analyze(&self, source: &str) -> AnalyzedPlugin {
        match self.kind {
            AnalyzerKind::Regex => self.analyze_with(&RegexScope::new(source)),
            AnalyzerKind::Structural => {
                let parsed = self.parse(source);
                self.analyze_with(&StructuralScope::new(&parsed))
            }
            AnalyzerKind::Auto => {
                let parsed = self.parse(source);
                if parsed.metadata.is_some() {
                    self.analyze_with(&StructuralScope::new(&parsed))
                } else {
                    info!("No metadata object found, falling back to regex analysis");
                    self.analyze_with(&RegexScope::new(source))
                }
            }
        }
    }

    fn parse(&self, source: &str) -> ParsedPlugin {
        JsParser::with_logger(self.logger.clone()).parse(source)
    }

    /// Run the analysis against an explicit scope provider.
    pub fn analyze_with<S: ScopeProvider + ?Sized>(&self, scope: &S) -> AnalyzedPlugin {
        let logger = self.logger.as_ref();

        let metadata = scope.metadata(logger);
        let search_pattern = self.search_pattern(scope);
        let details_pattern = self.details_pattern(scope);
        let content_pattern = self.content_pattern(scope);

        info!(
            scope = scope.label(),
            name = %metadata.name,
            version = %metadata.version,
            lang = %metadata.lang,
            base_url = %metadata.base_url,
            has_search = search_pattern.is_some(),
            "Plugin analysis complete"
        );
        if search_pattern.is_none() {
            warn!(name = %metadata.name, "No search pattern detected, plugin cannot browse or search");
        }

        AnalyzedPlugin {
            metadata,
            search_pattern,
            details_pattern: Some(details_pattern),
            content_pattern: Some(content_pattern),
        }
    }

    fn search_pattern<S: ScopeProvider + ?Sized>(&self, scope: &S) -> Option<SearchPattern> {
        let logger = self.logger.as_ref();
        let text = scope.search_scope(logger)?;

        let url_template = Chain::from_regexes(
            "search.url",
            URL_TEMPLATE_FORMS.iter().map(|(label, re)| (*label, re)),
            |url| url.chars().count() > 5,
        )
        .resolve_or(text, logger, defaults::SEARCH_URL_TEMPLATE.to_string());

        Some(SearchPattern {
            url_template,
            selector: self.selector_or_blank(scope, &SEARCH_ITEM, text),
            title_selector: self.selector_or_blank(scope, &SEARCH_TITLE, text),
            link_selector: self.selector_or_blank(scope, &SEARCH_LINK, text),
            cover_selector: self.selector(scope, &SEARCH_COVER, text),
        })
    }

    fn details_pattern<S: ScopeProvider + ?Sized>(&self, scope: &S) -> DetailsPattern {
        let logger = self.logger.as_ref();
        let Some(text) = scope.details_scope(logger) else {
            let fallback = scope.details_default();
            let value = if fallback.has_detail_selectors() {
                "generic details pattern"
            } else {
                "empty details pattern"
            };
            logger.record(AnalysisEvent::DefaultApplied {
                field: "details",
                value: value.to_string(),
            });
            return fallback;
        };

        DetailsPattern {
            author_selector: Some(self.selector_or_blank(scope, &AUTHOR, text)),
            description_selector: Some(self.selector_or_blank(scope, &DESCRIPTION, text)),
            genres_selector: Some(self.selector_or_blank(scope, &GENRES, text)),
            status_selector: Some(self.selector_or_blank(scope, &STATUS, text)),
            cover_selector: self.selector(scope, &DETAILS_COVER, text),
            chapters_selector: Some(self.selector_or_blank(scope, &CHAPTERS, text)),
            chapter_name_selector: None,
            chapter_url_selector: None,
        }
    }

    fn content_pattern<S: ScopeProvider + ?Sized>(&self, scope: &S) -> ContentPattern {
        let logger = self.logger.as_ref();
        let Some(text) = scope.content_scope(logger) else {
            logger.record(AnalysisEvent::DefaultApplied {
                field: "content",
                value: defaults::CONTENT_GENERIC.to_string(),
            });
            return ContentPattern::generic();
        };

        ContentPattern {
            selector: self.selector_or_blank(scope, &CONTENT, text),
            text_join: detect_text_join(text).to_string(),
        }
    }

    /// Like [`PluginAnalyzer::selector`], but blank for fields without a default.
    fn selector_or_blank<S: ScopeProvider + ?Sized>(&self, scope: &S, field: &SelectorField, text: &str) -> String {
        self.selector(scope, field, text)
            .unwrap_or_else(|| field.default.unwrap_or_default().to_string())
    }

    /// Selector recovered for `field`, else the field's default.
    fn selector<S: ScopeProvider + ?Sized>(&self, scope: &S, field: &SelectorField, text: &str) -> Option<String> {
        let logger = self.logger.as_ref();
        match scope.selector(field, text, logger) {
            Ok(selector) => Some(selector),
            Err(_) => field.default.map(|default| {
                logger.record(AnalysisEvent::DefaultApplied {
                    field: field.name,
                    value: default.to_string(),
                });
                default.to_string()
            }),
        }
    }
}

impl Default for PluginAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerKind::default())
    }
}

/// Separator implied by the first recognised `join(...)` call, else `"\n\n"`.
pub fn detect_text_join(body: &str) -> &'static str {
    if !body.contains("join") {
        return defaults::TEXT_JOIN;
    }
    JOIN_FORMS
        .iter()
        .find(|(re, _)| re.is_match(body))
        .map(|(_, separator)| *separator)
        .unwrap_or(defaults::TEXT_JOIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::logger::RecordingAnalysisLogger;

    fn analyzer(kind: AnalyzerKind) -> (PluginAnalyzer, Arc<RecordingAnalysisLogger>) {
        let logger = Arc::new(RecordingAnalysisLogger::new());
        (PluginAnalyzer::with_logger(kind, logger.clone()), logger)
    }

    const FULL_PLUGIN: &str = r#"
        class FooPlugin {
            constructor() { this.icon = "src/foo/icon.png"; }
            async searchNovels(searchTerm, page) {
                const url = this.site + "/search?keyword=" + searchTerm + "&page=" + page;
                const body = await fetchApi(url).then(r => r.text());
                const $ = load(body);
                return $('.novel-list .novel-item').map((i, el) => ({
                    name: $(el).find('.novel-title').text(),
                    cover: $(el).find('img.cover').attr('src'),
                })).get();
            }
            async parseNovel(novelPath) {
                const $ = load(await fetchApi(this.site + novelPath).then(r => r.text()));
                const author = $('.info .author-name').text();
                const summary = $('div.summary-content').text();
                const genres = $('.genre-list a').map((i, e) => $(e).text()).get();
                const status = $('.novel-status').text();
                const chapters = $('ul.chapter-list li').map(() => 1).get();
                return { author, summary, genres, status, chapters };
            }
            async parseChapter(chapterPath) {
                const $ = load(await fetchApi(this.site + chapterPath).then(r => r.text()));
                return $('#chapter-text p').map((i, p) => $(p).text()).get().join('\n');
            }
        }
        module.exports = new FooPlugin({ id: "foo.site", name: "Foo Site", version: "2.1.0", site: "https://foo.example", lang: "en" });
    "#;

    #[test]
    fn test_detect_text_join() {
        assert_eq!(detect_text_join(r"return parts.join('\n');"), "\n");
        assert_eq!(detect_text_join(r#"return parts.join("\n\n");"#), "\n\n");
        assert_eq!(detect_text_join("return parts.join(' ');"), " ");
        assert_eq!(detect_text_join("return parts.join(sep);"), "\n\n");
        assert_eq!(detect_text_join("return text;"), "\n\n");
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        assert!(AUTHOR.matches_keyword(".Book-Writer"));
        assert!(!AUTHOR.matches_keyword(".title"));
    }

    #[test]
    fn test_analyzer_kind_names() {
        assert_eq!(AnalyzerKind::Structural.to_string(), "structural");
        assert_eq!(
            serde_json::from_str::<AnalyzerKind>("\"regex\"").unwrap(),
            AnalyzerKind::Regex
        );
        assert_eq!(AnalyzerKind::default(), AnalyzerKind::Auto);
    }

    #[test]
    fn test_structural_analysis_of_full_plugin() {
        let (analyzer, logger) = analyzer(AnalyzerKind::Structural);
        let analyzed = analyzer.analyze(FULL_PLUGIN);

        assert_eq!(analyzed.metadata.name, "Foo Site");
        assert_eq!(analyzed.metadata.version, "2.1.0");
        assert_eq!(analyzed.metadata.base_url, "https://foo.example");
        assert_eq!(analyzed.metadata.icon, "src/foo/icon.png");
        assert_eq!(analyzed.metadata.id.as_deref(), Some("foo.site"));

        let search = analyzed.search_pattern.expect("search pattern");
        assert_eq!(search.url_template, "/search?keyword=");
        assert_eq!(search.selector, ".novel-list .novel-item");
        assert_eq!(search.title_selector, ".novel-title");
        assert_eq!(search.link_selector, defaults::SEARCH_LINK);
        assert_eq!(search.cover_selector.as_deref(), Some("img.cover"));

        let details = analyzed.details_pattern.expect("details pattern");
        assert_eq!(details.author_selector.as_deref(), Some(".info .author-name"));
        assert_eq!(details.description_selector.as_deref(), Some("div.summary-content"));
        assert_eq!(details.genres_selector.as_deref(), Some(".genre-list a"));
        assert_eq!(details.status_selector.as_deref(), Some(".novel-status"));
        assert_eq!(details.chapters_selector.as_deref(), Some("ul.chapter-list li"));

        let content = analyzed.content_pattern.expect("content pattern");
        assert_eq!(content.selector, "#chapter-text p");
        assert_eq!(content.text_join, "\n");

        assert!(logger.defaulted("search.link"));
    }

    #[test]
    fn test_auto_prefers_structural_when_metadata_found() {
        let (analyzer, _) = analyzer(AnalyzerKind::Auto);
        assert_eq!(analyzer.analyze(FULL_PLUGIN).metadata.id.as_deref(), Some("foo.site"));
    }

    #[test]
    fn test_auto_falls_back_to_regex() {
        let (analyzer, _) = analyzer(AnalyzerKind::Auto);
        let analyzed = analyzer.analyze("var s = {name:'Loose Name', version:'3.0'};");
        assert_eq!(analyzed.metadata.name, "Loose Name");
        assert_eq!(analyzed.metadata.version, "3.0");
        assert!(analyzed.metadata.id.is_none());
    }

    #[test]
    fn test_analysis_is_idempotent() {
        for kind in [AnalyzerKind::Regex, AnalyzerKind::Structural, AnalyzerKind::Auto] {
            let (analyzer, _) = analyzer(kind);
            assert_eq!(analyzer.analyze(FULL_PLUGIN), analyzer.analyze(FULL_PLUGIN));
        }
    }
}
