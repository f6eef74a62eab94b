//! Function-body scope
//!
//! Metadata comes from the parsed object literal merged over class
//! properties. Listing, details and content logic is looked up by function
//! name, and only the body of the first candidate present is searched.

use lazy_static::lazy_static;
use regex::Regex;

use super::{ScopeProvider, SelectorField};
use crate::plugin::extract::{Attempt, Chain, ParseMiss};
use crate::plugin::js_parser::ParsedPlugin;
use crate::plugin::js_value::{JsValue, PropertyMap};
use crate::plugin::logger::{AnalysisEvent, AnalysisLogger};
use crate::plugin::types::{defaults, PluginMetadata};

pub const SEARCH_CANDIDATES: &[&str] = &[
    "searchNovels",
    "search",
    "popularNovels",
    "latestNovels",
    "getMangaList",
    "getPopular",
    "getLatest",
    "browse",
];

pub const DETAILS_CANDIDATES: &[&str] = &[
    "parseNovel",
    "parseNovelAndChapters",
    "getNovelDetails",
    "getMangaDetails",
    "getDetails",
    "fetchDetails",
    "novelDetails",
];

pub const CONTENT_CANDIDATES: &[&str] = &[
    "parseChapter",
    "getChapterContent",
    "getContent",
    "fetchContent",
    "getChapter",
    "getPageList",
];

lazy_static! {
    /// Selector-taking calls, without any keyword anchoring.
    static ref GENERIC_CALLS: [(&'static str, Regex); 4] = [
        ("dollar-call", Regex::new(r#"\$\(\s*['"]([^'"]+)['"]"#).expect("static pattern")),
        (
            "query-selector",
            Regex::new(r#"\.querySelector(?:All)?\(\s*['"]([^'"]+)['"]"#).expect("static pattern"),
        ),
        ("select-call", Regex::new(r#"\.select\(\s*['"]([^'"]+)['"]"#).expect("static pattern")),
        ("find-call", Regex::new(r#"\.find\(\s*['"]([^'"]+)['"]"#).expect("static pattern")),
    ];
}

/// Scope over a [`ParsedPlugin`].
pub struct StructuralScope<'a> {
    parsed: &'a ParsedPlugin,
}

impl<'a> StructuralScope<'a> {
    pub fn new(parsed: &'a ParsedPlugin) -> Self {
        Self { parsed }
    }

    fn body_of(
        &self,
        field: &'static str,
        candidates: &[&str],
        logger: &dyn AnalysisLogger,
    ) -> Option<&'a str> {
        match self.parsed.first_function(candidates) {
            Some(function) => {
                logger.record(AnalysisEvent::CandidateAccepted {
                    field,
                    detail: format!("function {}", function.name),
                });
                Some(function.body.as_str())
            }
            None => {
                logger.record(AnalysisEvent::CandidateRejected {
                    field,
                    reason: format!("none of {} candidate functions defined", candidates.len()),
                });
                None
            }
        }
    }
}

/// Ordered lookup of a string field across several property names.
fn property_chain<'p>(
    field: &'static str,
    properties: &'p PropertyMap,
    keys: &[&'static str],
    accept: fn(&str) -> bool,
) -> Chain<'p, String> {
    keys.iter().fold(Chain::new(field), |chain, &key| {
        chain.step(key, move |_| {
            let value = properties.get(key).map(JsValue::text).ok_or(ParseMiss::NoMatch)?;
            if !value.trim().is_empty() && accept(&value) {
                Ok(value)
            } else {
                Err(ParseMiss::Rejected(value))
            }
        })
    })
}

fn any_text(_: &str) -> bool {
    true
}

fn starts_with_http(url: &str) -> bool {
    url.starts_with("http")
}

impl ScopeProvider for StructuralScope<'_> {
    fn label(&self) -> &'static str {
        "structural"
    }

    fn metadata(&self, logger: &dyn AnalysisLogger) -> PluginMetadata {
        let properties = self.parsed.merged_properties();

        let id = property_chain("metadata.id", &properties, &["id"], any_text)
            .resolve("", logger)
            .ok();

        let name = property_chain("metadata.name", &properties, &["name", "sourceName"], any_text)
            .resolve("", logger)
            .ok()
            .or_else(|| id.as_deref().map(PluginMetadata::name_from_id))
            .unwrap_or_else(|| {
                logger.record(AnalysisEvent::DefaultApplied {
                    field: "metadata.name",
                    value: defaults::NAME.to_string(),
                });
                defaults::NAME.to_string()
            });

        let version = property_chain(
            "metadata.version",
            &properties,
            &["version"],
            PluginMetadata::is_valid_version,
        )
        .resolve_or("", logger, defaults::VERSION.to_string());

        let lang = property_chain(
            "metadata.lang",
            &properties,
            &["lang", "language"],
            PluginMetadata::is_valid_lang,
        )
        .resolve_or("", logger, defaults::LANG.to_string());

        let base_url = property_chain(
            "metadata.base_url",
            &properties,
            &["site", "sourceSite", "baseUrl", "url"],
            starts_with_http,
        )
        .resolve_or("", logger, String::new());

        let icon = property_chain("metadata.icon", &properties, &["icon"], any_text)
            .resolve_or("", logger, String::new());

        PluginMetadata {
            name,
            version,
            lang,
            base_url,
            icon,
            id,
        }
    }

    fn search_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str> {
        self.body_of("search", SEARCH_CANDIDATES, logger)
    }

    fn details_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str> {
        self.body_of("details", DETAILS_CANDIDATES, logger)
    }

    fn content_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str> {
        self.body_of("content", CONTENT_CANDIDATES, logger)
    }

    /// First selector, by call pattern then source position, that mentions one
    /// of the field's keywords.
    fn selector(&self, field: &SelectorField, scope: &str, logger: &dyn AnalysisLogger) -> Attempt<String> {
        GENERIC_CALLS
            .iter()
            .fold(Chain::new(field.name), |chain, (label, re)| {
                chain.step(*label, move |body| {
                    for caps in re.captures_iter(body) {
                        let Some(candidate) = caps.get(1).map(|m| m.as_str()) else {
                            continue;
                        };
                        if field.matches_keyword(candidate) && (field.accept)(candidate) {
                            return Ok(candidate.to_string());
                        }
                    }
                    Err(ParseMiss::NoMatch)
                })
            })
            .resolve(scope, logger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::analyzer::{AnalyzerKind, PluginAnalyzer, CHAPTERS, SEARCH_ITEM};
    use crate::plugin::js_parser::JsParser;
    use crate::plugin::logger::RecordingAnalysisLogger;
    use crate::plugin::types::{AnalyzedPlugin, DetailsPattern};
    use std::sync::Arc;

    fn analyze(source: &str) -> (AnalyzedPlugin, Arc<RecordingAnalysisLogger>) {
        let logger = Arc::new(RecordingAnalysisLogger::new());
        let analyzer = PluginAnalyzer::with_logger(AnalyzerKind::Structural, logger.clone());
        (analyzer.analyze(source), logger)
    }

    #[test]
    fn test_constructor_metadata() {
        let (analyzed, _) = analyze(
            r#"new Plugin({id:"foo",name:"Foo Site",version:"2.1.0",site:"https://foo.example"})"#,
        );
        let metadata = analyzed.metadata;
        assert_eq!(metadata.name, "Foo Site");
        assert_eq!(metadata.version, "2.1.0");
        assert_eq!(metadata.base_url, "https://foo.example");
        assert_eq!(metadata.lang, "en");
        assert_eq!(metadata.id.as_deref(), Some("foo"));
    }

    #[test]
    fn test_metadata_from_class_and_id() {
        let source = r#"
            class WuxiaSource {
                constructor() {
                    this.id = "wuxia.world";
                    this.sourceSite = "https://wuxia.example";
                    this.version = "v2";
                    this.lang = "english";
                }
            }
        "#;
        let (analyzed, logger) = analyze(source);
        let metadata = analyzed.metadata;
        assert_eq!(metadata.name, "Wuxia World");
        assert_eq!(metadata.base_url, "https://wuxia.example");
        assert_eq!(metadata.version, defaults::VERSION);
        assert_eq!(metadata.lang, defaults::LANG);
        assert!(logger.defaulted("metadata.version"));
        assert_eq!(logger.matched_step("metadata.base_url"), Some("sourceSite"));
    }

    #[test]
    fn test_wrapped_property_values() {
        let source = r#"new Src({ id: "x", name: { value: "Wrapped Name" }, lang: "pt-BR" })"#;
        let (analyzed, _) = analyze(source);
        assert_eq!(analyzed.metadata.name, "Wrapped Name");
        assert_eq!(analyzed.metadata.lang, "pt-BR");
    }

    #[test]
    fn test_unknown_name() {
        let (analyzed, _) = analyze("const x = 1;");
        assert_eq!(analyzed.metadata.name, defaults::NAME);
        assert!(analyzed.metadata.id.is_none());
    }

    #[test]
    fn test_search_absent_without_candidate_function() {
        let (analyzed, logger) = analyze("function parseNovel(path) { return path; }");
        assert!(analyzed.search_pattern.is_none());
        assert!(logger.events().iter().any(|e| matches!(
            e,
            AnalysisEvent::CandidateRejected { field: "search", .. }
        )));
    }

    #[test]
    fn test_search_candidate_order() {
        let source = r#"
            function browse(page) { return $('.browse-item').toArray(); }
            function popularNovels(page) { return $('.popular-novel').toArray(); }
        "#;
        let (analyzed, _) = analyze(source);
        let search = analyzed.search_pattern.expect("search pattern");
        assert_eq!(search.selector, ".popular-novel");
    }

    #[test]
    fn test_selectors_scoped_to_function_body() {
        // the author selector lives outside every details candidate
        let source = r#"
            function helper() { return $('.author-outside').text(); }
            function parseNovel(path) { return $('.novel-status').text(); }
        "#;
        let (analyzed, _) = analyze(source);
        let details = analyzed.details_pattern.expect("details pattern");
        assert_eq!(details.author_selector.as_deref(), Some(defaults::AUTHOR));
        assert_eq!(details.status_selector.as_deref(), Some(".novel-status"));
    }

    #[test]
    fn test_details_and_content_defaults() {
        let (analyzed, logger) = analyze("function searchNovels() { return []; }");
        assert_eq!(analyzed.details_pattern, Some(DetailsPattern::generic()));
        let content = analyzed.content_pattern.expect("content pattern");
        assert_eq!(content.selector, defaults::CONTENT_GENERIC);
        assert!(logger.defaulted("details"));
        assert!(logger.defaulted("content"));
    }

    #[test]
    fn test_generic_call_order() {
        let parsed = JsParser::new().parse("");
        let scope = StructuralScope::new(&parsed);
        let logger = RecordingAnalysisLogger::new();
        let body = "el.find('.chapter-name'); doc.querySelectorAll('li.Chapter'); $('.episode-list')";

        // pattern order beats source order
        assert_eq!(scope.selector(&CHAPTERS, body, &logger), Ok(".episode-list".to_string()));
        assert_eq!(logger.matched_step("details.chapters"), Some("dollar-call"));
    }

    #[test]
    fn test_keyword_filter_and_acceptance() {
        let parsed = ParsedPlugin::default();
        let scope = StructuralScope::new(&parsed);
        let logger = RecordingAnalysisLogger::new();

        let body = "$('article'); $('.sidebar'); $('.novel-card')";
        assert_eq!(scope.selector(&SEARCH_ITEM, body, &logger), Ok(".novel-card".to_string()));
        assert!(scope.selector(&SEARCH_ITEM, "$('article')", &logger).is_err());
    }

    #[test]
    fn test_content_join_from_body() {
        let source = r#"
            async function parseChapter(path) {
                const $ = load(await fetchApi(path));
                return $('.reading-content p').map((i, el) => $(el).text()).get().join(" ");
            }
        "#;
        let (analyzed, _) = analyze(source);
        let content = analyzed.content_pattern.expect("content pattern");
        assert_eq!(content.selector, ".reading-content p");
        assert_eq!(content.text_join, " ");
    }
}
