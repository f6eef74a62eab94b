//! Whole-source scope
//!
//! Reads metadata and selectors straight out of the raw plugin text with
//! anchored patterns. No structural parse is involved, which keeps it usable
//! on minified bundles where function boundaries are hard to recover.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use super::{ScopeProvider, SelectorField, ALL_FIELDS};
use crate::plugin::extract::{any, capture, large_regex, Attempt, Chain, ParseMiss, Summarize};
use crate::plugin::js_scanner::window;
use crate::plugin::logger::{AnalysisEvent, AnalysisLogger};
use crate::plugin::types::{defaults, DetailsPattern, PluginMetadata};

/// How far around a minified metadata cluster to look for `icon` and `lang`.
const CLUSTER_CONTEXT: usize = 500;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern")
}

lazy_static! {
    /// `id`, display name, version and site packed into one object.
    static ref CLUSTERS: [(&'static str, Regex); 3] = [
        (
            "id-name-version-site",
            large_regex(r#"\{[^}]{0,200}id\s*:\s*['"]([^'"]+)['"][^}]{0,100}name\s*:\s*['"]([^'"]+)['"][^}]{0,100}version\s*:\s*['"]([^'"]+)['"][^}]{0,100}(?:site|baseUrl)\s*:\s*['"]([^'"]+)['"]"#),
        ),
        (
            "id-source-name-version-source-site",
            large_regex(r#"\{[^}]{0,200}id\s*:\s*['"]([^'"]+)['"][^}]{0,100}sourceName\s*:\s*['"]([^'"]+)['"][^}]{0,100}version\s*:\s*['"]([^'"]+)['"][^}]{0,100}sourceSite\s*:\s*['"]([^'"]+)['"]"#),
        ),
        (
            "id-name",
            large_regex(r#"\{[^}]{0,100}id\s*:\s*['"]([^'"]+)['"][^}]{0,50}name\s*:\s*['"]([^'"]+)['"]"#),
        ),
    ];
    static ref CLUSTER_ICON: Regex = re(r#"icon\s*:\s*['"]([^'"]+)['"]"#);
    static ref CLUSTER_LANG: Regex = re(r#"lang\s*:\s*['"]([a-z]{2,5})['"]"#);

    static ref NAME_FORMS: Vec<(&'static str, Regex)> = vec![
        ("object-property", re(r#"name\s*:\s*['"]([^'"]+)['"]"#)),
        ("quoted-key", re(r#"['"]name['"]\s*:\s*['"]([^'"]+)['"]"#)),
        ("this-assignment", re(r#"this\.name\s*=\s*['"]([^'"]+)['"]"#)),
        ("getter", re(r#"get\s+name\s*\(\s*\)\s*\{\s*return\s*['"]([^'"]+)['"]"#)),
        ("class-body", re(r#"(?s)class\s+\w+.*?name\s*=\s*['"]([^'"]+)['"]"#)),
        ("metadata-object", re(r#"(?s)metadata\s*:\s*\{[^}]*name\s*:\s*['"]([^'"]+)['"]"#)),
        ("id-then-name", re(r#"id\s*:\s*['"][^'"]+['"],\s*name\s*:\s*['"]([^'"]+)['"]"#)),
        ("any-name", re(r#"name\s*:\s*['"]([^'"]{3,})['"]"#)),
    ];
    static ref VERSION_FORMS: Vec<(&'static str, Regex)> = vec![
        ("object-property", re(r#"version\s*:\s*['"]([^'"]+)['"]"#)),
        ("quoted-key", re(r#"['"]version['"]\s*:\s*['"]([^'"]+)['"]"#)),
        ("this-assignment", re(r#"this\.version\s*=\s*['"]([^'"]+)['"]"#)),
        ("getter", re(r#"get\s+version\s*\(\s*\)\s*\{\s*return\s*['"]([^'"]+)['"]"#)),
        ("name-then-version", re(r#"name\s*:\s*['"][^'"]+['"],\s*version\s*:\s*['"]([^'"]+)['"]"#)),
    ];
    static ref LANG_FORMS: Vec<(&'static str, Regex)> = vec![
        ("object-property", re(r#"lang\s*:\s*['"]([^'"]+)['"]"#)),
        ("quoted-key", re(r#"['"]lang['"]\s*:\s*['"]([^'"]+)['"]"#)),
        ("language-property", re(r#"language\s*:\s*['"]([^'"]+)['"]"#)),
        ("this-assignment", re(r#"this\.lang\s*=\s*['"]([^'"]+)['"]"#)),
        ("getter", re(r#"get\s+lang\s*\(\s*\)\s*\{\s*return\s*['"]([^'"]+)['"]"#)),
    ];
    static ref BASE_URL_FORMS: Vec<(&'static str, Regex)> = vec![
        ("base-url-property", re(r#"baseUrl\s*:\s*['"]([^'"]+)['"]"#)),
        ("site-property", re(r#"site\s*:\s*['"]([^'"]+)['"]"#)),
        ("quoted-base-url", re(r#"['"]baseUrl['"]\s*:\s*['"]([^'"]+)['"]"#)),
        ("quoted-site", re(r#"['"]site['"]\s*:\s*['"]([^'"]+)['"]"#)),
        ("this-site", re(r#"this\.site\s*=\s*['"]([^'"]+)['"]"#)),
        ("this-base-url", re(r#"this\.baseUrl\s*=\s*['"]([^'"]+)['"]"#)),
        ("site-getter", re(r#"get\s+site\s*\(\s*\)\s*\{\s*return\s*['"]([^'"]+)['"]"#)),
        ("base-url-getter", re(r#"get\s+baseUrl\s*\(\s*\)\s*\{\s*return\s*['"]([^'"]+)['"]"#)),
        ("absolute-url", re(r#"['"]?(https?://[^'"]+)['"]?"#)),
    ];
    static ref ICON_FORMS: Vec<(&'static str, Regex)> = vec![
        ("object-property", re(r#"icon\s*:\s*['"]([^'"]+)['"]"#)),
        ("quoted-key", re(r#"['"]icon['"]\s*:\s*['"]([^'"]+)['"]"#)),
        ("this-assignment", re(r#"this\.icon\s*=\s*['"]([^'"]+)['"]"#)),
        ("getter", re(r#"get\s+icon\s*\(\s*\)\s*\{\s*return\s*['"]([^'"]+)['"]"#)),
    ];
    static ref ID_FORMS: Vec<(&'static str, Regex)> = vec![
        ("object-property", re(r#"id\s*:\s*['"]([^'"]+)['"]"#)),
        ("quoted-key", re(r#"['"]id['"]\s*:\s*['"]([^'"]+)['"]"#)),
        ("this-assignment", re(r#"this\.id\s*=\s*['"]([^'"]+)['"]"#)),
    ];

    /// Any of these means the plugin has a listing entry point.
    static ref LISTING_PRESENCE: [Regex; 4] = [
        re(r"searchNovels[^{]*\{"),
        re(r"popularNovels[^{]*\{"),
        re(r"getMangaList[^{]*\{"),
        re(r"(?:async\s+)?search\s*\([^)]*\)\s*\{"),
    ];
    static ref DETAILS_BODY: [(&'static str, Regex); 2] = [
        (
            "details-method",
            re(r"(?:async\s+)?(?:getDetails|fetchDetails|getMangaDetails|getNovelDetails)\s*\([^)]*\)\s*\{([^}]+(?:\{[^}]*\}[^}]*)*)\}"),
        ),
        (
            "details-property",
            re(r"(?:getDetails|fetchDetails):\s*(?:async\s+)?function\s*\([^)]*\)\s*\{([^}]+(?:\{[^}]*\}[^}]*)*)\}"),
        ),
    ];
    static ref CONTENT_BODY: [(&'static str, Regex); 2] = [
        (
            "content-method",
            re(r"(?:async\s+)?(?:getContent|fetchContent|getChapter|getPageList)\s*\([^)]*\)\s*\{([^}]+(?:\{[^}]*\}[^}]*)*)\}"),
        ),
        (
            "content-property",
            re(r"(?:getContent|fetchContent):\s*(?:async\s+)?function\s*\([^)]*\)\s*\{([^}]+(?:\{[^}]*\}[^}]*)*)\}"),
        ),
    ];

    /// Anchored selector patterns per field name, in resolution order.
    static ref ANCHORED: HashMap<&'static str, Vec<(&'static str, Regex)>> = ALL_FIELDS
        .iter()
        .map(|field| (field.name, anchored_patterns(field)))
        .collect();
}

fn anchored_patterns(field: &SelectorField) -> Vec<(&'static str, Regex)> {
    let keywords = field.keywords.join("|");
    let explicit = field.patterns.iter().map(|(label, pattern)| (*label, re(pattern)));
    let calls = field.call_forms.iter().map(|form| {
        let pattern = format!(
            r#"(?i){}\(['"]([^'"]*(?:{})[^'"]*)['"]\)"#,
            form.prefix(),
            keywords
        );
        (form.label(), re(&pattern))
    });
    explicit.chain(calls).collect()
}

/// Metadata fields taken from one minified object.
struct ClusterHit {
    id: String,
    name: String,
    version: Option<String>,
    site: Option<String>,
    start: usize,
    end: usize,
}

impl Summarize for ClusterHit {
    fn summarize(&self) -> String {
        format!("id={} name={} at {}..{}", self.id, self.name, self.start, self.end)
    }
}

fn cluster_step(re: &Regex, code: &str) -> Attempt<ClusterHit> {
    let caps = re.captures(code).ok_or(ParseMiss::NoMatch)?;
    let whole = caps.get(0).ok_or(ParseMiss::NoMatch)?;
    let group = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
    let name = group(2).unwrap_or_default();
    if name.trim().is_empty() || name.chars().count() <= 2 {
        return Err(ParseMiss::Rejected(name));
    }
    Ok(ClusterHit {
        id: group(1).unwrap_or_default(),
        name,
        version: group(3),
        site: group(4),
        start: whole.start(),
        end: whole.end(),
    })
}

fn long_name(name: &str) -> bool {
    !name.trim().is_empty() && name.chars().count() > 2
}

fn starts_with_http(url: &str) -> bool {
    url.starts_with("http")
}

/// Scope over the complete raw source.
pub struct RegexScope<'a> {
    source: &'a str,
}

impl<'a> RegexScope<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    fn minified_metadata(&self, logger: &dyn AnalysisLogger) -> Option<PluginMetadata> {
        let chain = CLUSTERS
            .iter()
            .fold(Chain::new("metadata.cluster"), |chain, (label, re)| {
                chain.step(*label, move |code| cluster_step(re, code))
            });
        let hit = chain.resolve(self.source, logger).ok()?;

        let context = window(
            self.source,
            hit.start.saturating_sub(CLUSTER_CONTEXT),
            hit.end + CLUSTER_CONTEXT,
        );
        Some(PluginMetadata {
            name: hit.name,
            version: hit.version.unwrap_or_else(|| defaults::VERSION.to_string()),
            lang: capture(&CLUSTER_LANG, context).unwrap_or_else(|_| defaults::LANG.to_string()),
            base_url: hit.site.unwrap_or_default(),
            icon: capture(&CLUSTER_ICON, context).unwrap_or_default(),
            id: None,
        })
    }

    fn body_of(&self, field: &'static str, forms: &'a [(&'static str, Regex)], logger: &dyn AnalysisLogger) -> Option<&'a str> {
        let source = self.source;
        forms.iter().find_map(|(label, re)| {
            let body = re.captures(source)?.get(1)?.as_str();
            logger.record(AnalysisEvent::CandidateAccepted {
                field,
                detail: (*label).to_string(),
            });
            Some(body)
        })
    }
}

fn chain_of<'r>(field: &'static str, forms: &'r [(&'static str, Regex)], accept: fn(&str) -> bool) -> Chain<'r, String> {
    Chain::from_regexes(field, forms.iter().map(|(label, re)| (*label, re)), accept)
}

impl ScopeProvider for RegexScope<'_> {
    fn label(&self) -> &'static str {
        "regex"
    }

    fn metadata(&self, logger: &dyn AnalysisLogger) -> PluginMetadata {
        if let Some(metadata) = self.minified_metadata(logger) {
            return metadata;
        }

        let source = self.source;
        let name = chain_of("metadata.name", &NAME_FORMS, long_name).resolve(source, logger).ok();
        let version = chain_of("metadata.version", &VERSION_FORMS, PluginMetadata::is_valid_version)
            .resolve_or(source, logger, defaults::VERSION.to_string());
        let lang = chain_of("metadata.lang", &LANG_FORMS, PluginMetadata::is_valid_lang)
            .resolve_or(source, logger, defaults::LANG.to_string());
        let base_url = chain_of("metadata.base_url", &BASE_URL_FORMS, starts_with_http)
            .resolve_or(source, logger, String::new());
        let icon = chain_of("metadata.icon", &ICON_FORMS, any).resolve_or(source, logger, String::new());
        let id = chain_of("metadata.id", &ID_FORMS, any).resolve(source, logger).ok();

        let name = match (name, id.as_deref()) {
            (Some(name), _) => name,
            (None, Some(id)) if !id.trim().is_empty() => {
                let generated = PluginMetadata::name_from_id(id);
                logger.record(AnalysisEvent::CandidateAccepted {
                    field: "metadata.name",
                    detail: format!("generated from id '{}'", id),
                });
                generated
            }
            _ => {
                logger.record(AnalysisEvent::DefaultApplied {
                    field: "metadata.name",
                    value: defaults::NAME.to_string(),
                });
                defaults::NAME.to_string()
            }
        };

        PluginMetadata {
            name,
            version,
            lang,
            base_url,
            icon,
            id: None,
        }
    }

    fn search_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str> {
        if LISTING_PRESENCE.iter().any(|re| re.is_match(self.source)) {
            logger.record(AnalysisEvent::CandidateAccepted {
                field: "search",
                detail: "listing function present".to_string(),
            });
            Some(self.source)
        } else {
            logger.record(AnalysisEvent::CandidateRejected {
                field: "search",
                reason: "no listing function".to_string(),
            });
            None
        }
    }

    fn details_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str> {
        self.body_of("details", &DETAILS_BODY[..], logger)
    }

    /// Without a details function nothing is scraped from the detail page.
    fn details_default(&self) -> DetailsPattern {
        DetailsPattern::default()
    }

    fn content_scope(&self, logger: &dyn AnalysisLogger) -> Option<&str> {
        self.body_of("content", &CONTENT_BODY[..], logger)
    }

    fn selector(&self, field: &SelectorField, scope: &str, logger: &dyn AnalysisLogger) -> Attempt<String> {
        let forms = ANCHORED.get(field.name).map(Vec::as_slice).unwrap_or(&[]);
        chain_of(field.name, forms, field.accept).resolve(scope, logger)
    }
}
