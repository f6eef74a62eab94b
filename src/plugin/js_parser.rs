//! Shallow structural parser for plugin source
//!
//! Builds a [`ParsedPlugin`] out of three independent passes over the
//! comment-stripped source: one metadata object literal, every recognisable
//! function declaration, and the properties assigned in the first class body.
//! Nothing here understands JavaScript grammar; every pass is a targeted
//! search backed by the primitives in [`super::js_scanner`].

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::extract::{large_regex, Attempt, Chain, ParseMiss, Summarize};
use super::js_scanner::{find_matching_brace, split_by_comma, strip_comments, window};
use super::js_value::{JsValue, PropertyMap};
use super::logger::{AnalysisLogger, TracingAnalysisLogger};

/// Keys that make an object literal look like plugin metadata.
const IDENTITY_KEYS: [&str; 4] = ["id", "name", "sourceName", "sourceSite"];

/// How far past the constructor call the field-by-field fallback looks.
const CONSTRUCTOR_WINDOW: usize = 5000;

lazy_static! {
    static ref CONSTRUCTOR_CALL: Regex = Regex::new(r"new\s+\w+\s*\(\s*\{").expect("static pattern");
    static ref CONSTRUCTOR_FIELDS: Vec<(&'static str, Regex)> = [
        "id", "sourceName", "sourceSite", "name", "site", "version", "lang", "icon",
    ]
    .iter()
    .map(|key| {
        let re = Regex::new(&format!(r#""{}"\s*:\s*"([^"]+)""#, key)).expect("static pattern");
        (*key, re)
    })
    .collect();
    static ref EXPORT_DEFAULT: Regex = large_regex(r"export\s+default\s+(\{[\s\S]+?\n\})");
    static ref LINE_START_OBJECT: Regex = large_regex(r"(?m)^\s*(\{[\s\S]{100,2000}?\})");
    static ref MINIFIED_OBJECT: Regex = large_regex(
        r#"(\{[^{}]{50,500}?["']?id["']?\s*:\s*['"][^'"]+['"][^{}]{50,500}?\})"#
    );

    /// Function declaration forms, applied in this order.
    static ref FUNCTION_FORMS: [Regex; 4] = [
        Regex::new(r"(?P<async>async\s+)?function\s+(?P<name>\w+)\s*\((?P<params>[^)]*)\)\s*\{")
            .expect("static pattern"),
        Regex::new(r"(?P<name>\w+)\s*:\s*(?P<async>async\s+)?function\s*\((?P<params>[^)]*)\)\s*\{")
            .expect("static pattern"),
        Regex::new(r"(?P<async>async\s+)?(?P<name>\w+)\s*\((?P<params>[^)]*)\)\s*\{")
            .expect("static pattern"),
        Regex::new(r"(?P<name>\w+)\s*:\s*(?P<async>async\s+)?\((?P<params>[^)]*)\)\s*=>\s*\{")
            .expect("static pattern"),
    ];

    static ref CLASS_BLOCK: Regex = Regex::new(r"class\s+(\w+)[\s\S]*?\{([\s\S]+?)\}").expect("static pattern");
    static ref THIS_ASSIGNMENT: Regex = Regex::new(r"this\.(\w+)\s*=\s*([^;]+);").expect("static pattern");
    static ref GETTER_RETURN: Regex =
        Regex::new(r"get\s+(\w+)\s*\(\s*\)\s*\{\s*return\s+([^;]+);").expect("static pattern");
}

/// One parsed object literal and where it was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectLiteral {
    pub properties: PropertyMap,
    pub start_index: usize,
    pub end_index: usize,
}

impl ObjectLiteral {
    pub fn get(&self, key: &str) -> Option<&JsValue> {
        self.properties.get(key)
    }

    /// Whether any of `id`, `name`, `sourceName` or `sourceSite` is present.
    pub fn has_identity(&self) -> bool {
        IDENTITY_KEYS.iter().any(|key| self.properties.contains_key(*key))
    }
}

impl Summarize for ObjectLiteral {
    fn summarize(&self) -> String {
        let keys: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        format!("[{}..{}] {{{}}}", self.start_index, self.end_index, keys.join(", "))
    }
}

/// A recognised function or method definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub params: Vec<String>,
    /// Source between the braces, verbatim. Empty when the closing brace is missing.
    pub body: String,
    pub is_async: bool,
    pub start_index: usize,
    /// Index of the closing brace, if one was found.
    pub end_index: Option<usize>,
}

/// Result of one structural parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedPlugin {
    pub metadata: Option<ObjectLiteral>,
    pub functions: BTreeMap<String, FunctionDeclaration>,
    pub class_properties: PropertyMap,
}

impl ParsedPlugin {
    /// The first name in `candidates` that was parsed as a function.
    pub fn first_function(&self, candidates: &[&str]) -> Option<&FunctionDeclaration> {
        candidates.iter().find_map(|name| self.functions.get(*name))
    }

    /// Class properties overlaid with metadata object properties. The object
    /// literal wins on collisions.
    pub fn merged_properties(&self) -> PropertyMap {
        let mut merged = self.class_properties.clone();
        if let Some(metadata) = &self.metadata {
            merged.extend(metadata.properties.clone());
        }
        merged
    }
}

/// Structural parser with an injected decision logger.
pub struct JsParser {
    logger: Arc<dyn AnalysisLogger>,
}

impl Default for JsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JsParser {
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingAnalysisLogger::new("js_parser")))
    }

    pub fn with_logger(logger: Arc<dyn AnalysisLogger>) -> Self {
        Self { logger }
    }

    pub fn parse(&self, source: &str) -> ParsedPlugin {
        debug!(chars = source.len(), "Parsing plugin source");
        let code = strip_comments(source);

        let metadata = metadata_chain().resolve(&code, self.logger.as_ref()).ok();
        let functions = extract_functions(&code);
        let class_properties = extract_class_properties(&code);

        debug!(
            has_metadata = metadata.is_some(),
            functions = functions.len(),
            class_properties = class_properties.len(),
            "Structural parse finished"
        );

        ParsedPlugin {
            metadata,
            functions,
            class_properties,
        }
    }
}

/// Ordered metadata strategies; the first accepted object literal wins.
pub fn metadata_chain() -> Chain<'static, ObjectLiteral> {
    Chain::new("metadata")
        .step("constructor-call", from_constructor_call)
        .step("constructor-fields", from_constructor_fields)
        .step("export-default", |code| from_candidate(&EXPORT_DEFAULT, code))
        .step("line-start-object", |code| from_candidate(&LINE_START_OBJECT, code))
        .step("minified-object", |code| from_candidate(&MINIFIED_OBJECT, code))
}

fn from_constructor_call(code: &str) -> Attempt<ObjectLiteral> {
    let anchor = CONSTRUCTOR_CALL.find(code).ok_or(ParseMiss::NoMatch)?;
    let open = anchor.end() - 1;
    let close = find_matching_brace(code, open + 1).ok_or(ParseMiss::Unbalanced(open))?;
    accept_identity(ObjectLiteral {
        properties: parse_object_literal(&code[open..=close]),
        start_index: open,
        end_index: close,
    })
}

/// Regex-match quoted `"key": "value"` pairs shortly after the constructor call.
fn from_constructor_fields(code: &str) -> Attempt<ObjectLiteral> {
    let anchor = CONSTRUCTOR_CALL.find(code).ok_or(ParseMiss::NoMatch)?;
    let open = anchor.end() - 1;
    let chunk = window(code, open, open + CONSTRUCTOR_WINDOW);

    let properties: PropertyMap = CONSTRUCTOR_FIELDS
        .iter()
        .filter_map(|(key, re)| {
            re.captures(chunk)
                .and_then(|caps| caps.get(1))
                .map(|m| (key.to_string(), JsValue::Str(m.as_str().to_string())))
        })
        .collect();

    if properties.is_empty() {
        return Err(ParseMiss::NoMatch);
    }
    Ok(ObjectLiteral {
        properties,
        start_index: open,
        end_index: open + chunk.len(),
    })
}

fn from_candidate(re: &Regex, code: &str) -> Attempt<ObjectLiteral> {
    let caps = re.captures(code).ok_or(ParseMiss::NoMatch)?;
    let whole = caps.get(0).ok_or(ParseMiss::NoMatch)?;
    let text = caps.get(1).map_or(whole.as_str(), |m| m.as_str());
    accept_identity(ObjectLiteral {
        properties: parse_object_literal(text),
        start_index: whole.start(),
        end_index: whole.end().saturating_sub(1),
    })
}

fn accept_identity(literal: ObjectLiteral) -> Attempt<ObjectLiteral> {
    if literal.has_identity() {
        Ok(literal)
    } else {
        let keys: Vec<&str> = literal.properties.keys().map(String::as_str).collect();
        Err(ParseMiss::Rejected(format!(
            "no identity key among [{}]",
            keys.join(", ")
        )))
    }
}

/// Parse `{ key: value, ... }` into a property map.
///
/// Pieces without a `:` or with a blank key are skipped.
pub fn parse_object_literal(text: &str) -> PropertyMap {
    let content = strip_surrounding(text.trim(), '{', '}');
    let mut properties = PropertyMap::new();

    for piece in split_by_comma(content) {
        let Some((raw_key, raw_value)) = piece.split_once(':') else {
            continue;
        };
        let raw_key = raw_key.trim();
        let key = strip_quotes(raw_key, '"')
            .or_else(|| strip_quotes(raw_key, '\''))
            .unwrap_or(raw_key);
        if key.trim().is_empty() {
            continue;
        }
        properties.insert(key.to_string(), parse_value(raw_value));
    }

    properties
}

/// Classify and convert one literal value.
pub fn parse_value(text: &str) -> JsValue {
    let trimmed = text.trim();

    if trimmed.starts_with('"') || trimmed.starts_with('\'') {
        let inner = strip_surrounding(strip_surrounding(trimmed, '"', '"'), '\'', '\'');
        return JsValue::Str(unescape(inner));
    }
    if trimmed.starts_with('`') {
        return JsValue::Str(strip_surrounding(trimmed, '`', '`').to_string());
    }

    match trimmed {
        "true" => return JsValue::Bool(true),
        "false" => return JsValue::Bool(false),
        "null" | "undefined" => return JsValue::Null,
        _ => {}
    }

    if looks_numeric(trimmed) {
        if let Ok(n) = trimmed.parse::<i64>() {
            return JsValue::Int(n);
        }
        if let Ok(x) = trimmed.parse::<f64>() {
            return JsValue::Float(x);
        }
    }

    if trimmed.starts_with('[') {
        let inner = strip_surrounding(trimmed, '[', ']');
        return JsValue::Array(split_by_comma(inner).iter().map(|item| parse_value(item)).collect());
    }
    if trimmed.starts_with('{') {
        return JsValue::Object(parse_object_literal(trimmed));
    }
    if trimmed.contains("=>") || trimmed.starts_with("function") {
        return JsValue::Function;
    }

    JsValue::Str(trimmed.to_string())
}

/// Rust's float parser also takes `inf` and `NaN`; JavaScript identifiers
/// with those names must stay strings.
fn looks_numeric(text: &str) -> bool {
    text.bytes()
        .next()
        .map_or(false, |b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.'))
        && !text.to_ascii_lowercase().contains("inf")
        && !text.to_ascii_lowercase().contains("nan")
}

fn unescape(text: &str) -> String {
    text.replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\'", "'")
}

fn strip_surrounding(text: &str, open: char, close: char) -> &str {
    if text.len() >= open.len_utf8() + close.len_utf8() {
        if let Some(inner) = text.strip_prefix(open).and_then(|t| t.strip_suffix(close)) {
            return inner;
        }
    }
    text
}

fn strip_quotes(text: &str, quote: char) -> Option<&str> {
    if text.len() >= 2 {
        text.strip_prefix(quote)?.strip_suffix(quote)
    } else {
        None
    }
}

/// Parameters from the last capture group that holds a comma or is blank.
///
/// A lone parameter has neither, so it loses to a blank or unmatched
/// group and the list comes back empty.
fn params_of(caps: &Captures) -> Vec<String> {
    caps.iter()
        .skip(1)
        .map(|group| group.map_or("", |m| m.as_str()))
        .filter(|text| text.contains(',') || text.trim().is_empty())
        .last()
        .map(|text| {
            text.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Collect every function declaration form into one map.
///
/// All four forms run over the whole source and write into the same map, so
/// a later form silently replaces an earlier declaration with the same name.
pub fn extract_functions(code: &str) -> BTreeMap<String, FunctionDeclaration> {
    let mut functions = BTreeMap::new();

    for form in FUNCTION_FORMS.iter() {
        for caps in form.captures_iter(code) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
                continue;
            };
            let name = name.as_str();
            if name.is_empty() || name == "async" {
                continue;
            }

            let params = params_of(&caps);

            let body_start = whole.end();
            let end_index = find_matching_brace(code, body_start);
            let body = match end_index {
                Some(end) if end > body_start => code[body_start..end].to_string(),
                _ => String::new(),
            };

            functions.insert(
                name.to_string(),
                FunctionDeclaration {
                    name: name.to_string(),
                    params,
                    body,
                    is_async: caps.name("async").is_some(),
                    start_index: whole.start(),
                    end_index,
                },
            );
        }
    }

    functions
}

/// Properties assigned with `this.x = ...;` or returned from `get x() {...}`
/// inside the first class body. Later matches replace earlier ones.
pub fn extract_class_properties(code: &str) -> PropertyMap {
    let mut properties = PropertyMap::new();
    let Some(body) = CLASS_BLOCK.captures(code).and_then(|caps| caps.get(2)) else {
        return properties;
    };
    let body = body.as_str();

    for re in [&*THIS_ASSIGNMENT, &*GETTER_RETURN] {
        for caps in re.captures_iter(body) {
            if let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) {
                properties.insert(name.as_str().to_string(), parse_value(value.as_str()));
            }
        }
    }

    properties
}
