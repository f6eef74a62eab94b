//! JavaScript plugin analysis and conversion
//!
//! Plugin source text goes through a shallow structural parse, is analyzed
//! into metadata plus search, details and content patterns, and is finally
//! bound to an HTTP fetcher as a [`ContentSource`]. Plugin code is never
//! executed.

pub mod analyzer;
pub mod converter;
pub mod extract;
pub mod html;
pub mod http;
pub mod js_parser;
pub mod js_scanner;
pub mod js_value;
pub mod logger;
pub mod source;
pub mod types;

pub use analyzer::{AnalyzerKind, PluginAnalyzer, RegexScope, ScopeProvider, StructuralScope};
pub use converter::{GeneratedSource, PluginConverter};
pub use extract::{Attempt, Chain, ParseMiss};
pub use http::{HttpFetcher, ReqwestFetcher};
pub use js_parser::{FunctionDeclaration, JsParser, ObjectLiteral, ParsedPlugin};
pub use js_value::JsValue;
pub use logger::{AnalysisEvent, AnalysisLogger, RecordingAnalysisLogger, TracingAnalysisLogger};
pub use source::{ChapterInfo, ContentSource, Filter, Listing, MangaInfo, MangaStatus, MangasPageInfo, Page};
pub use types::{AnalyzedPlugin, ContentPattern, DetailsPattern, PluginMetadata, SearchPattern};
