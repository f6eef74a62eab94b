//! Plugin converter
//!
//! Binds the patterns of an [`AnalyzedPlugin`] to an [`HttpFetcher`] and
//! exposes them as a [`ContentSource`]. Each operation is one fetch followed
//! by synchronous selector evaluation; nothing is cached between calls.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use super::analyzer::PluginAnalyzer;
use super::html::{self, element_text, Document};
use super::http::HttpFetcher;
use super::js_scanner::strip_comments;
use super::source::{ChapterInfo, ContentSource, Filter, Listing, MangaInfo, MangaStatus, MangasPageInfo, Page};
use super::types::{AnalyzedPlugin, ContentPattern, DetailsPattern, PluginMetadata, SearchPattern};
use crate::core::error::{ConverterError, Result};

/// Turns analysis results into live content sources.
pub struct PluginConverter {
    fetcher: Arc<dyn HttpFetcher>,
}

impl PluginConverter {
    pub fn new(fetcher: Arc<dyn HttpFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn convert(&self, analyzed: AnalyzedPlugin) -> GeneratedSource {
        info!(
            name = %analyzed.metadata.name,
            base_url = %analyzed.metadata.base_url,
            has_search = analyzed.search_pattern.is_some(),
            "Converting plugin"
        );
        GeneratedSource {
            metadata: analyzed.metadata,
            search: analyzed.search_pattern,
            details: analyzed.details_pattern,
            content: analyzed.content_pattern,
            fetcher: self.fetcher.clone(),
        }
    }

    /// Analyze `source` and convert the result.
    ///
    /// # Errors
    /// Returns [`ConverterError::EmptySource`] when `source` holds no code.
    pub fn from_source(&self, origin: &str, source: &str, analyzer: &PluginAnalyzer) -> Result<GeneratedSource> {
        if strip_comments(source).trim().is_empty() {
            return Err(ConverterError::EmptySource(origin.to_string()));
        }
        Ok(self.convert(analyzer.analyze(source)))
    }
}

/// A content source driven entirely by recovered selectors.
pub struct GeneratedSource {
    metadata: PluginMetadata,
    search: Option<SearchPattern>,
    details: Option<DetailsPattern>,
    content: Option<ContentPattern>,
    fetcher: Arc<dyn HttpFetcher>,
}

impl GeneratedSource {
    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    pub fn can_search(&self) -> bool {
        self.search.is_some()
    }

    /// Fetch `url`, resolving it against the base URL when relative.
    async fn fetch(&self, url: &str) -> Result<String> {
        let url = self.resolve(url)?;
        self.fetcher.get_text(&url).await
    }

    fn resolve(&self, url: &str) -> Result<String> {
        match Url::parse(url) {
            Ok(_) => Ok(url.to_string()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = Url::parse(&self.metadata.base_url)?;
                Ok(base.join(url)?.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn parse_listing(&self, body: &str, pattern: &SearchPattern) -> Vec<MangaInfo> {
        let doc = Document::parse(body, &self.metadata.base_url);
        let elements = doc.select_first_matching(&pattern.selector);
        if elements.is_empty() {
            debug!(selector = %pattern.selector, "No results found with any selector");
            return Vec::new();
        }

        let total = elements.len();
        let mangas: Vec<MangaInfo> = elements
            .into_iter()
            .filter_map(|element| {
                let key = html::find_within(element, &pattern.link_selector, |a| doc.abs_attr(a, "href"))
                    .or_else(|| doc.abs_attr(element, "href"))?;

                let title = html::find_within(element, &pattern.title_selector, |t| non_blank(element_text(t)))
                    .or_else(|| non_blank(element_text(element)))?;

                let cover = pattern
                    .cover_selector
                    .as_deref()
                    .and_then(|selectors| html::find_within(element, selectors, |img| doc.image_url(img)))
                    .or_else(|| html::find_within(element, "img", |img| doc.image_url(img)))
                    .unwrap_or_default();

                Some(MangaInfo {
                    key,
                    title,
                    cover,
                    ..MangaInfo::default()
                })
            })
            .collect();

        debug!(parsed = mangas.len(), elements = total, "Parsed listing");
        mangas
    }

    fn apply_details(&self, body: &str, pattern: &DetailsPattern, mut manga: MangaInfo) -> MangaInfo {
        let doc = Document::parse(body, &self.metadata.base_url);

        if let Some(author) = pattern.author_selector.as_deref().and_then(|s| doc.first_text(s)) {
            manga.author = author;
        }
        if let Some(description) = pattern.description_selector.as_deref().and_then(|s| doc.first_text(s)) {
            manga.description = description;
        }
        if let Some(genres) = pattern.genres_selector.as_deref().and_then(|s| doc.all_texts(s)) {
            manga.genres = genres;
        }
        if let Some(status) = pattern.status_selector.as_deref().and_then(|s| doc.first_text(s)) {
            manga.status = MangaStatus::from_text(&status);
        }
        if let Some(cover) = pattern.cover_selector.as_deref().and_then(|s| doc.first_image(s)) {
            manga.cover = cover;
        }

        debug!(
            author = %manga.author,
            genres = manga.genres.len(),
            status = ?manga.status,
            "Extracted details"
        );
        manga
    }

    fn parse_chapters(&self, body: &str, pattern: &DetailsPattern, selectors: &str) -> Vec<ChapterInfo> {
        let doc = Document::parse(body, &self.metadata.base_url);
        let elements = doc.select_first_matching(selectors);
        if elements.is_empty() {
            debug!(selector = selectors, "No chapters found");
            return Vec::new();
        }

        let url_selector = pattern.chapter_url_selector.as_deref().unwrap_or("a");
        elements
            .into_iter()
            .enumerate()
            .filter_map(|(index, element)| {
                let key = html::find_within(element, url_selector, |a| doc.abs_attr(a, "href"))
                    .or_else(|| doc.abs_attr(element, "href"))?;

                let name = pattern
                    .chapter_name_selector
                    .as_deref()
                    .and_then(|s| html::find_within(element, s, |n| non_blank(element_text(n))))
                    .or_else(|| html::find_within(element, "a", |a| non_blank(element_text(a))))
                    .or_else(|| non_blank(element_text(element)))
                    .unwrap_or_else(|| format!("Chapter {}", index + 1));

                Some(ChapterInfo {
                    key,
                    name,
                    number: (index + 1) as f32,
                })
            })
            .collect()
    }

    fn parse_content(&self, body: &str, pattern: &ContentPattern) -> Vec<Page> {
        let doc = Document::parse(body, &self.metadata.base_url);
        let elements = doc.select_first_matching(&pattern.selector);

        let content = if elements.is_empty() {
            debug!(selector = %pattern.selector, "No content found, using body text");
            doc.body_text()
        } else {
            elements
                .into_iter()
                .map(element_text)
                .collect::<Vec<_>>()
                .join(&pattern.text_join)
                .trim()
                .to_string()
        };

        if content.is_empty() {
            return Vec::new();
        }
        debug!(chars = content.chars().count(), "Extracted content");
        vec![Page::Text(content)]
    }
}

#[async_trait]
impl ContentSource for GeneratedSource {
    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn lang(&self) -> &str {
        &self.metadata.lang
    }

    fn base_url(&self) -> &str {
        &self.metadata.base_url
    }

    fn filters(&self) -> Vec<Filter> {
        vec![Filter::Title(String::new())]
    }

    async fn list_page(&self, _listing: Option<&Listing>, page: u32) -> MangasPageInfo {
        self.search(&[], page).await
    }

    async fn search(&self, filters: &[Filter], page: u32) -> MangasPageInfo {
        let Some(pattern) = &self.search else {
            warn!(name = %self.metadata.name, "No search pattern available, plugin supports direct URLs only");
            return MangasPageInfo::empty();
        };

        let query = Filter::title_query(filters);
        let url = build_search_url(&pattern.url_template, &self.metadata.base_url, query, page);
        info!(url = %url, query, page, "Fetching search page");

        match self.fetch(&url).await {
            Ok(body) => {
                let mangas = self.parse_listing(&body, pattern);
                let has_next_page = !mangas.is_empty();
                MangasPageInfo { mangas, has_next_page }
            }
            Err(e) => {
                warn!(url = %url, error = %e, error_type = e.error_type(), "Search failed");
                MangasPageInfo::empty()
            }
        }
    }

    async fn fetch_details(&self, manga: MangaInfo) -> MangaInfo {
        let Some(pattern) = self.details.as_ref().filter(|p| p.has_detail_selectors()) else {
            return manga;
        };

        info!(url = %manga.key, "Fetching details");
        match self.fetch(&manga.key).await {
            Ok(body) => self.apply_details(&body, pattern, manga),
            Err(e) => {
                warn!(url = %manga.key, error = %e, error_type = e.error_type(), "Details fetch failed");
                manga
            }
        }
    }

    async fn fetch_chapter_list(&self, manga: &MangaInfo) -> Vec<ChapterInfo> {
        let Some(pattern) = &self.details else {
            return Vec::new();
        };
        let Some(selectors) = pattern.chapters_selector.as_deref() else {
            return Vec::new();
        };

        info!(url = %manga.key, "Fetching chapters");
        match self.fetch(&manga.key).await {
            Ok(body) => {
                let chapters = self.parse_chapters(&body, pattern, selectors);
                debug!(count = chapters.len(), "Parsed chapters");
                chapters
            }
            Err(e) => {
                warn!(url = %manga.key, error = %e, error_type = e.error_type(), "Chapter list fetch failed");
                Vec::new()
            }
        }
    }

    async fn fetch_page_list(&self, chapter: &ChapterInfo) -> Vec<Page> {
        let Some(pattern) = &self.content else {
            return Vec::new();
        };

        info!(url = %chapter.key, "Fetching content");
        match self.fetch(&chapter.key).await {
            Ok(body) => self.parse_content(&body, pattern),
            Err(e) => {
                warn!(url = %chapter.key, error = %e, error_type = e.error_type(), "Content fetch failed");
                Vec::new()
            }
        }
    }
}

/// Fill the placeholders of a search URL template. The query is percent-encoded.
pub fn build_search_url(template: &str, base_url: &str, query: &str, page: u32) -> String {
    let query = urlencoding::encode(query);
    let page = page.to_string();
    template
        .replace("${this.site}", base_url)
        .replace("${this.baseUrl}", base_url)
        .replace("${query}", &query)
        .replace("${page}", &page)
        .replace("$query", &query)
        .replace("$page", &page)
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
