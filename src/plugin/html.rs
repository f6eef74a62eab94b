//! Selector evaluation over fetched pages
//!
//! Recovered selectors are comma-joined candidate lists. Candidates are tried
//! one at a time and the first that matches anything wins; they are never
//! unioned. A candidate that is not valid CSS counts as a miss.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Trimmed, non-empty candidates of a comma-joined selector list.
pub fn candidates(selectors: &str) -> impl Iterator<Item = &str> {
    selectors.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Compile one candidate, logging and skipping invalid CSS.
pub fn compile(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(compiled) => Some(compiled),
        Err(e) => {
            warn!(selector, error = %e, "Skipping invalid selector");
            None
        }
    }
}

/// A parsed page plus the base URL relative links resolve against.
pub struct Document {
    html: Html,
    base: Option<Url>,
}

impl Document {
    /// `base` that is empty or unparsable leaves only absolute links resolvable.
    pub fn parse(body: &str, base: &str) -> Self {
        Self {
            html: Html::parse_document(body),
            base: Url::parse(base).ok(),
        }
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Elements of the first candidate that matches anything.
    pub fn select_first_matching(&self, selectors: &str) -> Vec<ElementRef<'_>> {
        for candidate in candidates(selectors) {
            let Some(selector) = compile(candidate) else {
                continue;
            };
            let elements: Vec<_> = self.html.select(&selector).collect();
            if !elements.is_empty() {
                debug!(selector = candidate, count = elements.len(), "Selector matched");
                return elements;
            }
        }
        Vec::new()
    }

    /// First non-blank text among the candidates.
    pub fn first_text(&self, selectors: &str) -> Option<String> {
        candidates(selectors).find_map(|candidate| {
            let selector = compile(candidate)?;
            let element = self.html.select(&selector).next()?;
            Some(element_text(element)).filter(|text| !text.is_empty())
        })
    }

    /// Texts of every element of the first candidate that matches, blanks removed.
    pub fn all_texts(&self, selectors: &str) -> Option<Vec<String>> {
        candidates(selectors).find_map(|candidate| {
            let selector = compile(candidate)?;
            let texts: Vec<String> = self.html.select(&selector).map(element_text).collect();
            if texts.is_empty() {
                None
            } else {
                Some(texts.into_iter().filter(|t| !t.is_empty()).collect())
            }
        })
    }

    /// First resolvable image URL among the candidates.
    pub fn first_image(&self, selectors: &str) -> Option<String> {
        candidates(selectors).find_map(|candidate| {
            let selector = compile(candidate)?;
            let element = self.html.select(&selector).next()?;
            self.image_url(element)
        })
    }

    pub fn body_text(&self) -> String {
        match Selector::parse("body") {
            Ok(selector) => self
                .html
                .select(&selector)
                .next()
                .map(element_text)
                .unwrap_or_default(),
            Err(_) => String::new(),
        }
    }

    /// `attr` of `element` as an absolute URL.
    pub fn abs_attr(&self, element: ElementRef<'_>, attr: &str) -> Option<String> {
        let value = element.value().attr(attr)?.trim();
        if value.is_empty() {
            return None;
        }
        match Url::parse(value) {
            Ok(url) => Some(url.to_string()),
            Err(_) => self
                .base
                .as_ref()
                .and_then(|base| base.join(value).ok())
                .map(|url| url.to_string()),
        }
    }

    /// `src`, else `data-src`, of an image element.
    pub fn image_url(&self, element: ElementRef<'_>) -> Option<String> {
        self.abs_attr(element, "src")
            .or_else(|| self.abs_attr(element, "data-src"))
    }
}

/// Try each candidate's first match within `element` until `extract` yields a value.
pub fn find_within<'a, T, F>(element: ElementRef<'a>, selectors: &str, mut extract: F) -> Option<T>
where
    F: FnMut(ElementRef<'a>) -> Option<T>,
{
    candidates(selectors).find_map(|candidate| {
        let selector = compile(candidate)?;
        let found = element.select(&selector).next()?;
        extract(found)
    })
}

/// Visible text with whitespace runs collapsed to single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
            <div class="list">
                <div class="item"><a href="/novel/1">  First
                    Novel </a><img data-src="/img/1.jpg"></div>
                <div class="item"><a href="https://cdn.example/2">Second</a></div>
            </div>
            <p class="summary">   </p>
            <p class="about">A long tale.</p>
        </body></html>
    "#;

    #[test]
    fn test_candidates_split_and_trim() {
        let parts: Vec<_> = candidates(" .a , .b .c,, #d ").collect();
        assert_eq!(parts, vec![".a", ".b .c", "#d"]);
    }

    #[test]
    fn test_first_matching_candidate_wins() {
        let doc = Document::parse(PAGE, "https://site.example");
        let items = doc.select_first_matching(".missing, .item, .list");
        assert_eq!(items.len(), 2);
        assert!(doc.select_first_matching(".missing, .gone").is_empty());
    }

    #[test]
    fn test_invalid_selector_is_skipped() {
        let doc = Document::parse(PAGE, "https://site.example");
        assert!(compile("div[").is_none());
        assert_eq!(doc.select_first_matching("div[, .item").len(), 2);
    }

    #[test]
    fn test_text_is_normalised_and_blank_skipped() {
        let doc = Document::parse(PAGE, "https://site.example");
        assert_eq!(doc.first_text(".summary, .about").as_deref(), Some("A long tale."));
        let items = doc.select_first_matching(".item");
        assert_eq!(element_text(items[0]), "First Novel");
    }

    #[test]
    fn test_relative_urls_resolve_against_base() {
        let doc = Document::parse(PAGE, "https://site.example/base/");
        let items = doc.select_first_matching(".item");
        let link = find_within(items[0], "a", Some).unwrap();
        assert_eq!(
            doc.abs_attr(link, "href").as_deref(),
            Some("https://site.example/novel/1")
        );
        let img = find_within(items[0], "img", Some).unwrap();
        assert_eq!(
            doc.image_url(img).as_deref(),
            Some("https://site.example/img/1.jpg")
        );
    }

    #[test]
    fn test_without_base_only_absolute_urls_resolve() {
        let doc = Document::parse(PAGE, "");
        assert!(doc.base().is_none());
        let items = doc.select_first_matching(".item");
        let relative = find_within(items[0], "a", Some).unwrap();
        let absolute = find_within(items[1], "a", Some).unwrap();
        assert_eq!(doc.abs_attr(relative, "href"), None);
        assert_eq!(
            doc.abs_attr(absolute, "href").as_deref(),
            Some("https://cdn.example/2")
        );
    }

    #[test]
    fn test_body_text_fallback() {
        let doc = Document::parse("<p>Only   text</p>", "");
        assert_eq!(doc.body_text(), "Only text");
    }
}
