use hl_core::config::CardLayout;
use hl_core::{Error, NewArticle, Result};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

pub mod fetch;

pub use fetch::{HttpFetcher, PageFetcher};

/// A headline card as read from the page, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub headline: String,
    pub summary: String,
    pub link: String,
}

impl Candidate {
    /// Cards without a headline or a link are dropped. Whitespace counts as
    /// content.
    pub fn is_valid(&self) -> bool {
        !self.headline.is_empty() && !self.link.is_empty()
    }
}

impl From<Candidate> for NewArticle {
    fn from(candidate: Candidate) -> Self {
        NewArticle::new(candidate.headline, candidate.summary, candidate.link)
    }
}

/// Reads headline cards out of a page.
///
/// The card is located with a CSS selector. Inside it, the link is the
/// `href` of the first `<a>` directly under the headline element, the
/// headline is the text of the headline-text elements directly under those
/// anchors, and the summary is the text of the anchors directly under the
/// description element. Markup that does not fit yields fewer candidates,
/// never an error.
#[derive(Debug, Clone)]
pub struct HeadlineExtractor {
    card: Selector,
    layout: CardLayout,
}

impl HeadlineExtractor {
    pub fn new(layout: CardLayout) -> Result<Self> {
        let card = Selector::parse(&layout.card)
            .map_err(|e| Error::Scraping(format!("Invalid selector {}: {}", layout.card, e)))?;
        Ok(Self { card, layout })
    }

    pub fn layout(&self) -> &CardLayout {
        &self.layout
    }

    /// Lazily yields the valid candidates of an already parsed document.
    pub fn candidates<'a>(
        &'a self,
        document: &'a Html,
        base: Option<&'a Url>,
    ) -> impl Iterator<Item = Candidate> + 'a {
        document
            .select(&self.card)
            .map(move |card| self.read_card(card, base))
            .filter(Candidate::is_valid)
    }

    /// Parse `html` and collect its valid candidates. Relative links are
    /// resolved against `base` when given.
    pub fn extract(&self, html: &str, base: Option<&Url>) -> Vec<Candidate> {
        let document = Html::parse_document(html);
        self.candidates(&document, base).collect()
    }

    fn read_card(&self, card: ElementRef<'_>, base: Option<&Url>) -> Candidate {
        let anchors: Vec<ElementRef<'_>> = utils::children_with_class(card, &self.layout.headline)
            .flat_map(|headline| utils::children_named(headline, "a"))
            .collect();

        let href = anchors
            .first()
            .and_then(|a| a.value().attr("href"))
            .map(utils::tidy)
            .unwrap_or_default();

        let headline = anchors
            .iter()
            .flat_map(|a| utils::children_with_class(*a, &self.layout.headline_text))
            .map(utils::element_text)
            .collect::<String>();

        let summary = utils::children_with_class(card, &self.layout.description)
            .flat_map(|description| utils::children_named(description, "a"))
            .map(utils::element_text)
            .collect::<String>();

        Candidate {
            headline: utils::tidy(&headline).to_string(),
            summary: utils::tidy(&summary).to_string(),
            link: utils::resolve_link(href, base),
        }
    }
}

/// Common utilities for scrapers
pub(crate) mod utils {
    use super::*;

    pub fn parse_url(url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))
    }

    pub fn children_with_class<'a>(
        parent: ElementRef<'a>,
        class: &'a str,
    ) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(move |el| el.value().classes().any(|c| c == class))
    }

    pub fn children_named<'a>(
        parent: ElementRef<'a>,
        name: &'a str,
    ) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(move |el| el.value().name() == name)
    }

    pub fn element_text(el: ElementRef<'_>) -> String {
        el.text().collect::<String>()
    }

    /// Strips surrounding whitespace unless nothing would be left, so
    /// tidying never turns a non-empty field into an empty one.
    pub fn tidy(text: &str) -> &str {
        match text.trim() {
            "" => text,
            trimmed => trimmed,
        }
    }

    /// An empty href stays empty; one that cannot be joined to `base` is kept as is.
    pub fn resolve_link(href: &str, base: Option<&Url>) -> String {
        if href.is_empty() {
            return String::new();
        }
        match base {
            Some(base) => base
                .join(href)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        }
    }
}
