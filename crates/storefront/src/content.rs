//! Content management for markdown-based static pages.
//!
//! Pages (about, terms, shipping, ...) are loaded from `content/pages/*.md`
//! at startup. Each file carries YAML frontmatter:
//!
//! ```markdown
//! ---
//! title: Shipping & Delivery
//! description: Delivery times and costs
//! updated_at: 2026-01-15
//! nav_order: 3
//! ---
//! ```
//!
//! The file stem is the slug served at `/pages/{slug}`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use serde::Deserialize;

/// Metadata for static pages.
#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<NaiveDate>,
    /// Position in the footer navigation; pages without one are not listed.
    #[serde(default)]
    pub nav_order: Option<u32>,
}

/// A rendered page with metadata and HTML content.
#[derive(Debug, Clone)]
pub struct Page {
    pub slug: String,
    pub meta: PageMeta,
    pub content_html: String,
}

/// Link to a page for navigation menus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub slug: String,
    pub title: String,
}

/// Content store that holds all loaded pages in memory.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    pages: Arc<HashMap<String, Page>>,
    nav: Arc<Vec<PageLink>>,
}

impl ContentStore {
    /// Load all pages from `{content_dir}/pages`.
    ///
    /// A missing directory yields an empty store; individual files that fail
    /// to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the pages directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let pages = Self::load_pages(&content_dir.join("pages"))?;
        Ok(Self::from_pages(pages.into_values()))
    }

    /// Build a store from already rendered pages.
    pub fn from_pages(pages: impl IntoIterator<Item = Page>) -> Self {
        let pages: HashMap<String, Page> = pages
            .into_iter()
            .map(|page| (page.slug.clone(), page))
            .collect();

        let mut nav: Vec<(u32, PageLink)> = pages
            .values()
            .filter_map(|page| {
                page.meta.nav_order.map(|order| {
                    (
                        order,
                        PageLink {
                            slug: page.slug.clone(),
                            title: page.meta.title.clone(),
                        },
                    )
                })
            })
            .collect();
        nav.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.title.cmp(&b.1.title)));

        Self {
            pages: Arc::new(pages),
            nav: Arc::new(nav.into_iter().map(|(_, link)| link).collect()),
        }
    }

    fn load_pages(dir: &Path) -> Result<HashMap<String, Page>, ContentError> {
        let mut pages = HashMap::new();

        if !dir.exists() {
            tracing::warn!("Pages directory does not exist: {:?}", dir);
            return Ok(pages);
        }

        let entries = std::fs::read_dir(dir).map_err(|e| ContentError::Io(e.to_string()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                match Self::load_page(&path) {
                    Ok(page) => {
                        tracing::info!("Loaded page: {}", page.slug);
                        pages.insert(page.slug.clone(), page);
                    }
                    Err(e) => {
                        tracing::error!("Failed to load page {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(pages)
    }

    fn load_page(path: &Path) -> Result<Page, ContentError> {
        let content = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;

        let slug = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?
            .to_string();

        parse_page(slug, &content)
    }

    /// Get a page by slug.
    #[must_use]
    pub fn get_page(&self, slug: &str) -> Option<&Page> {
        self.pages.get(slug)
    }

    /// Pages listed in navigation, in `nav_order`.
    #[must_use]
    pub fn nav_links(&self) -> &[PageLink] {
        &self.nav
    }

    /// Number of loaded pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether no pages are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Parse a markdown document with frontmatter into a page.
///
/// # Errors
///
/// Returns `ContentError::Parse` if the frontmatter is missing or invalid.
pub fn parse_page(slug: String, content: &str) -> Result<Page, ContentError> {
    let matter = Matter::<YAML>::new();
    let parsed: ParsedEntity<PageMeta> = matter
        .parse(content)
        .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
    let meta = parsed
        .data
        .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;

    Ok(Page {
        slug,
        meta,
        content_html: render_markdown(&parsed.content),
    })
}

/// Render markdown to HTML with GitHub Flavored Markdown support.
///
/// Raw HTML in the source is escaped.
fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    markdown_to_html(content, &options)
}

/// Content loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const SHIPPING: &str = "---\ntitle: Shipping\ndescription: Delivery times\nupdated_at: 2026-01-15\nnav_order: 2\n---\n\n## Lead times\n\n| Zone | Days |\n|------|------|\n| EU | 3 |\n\n<script>alert(1)</script>\n";

    #[test]
    fn test_parse_page_renders_markdown() {
        let page = parse_page("shipping".to_string(), SHIPPING).unwrap();
        assert_eq!(page.meta.title, "Shipping");
        assert_eq!(
            page.meta.updated_at,
            Some(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap())
        );
        assert!(page.content_html.contains("<h2"));
        assert!(page.content_html.contains("<table>"));
        assert!(!page.content_html.contains("<script>"));
    }

    #[test]
    fn test_parse_page_requires_frontmatter() {
        let err = parse_page("bare".to_string(), "# Just markdown\n").unwrap_err();
        assert!(matches!(err, ContentError::Parse(_)));
    }

    #[test]
    fn test_nav_links_sorted_and_filtered() {
        let about = parse_page(
            "about".to_string(),
            "---\ntitle: About\nnav_order: 1\n---\nHi",
        )
        .unwrap();
        let hidden = parse_page("hidden".to_string(), "---\ntitle: Hidden\n---\nx").unwrap();
        let shipping = parse_page("shipping".to_string(), SHIPPING).unwrap();

        let store = ContentStore::from_pages([shipping, hidden, about]);
        let slugs: Vec<&str> = store.nav_links().iter().map(|l| l.slug.as_str()).collect();
        assert_eq!(slugs, vec!["about", "shipping"]);
        assert_eq!(store.len(), 3);
        assert!(store.get_page("hidden").is_some());
    }

    #[test]
    fn test_load_bundled_pages() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("content");
        let store = ContentStore::load(&dir).unwrap();
        assert!(store.get_page("about").is_some());
        assert!(store.get_page("terms").is_some());
        assert!(!store.nav_links().is_empty());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let store = ContentStore::load(Path::new("/nonexistent/horeca/content")).unwrap();
        assert!(store.is_empty());
    }
}
