//! Static content page route handlers.
//!
//! Serves markdown-based content pages like terms, shipping, FAQ, etc.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use chrono::NaiveDate;
use tracing::instrument;

use super::layout::PageContext;
use crate::error::{AppError, Result};
use crate::filters;
use crate::state::AppState;

/// Content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/show.html")]
pub struct ContentPageTemplate {
    pub page: PageContext,
    pub title: String,
    pub description: String,
    pub updated_at: Option<NaiveDate>,
    pub content_html: String,
}

/// Display a content page by slug.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<ContentPageTemplate> {
    let content = state
        .content()
        .get_page(&slug)
        .ok_or_else(|| AppError::NotFound(format!("page {slug}")))?;

    Ok(ContentPageTemplate {
        page,
        title: content.meta.title.clone(),
        description: content.meta.description.clone().unwrap_or_default(),
        updated_at: content.meta.updated_at,
        content_html: content.content_html.clone(),
    })
}
