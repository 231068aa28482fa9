//! Category route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::instrument;

use super::layout::PageContext;
use super::products::{PAGE_SIZE, PaginationView, ProductCardView};
use crate::api::ProductQuery;
use crate::api::types::Category;
use crate::error::Result;
use crate::filters;
use crate::state::AppState;

/// Category card display data.
#[derive(Clone, Debug)]
pub struct CategoryCardView {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub image: String,
    pub product_count: Option<u32>,
}

impl From<&Category> for CategoryCardView {
    fn from(category: &Category) -> Self {
        Self {
            slug: category.slug.clone(),
            name: category.name.clone(),
            description: category.description.clone(),
            image: category.display_image().to_string(),
            product_count: category.product_count,
        }
    }
}

/// Query parameters for a category page.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub page: Option<u32>,
}

/// Category listing template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesIndexTemplate {
    pub page: PageContext,
    pub categories: Vec<CategoryCardView>,
}

/// Category detail template.
#[derive(Template, WebTemplate)]
#[template(path = "categories/show.html")]
pub struct CategoryShowTemplate {
    pub page: PageContext,
    pub category: CategoryCardView,
    pub products: Vec<ProductCardView>,
    pub pagination: PaginationView,
}

/// Display all categories.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
) -> Result<CategoriesIndexTemplate> {
    let categories = state.api().list_categories().await?;

    Ok(CategoriesIndexTemplate {
        page,
        categories: categories.iter().map(CategoryCardView::from).collect(),
    })
}

/// Display a category with its products.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
    Query(query): Query<CategoryQuery>,
) -> Result<CategoryShowTemplate> {
    let currency = state.config().currency;
    let category = state.api().get_category(&slug).await?;

    let product_query = ProductQuery {
        category: Some(category.slug.clone()),
        page: Some(query.page.unwrap_or(1).max(1)),
        limit: Some(PAGE_SIZE),
        ..ProductQuery::default()
    };
    let listing = state.api().list_products(&product_query).await?;

    Ok(CategoryShowTemplate {
        page,
        category: CategoryCardView::from(&category),
        products: listing
            .items
            .iter()
            .map(|p| ProductCardView::new(p, currency))
            .collect(),
        pagination: PaginationView {
            page: listing.page,
            pages: listing.pages,
            total: listing.total,
            base_query: String::new(),
        },
    })
}
