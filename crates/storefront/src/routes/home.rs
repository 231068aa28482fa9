//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::State;
use tracing::instrument;

use super::categories::CategoryCardView;
use super::layout::PageContext;
use super::products::ProductCardView;
use crate::filters;
use crate::state::AppState;

/// Featured products shown on the home page.
const FEATURED_COUNT: u32 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub featured_products: Vec<ProductCardView>,
    pub categories: Vec<CategoryCardView>,
}

/// Display the home page.
///
/// Backend failures degrade to empty sections rather than an error page.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> HomeTemplate {
    let currency = state.config().currency;

    let (featured, categories) = tokio::join!(
        state.api().featured_products(FEATURED_COUNT),
        state.api().list_categories(),
    );

    let featured_products = featured.map_or_else(
        |e| {
            tracing::error!("Failed to fetch featured products: {e}");
            Vec::new()
        },
        |products| {
            products
                .iter()
                .map(|p| ProductCardView::new(p, currency))
                .collect()
        },
    );

    let categories = categories.map_or_else(
        |e| {
            tracing::error!("Failed to fetch categories: {e}");
            Vec::new()
        },
        |categories| categories.iter().map(CategoryCardView::from).collect(),
    );

    HomeTemplate {
        page,
        featured_products,
        categories,
    }
}
