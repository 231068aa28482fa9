//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, Query, State};
use axum_extra::extract::cookie::SignedCookieJar;
use horeca_core::{CurrencyCode, Favorites, LineKey};
use serde::Deserialize;
use tracing::instrument;

use super::layout::{PageContext, format_money, non_blank};
use crate::api::ProductQuery;
use crate::api::types::{Category, Product};
use crate::cart_store;
use crate::error::Result;
use crate::filters;
use crate::state::AppState;

/// Products per listing page.
pub const PAGE_SIZE: u32 = 24;

/// Related products shown under a product.
const RELATED_COUNT: u32 = 4;

/// Sort orders the backend understands, with their labels.
pub const SORT_OPTIONS: [(&str, &str); 4] = [
    ("newest", "Newest"),
    ("price_asc", "Price: low to high"),
    ("price_desc", "Price: high to low"),
    ("name", "Name"),
];

/// Product card data for grids.
#[derive(Clone, Debug)]
pub struct ProductCardView {
    pub slug: String,
    pub name: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub image: String,
    pub category: String,
    pub in_stock: bool,
}

impl ProductCardView {
    /// Build a card in the store currency.
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode) -> Self {
        Self {
            slug: product.slug.clone(),
            name: product.name.clone(),
            price: format_money(product.effective_price(), currency),
            compare_at_price: product
                .active_sale_price()
                .map(|_| format_money(product.price, currency)),
            image: product.display_image().to_string(),
            category: product.display_category().to_string(),
            in_stock: product.in_stock,
        }
    }
}

/// Variant display data.
#[derive(Clone, Debug)]
pub struct VariantView {
    pub id: String,
    pub name: String,
    pub price: String,
    pub in_stock: bool,
}

/// Specification row display data.
#[derive(Clone, Debug)]
pub struct SpecView {
    pub name: String,
    pub value: String,
}

/// Product detail display data.
#[derive(Clone, Debug)]
pub struct ProductDetailView {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub images: Vec<String>,
    pub category_name: String,
    pub category_slug: Option<String>,
    pub sizes: Vec<String>,
    pub variants: Vec<VariantView>,
    pub in_stock: bool,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub specifications: Vec<SpecView>,
}

impl ProductDetailView {
    /// Build the detail view in the store currency.
    #[must_use]
    pub fn new(product: &Product, currency: CurrencyCode) -> Self {
        let images = if product.images.is_empty() {
            vec![product.display_image().to_string()]
        } else {
            product.images.clone()
        };

        Self {
            id: product.id.to_string(),
            slug: product.slug.clone(),
            name: product.name.clone(),
            description: product.display_description().to_string(),
            price: format_money(product.effective_price(), currency),
            compare_at_price: product
                .active_sale_price()
                .map(|_| format_money(product.price, currency)),
            images,
            category_name: product.display_category().to_string(),
            category_slug: product.category.as_ref().map(|c| c.slug.clone()),
            sizes: product.sizes.clone(),
            variants: product
                .variants
                .iter()
                .map(|v| VariantView {
                    id: v.id.to_string(),
                    name: v.name.clone(),
                    price: format_money(
                        v.price.unwrap_or_else(|| product.effective_price()),
                        currency,
                    ),
                    in_stock: v.in_stock,
                })
                .collect(),
            in_stock: product.in_stock,
            sku: product.sku.clone(),
            brand: product.brand.clone(),
            specifications: product
                .specifications
                .iter()
                .map(|s| SpecView {
                    name: s.name.clone(),
                    value: s.value.clone(),
                })
                .collect(),
        }
    }
}

/// Category link for filters and navigation.
#[derive(Clone, Debug)]
pub struct CategoryLinkView {
    pub slug: String,
    pub name: String,
}

impl From<&Category> for CategoryLinkView {
    fn from(category: &Category) -> Self {
        Self {
            slug: category.slug.clone(),
            name: category.name.clone(),
        }
    }
}

/// Pagination state for listing templates.
#[derive(Clone, Debug)]
pub struct PaginationView {
    pub page: u32,
    pub pages: u32,
    pub total: u64,
    /// Query string (without `page`) to append to page links, starting with `&` when non-empty.
    pub base_query: String,
}

impl PaginationView {
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.pages
    }

    #[must_use]
    pub const fn prev(&self) -> u32 {
        self.page.saturating_sub(1)
    }

    #[must_use]
    pub const fn next(&self) -> u32 {
        self.page.saturating_add(1)
    }
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub category: Option<String>,
    #[serde(alias = "q")]
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
}

impl ListingQuery {
    /// Convert to a backend query, dropping unknown sort orders.
    #[must_use]
    pub fn to_product_query(&self) -> ProductQuery {
        let sort = non_blank(self.sort.clone())
            .filter(|s| SORT_OPTIONS.iter().any(|(value, _)| value == s));
        ProductQuery {
            category: non_blank(self.category.clone()),
            search: non_blank(self.search.clone()),
            sort,
            page: Some(self.page.unwrap_or(1).max(1)),
            limit: Some(PAGE_SIZE),
            featured: false,
        }
    }
}

/// Query string carrying everything but the page number.
fn base_query(query: &ProductQuery) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    if let Some(category) = &query.category {
        out.append_pair("category", category);
    }
    if let Some(search) = &query.search {
        out.append_pair("search", search);
    }
    if let Some(sort) = &query.sort {
        out.append_pair("sort", sort);
    }
    let encoded = out.finish();
    if encoded.is_empty() {
        encoded
    } else {
        format!("&{encoded}")
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: PageContext,
    pub products: Vec<ProductCardView>,
    pub categories: Vec<CategoryLinkView>,
    pub category: String,
    pub search: String,
    pub sort: String,
    pub sort_options: Vec<(String, String)>,
    pub pagination: PaginationView,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: ProductDetailView,
    pub is_favorite: bool,
    pub related_products: Vec<ProductCardView>,
}

/// Display product listing page.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<ListingQuery>,
) -> Result<ProductsIndexTemplate> {
    let currency = state.config().currency;
    let product_query = query.to_product_query();
    let listing = state.api().list_products(&product_query).await?;

    let categories = state.api().list_categories().await.map_or_else(
        |e| {
            tracing::warn!("Failed to fetch categories for filter: {e}");
            Vec::new()
        },
        |categories| categories.iter().map(CategoryLinkView::from).collect(),
    );

    Ok(ProductsIndexTemplate {
        page,
        products: listing
            .items
            .iter()
            .map(|p| ProductCardView::new(p, currency))
            .collect(),
        categories,
        category: product_query.category.clone().unwrap_or_default(),
        search: product_query.search.clone().unwrap_or_default(),
        sort: product_query.sort.clone().unwrap_or_default(),
        sort_options: SORT_OPTIONS
            .iter()
            .map(|(value, label)| ((*value).to_string(), (*label).to_string()))
            .collect(),
        pagination: PaginationView {
            page: listing.page,
            pages: listing.pages,
            total: listing.total,
            base_query: base_query(&product_query),
        },
    })
}

/// Display product detail page.
#[instrument(skip(state, page, jar))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    jar: SignedCookieJar,
    Path(slug): Path<String>,
) -> Result<ProductShowTemplate> {
    let currency = state.config().currency;
    let product = state.api().get_product(&slug).await?;

    let favorites: Favorites = cart_store::load(&jar);
    let is_favorite = favorites.contains(&LineKey::new(product.id.clone(), None, None))
        || favorites.contains_product(&product.id);

    let related_products = match &product.category {
        Some(category) => {
            let query = ProductQuery {
                category: Some(category.slug.clone()),
                limit: Some(RELATED_COUNT + 1),
                ..ProductQuery::default()
            };
            state.api().list_products(&query).await.map_or_else(
                |e| {
                    tracing::warn!("Failed to fetch related products: {e}");
                    Vec::new()
                },
                |listing| {
                    listing
                        .items
                        .iter()
                        .filter(|p| p.id != product.id)
                        .take(RELATED_COUNT as usize)
                        .map(|p| ProductCardView::new(p, currency))
                        .collect()
                },
            )
        }
        None => Vec::new(),
    };

    Ok(ProductShowTemplate {
        page,
        product: ProductDetailView::new(&product, currency),
        is_favorite,
        related_products,
    })
}
