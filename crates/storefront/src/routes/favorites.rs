//! Favorites route handlers.
//!
//! Favorites are stored in a signed cookie next to the cart and keyed the
//! same way, so a favorite can be moved to the cart as-is.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::SignedCookieJar;
use horeca_core::{Cart, CurrencyCode, FavoriteItem, Favorites};
use serde::Deserialize;
use tracing::instrument;

use super::cart::{LineForm, resolve_selection};
use super::layout::{HxRequest, PageContext, blank_as_none, format_money};
use crate::api::types::PLACEHOLDER_IMAGE;
use crate::cart_store;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::is_safe_redirect;
use crate::state::AppState;

/// Favorite display data.
#[derive(Clone, Debug)]
pub struct FavoriteView {
    pub product_id: String,
    pub size: String,
    pub variant: String,
    pub slug: String,
    pub name: String,
    pub options: Option<String>,
    pub image: String,
    pub price: String,
}

impl FavoriteView {
    fn new(item: &FavoriteItem, currency: CurrencyCode) -> Self {
        Self {
            product_id: item.key.product_id.to_string(),
            size: item.key.size.clone().unwrap_or_default(),
            variant: item.key.variant.clone().unwrap_or_default(),
            slug: item.slug.clone(),
            name: item.name.clone(),
            options: item.key.options_label(),
            image: item
                .image
                .clone()
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            price: format_money(item.price, currency),
        }
    }
}

fn views(favorites: &Favorites, currency: CurrencyCode) -> Vec<FavoriteView> {
    favorites
        .items()
        .iter()
        .map(|item| FavoriteView::new(item, currency))
        .collect()
}

/// Toggle favorite form data.
#[derive(Debug, Deserialize)]
pub struct ToggleFavoriteForm {
    pub slug: String,
    pub size: Option<String>,
    pub variant: Option<String>,
    /// Local page to return to for non-HTMX posts.
    pub return_to: Option<String>,
}

/// Move to cart form data.
#[derive(Debug, Deserialize)]
pub struct MoveToCartForm {
    pub product_id: String,
    pub size: Option<String>,
    pub variant: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub quantity: Option<u32>,
}

impl MoveToCartForm {
    fn line(&self) -> LineForm {
        LineForm {
            product_id: self.product_id.clone(),
            size: self.size.clone(),
            variant: self.variant.clone(),
        }
    }
}

/// Favorites page template.
#[derive(Template, WebTemplate)]
#[template(path = "favorites/show.html")]
pub struct FavoritesShowTemplate {
    pub page: PageContext,
    pub favorites: Vec<FavoriteView>,
}

/// Favorites list fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/favorites_items.html")]
pub struct FavoritesItemsTemplate {
    pub favorites: Vec<FavoriteView>,
}

/// Favorite toggle button fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/favorite_button.html")]
pub struct FavoriteButtonTemplate {
    pub slug: String,
    pub size: String,
    pub variant: String,
    pub is_favorite: bool,
}

/// Display favorites page.
#[instrument(skip(state, page, jar))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    jar: SignedCookieJar,
) -> FavoritesShowTemplate {
    let favorites: Favorites = cart_store::load(&jar);
    FavoritesShowTemplate {
        page,
        favorites: views(&favorites, state.config().currency),
    }
}

/// Add or remove a product from favorites.
#[instrument(skip(state, jar))]
pub async fn toggle(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    hx: HxRequest,
    Form(form): Form<ToggleFavoriteForm>,
) -> Result<Response> {
    let product = state.api().get_product(form.slug.trim()).await?;
    let key = resolve_selection(&product, form.size, form.variant, false)?;

    let button = FavoriteButtonTemplate {
        slug: product.slug.clone(),
        size: key.size.clone().unwrap_or_default(),
        variant: key.variant.clone().unwrap_or_default(),
        is_favorite: false,
    };

    let mut favorites: Favorites = cart_store::load(&jar);
    let is_favorite = favorites.toggle(FavoriteItem {
        price: product.price_for_variant(key.variant.as_deref()),
        key,
        slug: product.slug.clone(),
        name: product.name.clone(),
        image: product.images.first().cloned(),
    });
    add_breadcrumb(
        "favorites",
        if is_favorite {
            "Added to favorites"
        } else {
            "Removed from favorites"
        },
        Some(&[("product", product.slug.as_str())]),
    );

    let jar = cart_store::save(jar, &favorites, state.config().is_secure())?;

    if hx.0 {
        Ok((
            jar,
            AppendHeaders([("HX-Trigger", "favorites-updated")]),
            FavoriteButtonTemplate {
                is_favorite,
                ..button
            },
        )
            .into_response())
    } else {
        let target = form
            .return_to
            .filter(|t| is_safe_redirect(t))
            .unwrap_or_else(|| product_path(&product.slug));
        Ok((jar, Redirect::to(&target)).into_response())
    }
}

/// Detail page path for a product slug.
fn product_path(slug: &str) -> String {
    format!("/products/{}", urlencoding::encode(slug))
}

/// Remove a favorite.
#[instrument(skip(state, jar))]
pub async fn remove(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    hx: HxRequest,
    Form(form): Form<LineForm>,
) -> Result<Response> {
    let mut favorites: Favorites = cart_store::load(&jar);
    favorites.remove(&form.key());
    let jar = cart_store::save(jar, &favorites, state.config().is_secure())?;

    if hx.0 {
        Ok((
            jar,
            AppendHeaders([("HX-Trigger", "favorites-updated")]),
            FavoritesItemsTemplate {
                favorites: views(&favorites, state.config().currency),
            },
        )
            .into_response())
    } else {
        Ok((jar, Redirect::to("/favorites")).into_response())
    }
}

/// Move a favorite into the cart.
///
/// The cart is written first so a full cart leaves the favorite in place.
#[instrument(skip(state, jar))]
pub async fn move_to_cart(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    hx: HxRequest,
    Form(form): Form<MoveToCartForm>,
) -> Result<Response> {
    let key = form.line().key();
    let mut favorites: Favorites = cart_store::load(&jar);
    let item = favorites
        .get(&key)
        .cloned()
        .ok_or_else(|| AppError::NotFound("favorite".to_string()))?;

    let mut cart: Cart = cart_store::load(&jar);
    cart.add(item.to_cart_item(form.quantity.unwrap_or(1)))?;
    favorites.remove(&key);
    add_breadcrumb(
        "favorites",
        "Moved to cart",
        Some(&[("product", item.slug.as_str())]),
    );

    let secure = state.config().is_secure();
    let jar = cart_store::save(jar, &cart, secure)?;
    let jar = cart_store::save(jar, &favorites, secure)?;

    if hx.0 {
        Ok((
            jar,
            AppendHeaders([("HX-Trigger", "cart-updated, favorites-updated")]),
            FavoritesItemsTemplate {
                favorites: views(&favorites, state.config().currency),
            },
        )
            .into_response())
    } else {
        Ok((jar, Redirect::to("/cart")).into_response())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use horeca_core::{LineKey, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_favorite_view() {
        let item = FavoriteItem {
            key: LineKey::new(ProductId::new("p9"), Some("L"), None),
            slug: "apron".to_string(),
            name: "Chef Apron".to_string(),
            image: None,
            price: Decimal::new(1_995, 2),
        };
        let view = FavoriteView::new(&item, CurrencyCode::GBP);
        assert_eq!(view.price, "£19.95");
        assert_eq!(view.image, PLACEHOLDER_IMAGE);
        assert_eq!(view.size, "L");
        assert_eq!(view.variant, "");
        assert_eq!(view.options.as_deref(), Some("L"));
    }

    #[test]
    fn test_product_path_encodes_slug() {
        assert_eq!(product_path("chef-knife"), "/products/chef-knife");
        assert_eq!(product_path("pan 28/5"), "/products/pan%2028%2F5");
    }

    #[tokio::test]
    async fn test_move_form_accepts_blank_quantity() {
        use axum::{body::Body, extract::FromRequest, http::Request};

        let request = Request::post("/favorites/move-to-cart")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("product_id=p9&size=L&variant=&quantity="))
            .unwrap();
        let Form(form) = Form::<MoveToCartForm>::from_request(request, &())
            .await
            .unwrap();
        assert_eq!(form.quantity, None);
    }

    #[test]
    fn test_move_form_key() {
        let form = MoveToCartForm {
            product_id: "p9".to_string(),
            size: Some("L".to_string()),
            variant: Some(String::new()),
            quantity: None,
        };
        assert_eq!(
            form.line().key(),
            LineKey::new(ProductId::new("p9"), Some("L"), None)
        );
    }
}
