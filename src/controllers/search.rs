use super::utils;

use crate::{
    models::Game,
    prelude::*,
    repository::{PriceRange, SearchFilter},
};

use askama::Template;
use axum::{extract::State, response::IntoResponse, routing::get, Form, Router};
use tower_sessions::Session;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    return router.route("/search", get(search_page).post(search));
}

#[derive(Template)]
#[template(path = "search.html")]
struct SearchTemplate {
    user: Option<String>,
    query: Option<String>,
    results: Vec<Game>,
}

#[derive(Debug, Default)]
struct SearchForm {
    search_query: String,
    filter: String,
    price_ranges: Vec<PriceRange>,
}

impl SearchForm {
    /// The price checkboxes submit one `price_filter` pair per checked
    /// band, so the form is read as raw pairs rather than a flat
    /// struct. Malformed bands are dropped.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "search_query" => form.search_query = value,
                "filter" => form.filter = value,
                "price_filter" => form.price_ranges.extend(PriceRange::parse(&value)),
                _ => {}
            }
        }
        return form;
    }
}

async fn search_page(session: Session) -> Result<impl IntoResponse> {
    return Ok(SearchTemplate {
        user: utils::current_user(&session)?,
        query: None,
        results: Vec::new(),
    });
}

async fn search(
    session: Session,
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<impl IntoResponse> {
    let body = SearchForm::from_pairs(pairs);

    // An unrecognized filter yields an empty result set, never an
    // error page.
    let results = match SearchFilter::parse(&body.filter) {
        Some(filter) => {
            state
                .repo
                .search_games(&body.search_query, filter, &body.price_ranges)
                .await?
        }
        None => Vec::new(),
    };

    return Ok(SearchTemplate {
        user: utils::current_user(&session)?,
        query: Some(body.search_query),
        results,
    });
}
