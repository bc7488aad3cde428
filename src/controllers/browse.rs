use super::utils;

use crate::{models::GameSummary, prelude::*};

use askama::Template;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

const PAGE_SIZE: i64 = 10;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    return router
        .route("/browse/:genre", get(browse).post(browse))
        .route("/browse/:genre/:page", get(browse_page).post(browse_page));
}

#[derive(Debug, Clone)]
struct GenreLink {
    name: String,
    href: String,
}

#[derive(Template)]
#[template(path = "browse.html")]
struct BrowseTemplate {
    user: Option<String>,
    games: Vec<GameSummary>,
    genres: Vec<GenreLink>,
    current_genre: String,
    current_page: i64,
    total_pages: i64,
    num_games: i64,
    prev_href: Option<String>,
    next_href: Option<String>,
}

/// The "Go to Page" form; non-numeric or out-of-range input is simply
/// ignored.
#[derive(Debug, Deserialize)]
struct GotoPage {
    goto_query: Option<String>,
}

async fn browse(
    session: Session,
    State(state): State<AppState>,
    Path(genre): Path<String>,
    form: Option<Form<GotoPage>>,
) -> Result<impl IntoResponse> {
    return render_page(session, state, genre, 1, form).await;
}

async fn browse_page(
    session: Session,
    State(state): State<AppState>,
    Path((genre, page)): Path<(String, i64)>,
    form: Option<Form<GotoPage>>,
) -> Result<impl IntoResponse> {
    return render_page(session, state, genre, page, form).await;
}

async fn render_page(
    session: Session,
    state: AppState,
    genre: String,
    page: i64,
    form: Option<Form<GotoPage>>,
) -> Result<BrowseTemplate> {
    // Sidebar links carry "_" for spaces; undo that before querying.
    let genre = genre.replace('_', " ");

    let num_games = state.repo.game_count_by_genre(&genre).await?;
    let total_pages = (num_games + PAGE_SIZE - 1) / PAGE_SIZE;

    let mut page = page.max(1);
    if let Some(Form(body)) = form {
        if let Some(requested) = body.goto_query.and_then(|q| q.trim().parse::<i64>().ok()) {
            if (1..=total_pages).contains(&requested) {
                page = requested;
            }
        }
    }

    let offset = (page - 1) * PAGE_SIZE;
    let games = state.repo.games_page(&genre, offset, PAGE_SIZE).await?;

    let genres = state
        .repo
        .genre_names()
        .await?
        .into_iter()
        .map(|name| GenreLink {
            href: format!("/browse/{}", name.replace(' ', "_")),
            name,
        })
        .collect();

    let genre_segment = genre.replace(' ', "_");
    let prev_href = (page > 1).then(|| format!("/browse/{genre_segment}/{}", page - 1));
    let next_href = (page < total_pages).then(|| format!("/browse/{genre_segment}/{}", page + 1));

    return Ok(BrowseTemplate {
        user: utils::current_user(&session)?,
        games,
        genres,
        current_genre: genre,
        current_page: page,
        total_pages,
        num_games,
        prev_href,
        next_href,
    });
}
