mod auth;
mod browse;
mod favorites;
mod game;
mod profile;
mod search;
mod utils;
mod wishlist;

use crate::{models::Game, prelude::*};

use askama::Template;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use rand::seq::SliceRandom;
use tower_sessions::Session;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    let router = auth::add_routes(router);
    let router = browse::add_routes(router);
    let router = search::add_routes(router);
    let router = game::add_routes(router);
    let router = wishlist::add_routes(router);
    let router = favorites::add_routes(router);
    let router = profile::add_routes(router);

    return router
        .route("/", get(home))
        .route("/health", get(|| async { StatusCode::NO_CONTENT }));
}

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    user: Option<String>,
    game: Option<Game>,
}

async fn home(session: Session, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let user = utils::current_user(&session)?;

    // Spotlight one random game on the landing page.
    let games = state.repo.all_games().await?;
    let game = games.choose(&mut rand::thread_rng()).cloned();

    return Ok(HomeTemplate { user, game });
}
