use super::utils;

use crate::{models::Game, prelude::*, repository::RepositoryError};

use askama::Template;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use tower_sessions::Session;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    return router
        .route("/wishlist", get(wishlist_page))
        .route("/wishlist/:game_id/add", post(add))
        .route("/wishlist/:game_id/remove", post(remove));
}

#[derive(Template)]
#[template(path = "wishlist.html")]
struct WishlistTemplate {
    user: Option<String>,
    games: Vec<Game>,
}

async fn wishlist_page(session: Session, State(state): State<AppState>) -> Result<Response> {
    let Some(user) = utils::logged_in_user(&state, &session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let games = state.repo.wishlist(&user.username).await?;

    return Ok(WishlistTemplate {
        user: Some(user.username),
        games,
    }
    .into_response());
}

async fn add(
    session: Session,
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> Result<Response> {
    let Some(user) = utils::logged_in_user(&state, &session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    match state.repo.add_to_wishlist(&user.username, game_id).await {
        Ok(()) => {}
        Err(RepositoryError::UnknownGame(_)) => {
            return Ok((StatusCode::NOT_FOUND, "Game not found").into_response());
        }
        Err(err) => return Err(err.into()),
    }

    return Ok(Redirect::to(&format!("/games/{game_id}")).into_response());
}

async fn remove(
    session: Session,
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> Result<Response> {
    let Some(user) = utils::logged_in_user(&state, &session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    state
        .repo
        .remove_from_wishlist(&user.username, game_id)
        .await?;

    return Ok(Redirect::to(&format!("/games/{game_id}")).into_response());
}
