use super::utils;

use crate::{prelude::*, repository::RepositoryError};

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Router,
};
use tower_sessions::Session;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    return router
        .route("/favorites/:game_id/add", post(add))
        .route("/favorites/:game_id/remove", post(remove));
}

async fn add(
    session: Session,
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> Result<Response> {
    let Some(user) = utils::logged_in_user(&state, &session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    match state.repo.add_to_favorites(&user.username, game_id).await {
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
        .remove_from_favorites(&user.username, game_id)
        .await?;

    return Ok(Redirect::to(&format!("/games/{game_id}")).into_response());
}
