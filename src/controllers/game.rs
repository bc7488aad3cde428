use super::utils;

use crate::{
    models::{Game, Review},
    prelude::*,
    repository::RepositoryError,
};

use askama::Template;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    return router
        .route("/games/:game_id", get(game_detail))
        .route("/games/:game_id/review", post(submit_review));
}

#[derive(Template)]
#[template(path = "game.html")]
struct GameTemplate {
    user: Option<String>,
    game: Game,
    reviews: Vec<Review>,
    average_rating: f64,
}

async fn game_detail(
    session: Session,
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> Result<Response> {
    let Some(game) = state.repo.game_by_id(game_id).await? else {
        return Ok((StatusCode::NOT_FOUND, "Game not found").into_response());
    };

    let reviews = state.repo.reviews_for_game(game_id).await?;
    let average_rating = state.repo.average_rating(game_id).await?;

    return Ok(GameTemplate {
        user: utils::current_user(&session)?,
        game,
        reviews,
        average_rating,
    }
    .into_response());
}

#[derive(Debug, Deserialize)]
struct ReviewForm {
    rating: i64,
    comment: String,
}

async fn submit_review(
    session: Session,
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
    Form(body): Form<ReviewForm>,
) -> Result<Response> {
    let Some(user) = utils::logged_in_user(&state, &session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    match state
        .repo
        .add_review(&user.username, game_id, body.rating, &body.comment)
        .await
    {
        Ok(_) => {}
        Err(RepositoryError::UnknownGame(_)) => {
            return Ok((StatusCode::NOT_FOUND, "Game not found").into_response());
        }
        Err(RepositoryError::InvalidRating(_)) => {
            return Ok((StatusCode::BAD_REQUEST, "Rating must be between 1 and 5").into_response());
        }
        Err(err) => return Err(err.into()),
    }

    return Ok(Redirect::to(&format!("/games/{game_id}")).into_response());
}
