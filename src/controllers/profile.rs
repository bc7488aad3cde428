use super::utils;

use crate::{
    models::{Game, Review},
    prelude::*,
};

use askama::Template;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tower_sessions::Session;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    return router.route("/profile/:username", get(profile));
}

struct ReviewLine {
    review: Review,
    game_title: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    user: Option<String>,
    profile_name: String,
    reviews: Vec<ReviewLine>,
    wishlist: Vec<Game>,
    favorites: Vec<Game>,
}

async fn profile(
    session: Session,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response> {
    let Some(viewer) = utils::logged_in_user(&state, &session).await? else {
        return Ok(Redirect::to("/login").into_response());
    };

    let Some(profile_user) = state.repo.user_by_name(&username).await? else {
        return Ok((StatusCode::NOT_FOUND, "User not found").into_response());
    };

    let mut reviews = Vec::new();
    for review in state.repo.reviews_by_user(&profile_user.username).await? {
        let game_title = state
            .repo
            .game_by_id(review.game_id)
            .await?
            .map(|g| g.title)
            .unwrap_or_else(|| format!("Game #{}", review.game_id));
        reviews.push(ReviewLine { review, game_title });
    }

    // Collections shown are always the viewer's own.
    let wishlist = state.repo.wishlist(&viewer.username).await?;
    let favorites = state.repo.favorites(&viewer.username).await?;

    return Ok(ProfileTemplate {
        user: Some(viewer.username),
        profile_name: profile_user.username,
        reviews,
        wishlist,
        favorites,
    }
    .into_response());
}
