use super::utils;

use crate::{prelude::*, repository::RepositoryError};

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use askama::Template;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tower_sessions::Session;

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    return router
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout));
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    user: Option<String>,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    user: Option<String>,
    error: Option<String>,
    flash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisterForm {
    username: String,
    password: String,
    confirm_password: String,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn register_page(session: Session) -> Result<impl IntoResponse> {
    return Ok(RegisterTemplate {
        user: utils::current_user(&session)?,
        error: None,
    });
}

async fn register(
    session: Session,
    State(state): State<AppState>,
    Form(body): Form<RegisterForm>,
) -> Result<Response> {
    let render_error = |error: &str| RegisterTemplate {
        user: None,
        error: Some(error.to_string()),
    };

    if !length_in_bounds(body.username.trim()) {
        return Ok(render_error("Your username is too short").into_response());
    }
    if body.password != body.confirm_password {
        return Ok(render_error("Passwords must match").into_response());
    }
    if !length_in_bounds(&body.password) {
        return Ok(render_error("Your password is too short").into_response());
    }
    if !password_is_valid(&body.password) {
        return Ok(render_error(
            "Your password must be at least 4 characters, and contain an upper case letter, \
             a lower case letter and a digit",
        )
        .into_response());
    }

    let password_hash = hash_password(&body.password)?;

    match state.repo.add_user(&body.username, &password_hash).await {
        Ok(user) => {
            tracing::info!(username = %user.username, "registered new user");
            utils::set_flash(&session, "Thanks for registering")?;
            return Ok(Redirect::to("/login").into_response());
        }
        Err(RepositoryError::DuplicateUser(_)) => {
            return Ok(render_error(
                "That user name is already taken - please supply another",
            )
            .into_response());
        }
        Err(err) => return Err(err.into()),
    }
}

async fn login_page(session: Session) -> Result<impl IntoResponse> {
    return Ok(LoginTemplate {
        user: utils::current_user(&session)?,
        error: None,
        flash: utils::take_flash(&session)?,
    });
}

async fn login(
    session: Session,
    State(state): State<AppState>,
    Form(body): Form<LoginForm>,
) -> Result<Response> {
    let render_error = |error: &str| LoginTemplate {
        user: None,
        error: Some(error.to_string()),
        flash: None,
    };

    let Some(user) = state.repo.user_by_name(&body.username).await? else {
        return Ok(render_error("Username not recognised").into_response());
    };

    if !verify_password(&user.password_hash, &body.password) {
        return Ok(render_error(
            "Password does not match supplied user name - please check and try again",
        )
        .into_response());
    }

    session.clear();
    session.insert(utils::SESSION_USER_KEY, user.username.clone())?;
    tracing::info!(username = %user.username, "user logged in");

    return Ok(Redirect::to("/").into_response());
}

async fn logout(session: Session) -> Result<impl IntoResponse> {
    session.clear();
    return Ok(Redirect::to("/"));
}

/// Usernames and passwords are both bounded at 4 to 25 chars.
fn length_in_bounds(value: &str) -> bool {
    return (4..=25).contains(&value.len());
}

/// At least 4 chars with an upper case letter, a lower case letter and
/// a digit.
fn password_is_valid(password: &str) -> bool {
    return password.len() >= 4
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit());
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("password hashing failed: {err}"))?;
    return Ok(hash.to_string());
}

fn verify_password(stored_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    return Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok();
}
