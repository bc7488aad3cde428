use crate::{models::User, prelude::*};

use tower_sessions::Session;

pub const SESSION_USER_KEY: &str = "user_name";
const FLASH_KEY: &str = "flash";

/// Username from the session cookie, if logged in.
pub fn current_user(session: &Session) -> Result<Option<String>> {
    return Ok(session.get::<String>(SESSION_USER_KEY)?);
}

/// Full user record for the session, or None when logged out (or when
/// the session references a user the repository no longer knows).
pub async fn logged_in_user(state: &AppState, session: &Session) -> Result<Option<User>> {
    let Some(username) = current_user(session)? else {
        return Ok(None);
    };
    return Ok(state.repo.user_by_name(&username).await?);
}

/// One-shot message carried across a redirect.
pub fn set_flash(session: &Session, message: &str) -> Result {
    session.insert(FLASH_KEY, message.to_string())?;
    return Ok(());
}

pub fn take_flash(session: &Session) -> Result<Option<String>> {
    return Ok(session.remove::<String>(FLASH_KEY)?);
}
