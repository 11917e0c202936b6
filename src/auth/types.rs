//! Authenticated principal types.

use crate::db::UserProfile;

/// The resolved principal attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Public projection of the account, from the profile cache or the
    /// durable store.
    pub user: UserProfile,
    /// The session id embedded in the presented access token.
    pub session_id: String,
}
