//! Explicit identity passed to every remote call.
//!
//! There is no ambient "current user": callers hand an [`Identity`] to each
//! operation, so concurrent tasks can never observe each other's identity.

use std::fmt;

/// Id of the well-known system user all automated work runs as.
pub const SYSTEM_USER_ID: u64 = 1;

/// A user on whose behalf remote operations are performed.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: u64,
    pub slug: String,
    token: Option<String>,
}

impl Identity {
    pub fn new(user_id: u64, slug: impl Into<String>) -> Self {
        Self {
            user_id,
            slug: slug.into(),
            token: None,
        }
    }

    /// Attach the access token used to authenticate as this user.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

// The token never appears in logs.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &self.user_id)
            .field("slug", &self.slug)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.slug, self.user_id)
    }
}
