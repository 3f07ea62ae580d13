/// Identity of the signed-in user
///
/// Sign-in itself happens elsewhere; services only ask who is signed in.
use std::sync::RwLock;

pub trait AuthProvider: Send + Sync {
    /// Auth subject id of the signed-in user, `None` when anonymous
    fn current_user_id(&self) -> Option<String>;

    /// Bearer token for the signed-in user, read at request time
    fn access_token(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: Option<String>,
}

/// In-process holder of the current session
#[derive(Debug, Default)]
pub struct SessionStore {
    session: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let store = Self::new();
        store.sign_in(user_id, None);
        store
    }

    pub fn sign_in(&self, user_id: impl Into<String>, access_token: Option<String>) {
        let session = Session {
            user_id: user_id.into(),
            access_token,
        };
        tracing::info!(user_id = %session.user_id, "Session started");
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
    }

    pub fn sign_out(&self) {
        if let Some(session) = self
            .session
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            tracing::info!(user_id = %session.user_id, "Session ended");
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

}

impl AuthProvider for SessionStore {
    fn current_user_id(&self) -> Option<String> {
        self.session().map(|s| s.user_id)
    }

    fn access_token(&self) -> Option<String> {
        self.session().and_then(|s| s.access_token)
    }
}
