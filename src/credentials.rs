use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Session-scoped credentials. The token slot carries the serialized OAuth2
/// token for services that use one; it is never persisted by this crate.
#[derive(Clone, Debug, Default)]
pub struct TransientCredentials {
    pub username: String,
    pub password: String,
    pub token: Option<String>,
}

/// Shared handle to the credentials for one account. Clients read it on
/// every request, and `login` style operations refresh the token slot
/// through it.
#[derive(Clone, Default)]
pub struct CredentialsAccessor {
    inner: Arc<RwLock<TransientCredentials>>,
}

impl CredentialsAccessor {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> CredentialsAccessor {
        CredentialsAccessor {
            inner: Arc::new(RwLock::new(TransientCredentials {
                username: username.into(),
                password: password.into(),
                token: None,
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TransientCredentials> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, TransientCredentials> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn username(&self) -> String {
        self.read().username.clone()
    }

    pub fn password(&self) -> String {
        self.read().password.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        self.write().token = token;
    }

    pub fn snapshot(&self) -> TransientCredentials {
        self.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_slot_is_shared_between_clones() {
        let credentials = CredentialsAccessor::new("ann", "hunter2");
        let other = credentials.clone();
        credentials.set_token(Some("abc".to_string()));
        assert_eq!(other.token().as_deref(), Some("abc"));
        assert_eq!(other.username(), "ann");
    }
}
