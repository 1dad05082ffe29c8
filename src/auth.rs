//! Bearer token storage shared by the REST client and the realtime connection.

use std::sync::{PoisonError, RwLock};

use crate::storage::StoreError;

/// Where the current bearer token lives.
///
/// `load_token` is async because a token may have to be fetched or refreshed
/// before use; the connection awaits it before connecting.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn load_token(&self) -> Option<String>;

    /// Persist a token.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backing storage cannot be written.
    fn save_token(&self, token: &str) -> Result<(), StoreError>;

    /// Forget the token.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the backing storage cannot be written.
    fn clear_token(&self) -> Result<(), StoreError>;
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self { token: RwLock::new(token) }
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn save_token(&self, token: &str) -> Result<(), StoreError> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_owned());
        Ok(())
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
