//! App credential lookup.
//!
//! Credentials live outside this service; [`CredentialStore`] is the seam the
//! token issuer asks whether an app key / app secret pair exists and is active.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::CredentialConfig;

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether the pair exists and is active.
    async fn verify(&self, app_key: &str, app_secret: &str) -> Result<bool, CredentialStoreError>;
}

/// Store backed by credentials listed in configuration.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentialStore {
    secrets: HashMap<String, (String, bool)>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(credentials: &[CredentialConfig]) -> Self {
        let mut store = Self::new();
        for c in credentials {
            store.secrets.insert(c.app_key.clone(), (c.app_secret.clone(), c.active));
        }
        store
    }

    pub fn with_credential(mut self, app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        self.secrets.insert(app_key.into(), (app_secret.into(), true));
        self
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn verify(&self, app_key: &str, app_secret: &str) -> Result<bool, CredentialStoreError> {
        Ok(matches!(
            self.secrets.get(app_key),
            Some((secret, true)) if secret == app_secret
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_store_lookup() {
        let store = StaticCredentialStore::from_config(&[
            CredentialConfig {
                app_key: "blog".into(),
                app_secret: "pw".into(),
                active: true,
            },
            CredentialConfig {
                app_key: "retired".into(),
                app_secret: "pw".into(),
                active: false,
            },
        ]);

        assert!(store.verify("blog", "pw").await.unwrap());
        assert!(!store.verify("blog", "wrong").await.unwrap());
        assert!(!store.verify("retired", "pw").await.unwrap());
        assert!(!store.verify("unknown", "pw").await.unwrap());
    }
}
