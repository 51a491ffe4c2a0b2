//! API-key credential provider.

use async_trait::async_trait;

use super::{ApiError, Credential, CredentialProvider};

/// Hands out a static API key.
#[derive(Clone)]
pub struct ApiKeyProvider {
    api_key: String,
}

impl ApiKeyProvider {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.trim().to_string(),
        }
    }
}

#[async_trait]
impl CredentialProvider for ApiKeyProvider {
    async fn ensure_valid(&self) -> Result<Credential, ApiError> {
        if self.api_key.is_empty() {
            return Err(ApiError::Credential("API key is empty".to_string()));
        }
        Ok(Credential::ApiKey(self.api_key.clone()))
    }
}
