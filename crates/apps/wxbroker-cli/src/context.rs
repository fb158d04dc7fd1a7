//! Client context for CLI operations.

use std::sync::Arc;

use tracing::debug;
use wxbroker_api::{
    ApiError, ComponentClient, HttpTransport, MerchantClient, SecretAppClient, Transport,
};
use wxbroker_cache::{CacheBackend, CredentialBroker, FileCache, MemoryCache};

use crate::config::{CacheBackendKind, CliConfig};
use crate::error::CliResult;

/// Transport, credential broker and configuration shared by commands.
pub struct BrokerContext {
    /// Configuration.
    pub config: CliConfig,
    /// Outbound HTTP.
    pub transport: Arc<dyn Transport>,
    /// Credential cache.
    pub broker: Arc<CredentialBroker<ApiError>>,
}

impl BrokerContext {
    /// Build the context with the real HTTP transport.
    pub fn from_config(config: CliConfig) -> CliResult<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.http)?);
        Self::with_transport(config, transport)
    }

    /// Build the context around an existing transport.
    pub fn with_transport(config: CliConfig, transport: Arc<dyn Transport>) -> CliResult<Self> {
        let backend: Arc<dyn CacheBackend> = match config.cache.backend {
            CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
            CacheBackendKind::File => {
                let path = config.cache_path();
                debug!(path = %path.display(), "Opening credential cache");
                Arc::new(FileCache::open(path)?)
            }
        };
        let broker = Arc::new(
            CredentialBroker::new(backend).with_namespace(config.cache.namespace.clone()),
        );

        Ok(Self {
            config,
            transport,
            broker,
        })
    }

    /// Client for the `[app]` account.
    pub fn app(&self) -> CliResult<SecretAppClient> {
        Ok(SecretAppClient::new(
            self.config.app_config()?,
            Arc::clone(&self.transport),
            Arc::clone(&self.broker),
        )?)
    }

    /// Client for the `[component]` account.
    pub fn component(&self) -> CliResult<Arc<ComponentClient>> {
        Ok(Arc::new(ComponentClient::new(
            self.config.component_config()?,
            Arc::clone(&self.transport),
            Arc::clone(&self.broker),
        )?))
    }

    /// Client for the `[merchant]` account.
    pub fn merchant(&self) -> CliResult<MerchantClient> {
        Ok(MerchantClient::new(
            self.config.merchant_config()?,
            Arc::clone(&self.transport),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppSection, CacheBackendKind};
    use crate::error::CliError;
    use tempfile::TempDir;
    use wxbroker_api::AppClient;
    use wxbroker_cache::CredentialKind;
    use wxbroker_test_utils::{dyn_transport, MockTransport, TEST_APPID, TEST_APP_SECRET};

    fn file_config(temp_dir: &TempDir) -> CliConfig {
        let mut config = CliConfig::default();
        config.cache.path = Some(temp_dir.path().join("credentials.json"));
        config
    }

    #[test]
    fn test_missing_sections_are_config_errors() {
        let mut config = CliConfig::default();
        config.cache.backend = CacheBackendKind::Memory;
        let ctx = BrokerContext::with_transport(config, dyn_transport(&MockTransport::new())).unwrap();

        assert!(matches!(ctx.app(), Err(CliError::Config(_))));
        assert!(matches!(ctx.component(), Err(CliError::Config(_))));
        assert!(matches!(ctx.merchant(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_file_cache_is_shared_between_contexts() {
        let temp_dir = TempDir::new().unwrap();
        let mock = MockTransport::new();

        let first = BrokerContext::with_transport(file_config(&temp_dir), dyn_transport(&mock)).unwrap();
        first
            .broker
            .store(CredentialKind::SecretAppToken, TEST_APPID, "cached-token", Some(7200))
            .unwrap();

        let second = BrokerContext::with_transport(file_config(&temp_dir), dyn_transport(&mock)).unwrap();
        let scope = second.broker.scope(TEST_APPID, CredentialKind::SecretAppToken);
        assert_eq!(second.broker.peek(&scope).unwrap().unwrap().value, "cached-token");
    }

    #[tokio::test]
    async fn test_app_client_uses_cached_token() {
        let temp_dir = TempDir::new().unwrap();
        let mock = MockTransport::new();
        let mut config = file_config(&temp_dir);
        config.app = Some(AppSection {
            appid: TEST_APPID.into(),
            secret: TEST_APP_SECRET.into(),
        });

        let ctx = BrokerContext::with_transport(config, dyn_transport(&mock)).unwrap();
        ctx.broker
            .store(CredentialKind::SecretAppToken, TEST_APPID, "cached-token", Some(7200))
            .unwrap();

        assert_eq!(ctx.app().unwrap().access_token().await.unwrap(), "cached-token");
        assert!(mock.requests().is_empty());
    }
}
