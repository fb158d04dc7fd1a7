//! CLI command implementations.

pub mod authorize_url;
pub mod callback;
pub mod decrypt;
pub mod decrypt_data;
pub mod notify;
pub mod sign;
pub mod token;
pub mod verify;

// Re-export command handlers
pub use authorize_url::authorize_url;
pub use callback::callback;
pub use decrypt::decrypt;
pub use decrypt_data::decrypt_data;
pub use notify::notify;
pub use sign::sign;
pub use token::token;
pub use verify::verify;

use std::io::Read;

use wxbroker_crypto::Secret;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Read a message body from a file, or from stdin when `input` is `-`.
pub fn read_input(input: &str) -> CliResult<String> {
    if input == "-" {
        let mut body = String::new();
        std::io::stdin().read_to_string(&mut body)?;
        Ok(body)
    } else {
        std::fs::read_to_string(input)
            .map_err(|e| CliError::user(format!("cannot read {}: {}", input, e)))
    }
}

/// The explicit key, else the `[merchant]` key.
pub(crate) fn signing_key(config: &CliConfig, key: Option<String>) -> CliResult<Secret> {
    match key {
        Some(key) => Ok(Secret::new(key)),
        None => config
            .merchant
            .as_ref()
            .map(|merchant| merchant.key.clone())
            .ok_or_else(|| CliError::user("no --key given and no [merchant] section configured")),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use wxbroker_test_utils::{
        dyn_transport, MockTransport, TEST_APPID, TEST_APP_SECRET, TEST_CALLBACK_TOKEN,
        TEST_COMPONENT_APPID, TEST_COMPONENT_SECRET, TEST_ENCODING_AES_KEY, TEST_MCH_ID,
        TEST_MERCHANT_KEY,
    };

    use crate::config::{AppSection, CacheBackendKind, CliConfig, ComponentSection, MerchantSection};
    use crate::context::BrokerContext;

    /// Config with every account section filled from the shared fixtures.
    pub fn full_config() -> CliConfig {
        let mut config = CliConfig::default();
        config.cache.backend = CacheBackendKind::Memory;
        config.app = Some(AppSection {
            appid: TEST_APPID.into(),
            secret: TEST_APP_SECRET.into(),
        });
        config.component = Some(ComponentSection {
            appid: TEST_COMPONENT_APPID.into(),
            secret: TEST_COMPONENT_SECRET.into(),
            token: TEST_CALLBACK_TOKEN.into(),
            encoding_aes_key: TEST_ENCODING_AES_KEY.into(),
        });
        config.merchant = Some(MerchantSection {
            appid: TEST_APPID.into(),
            mch_id: TEST_MCH_ID.into(),
            key: TEST_MERCHANT_KEY.into(),
            sign_type: None,
            trade_type: None,
        });
        config
    }

    pub fn context(mock: &MockTransport) -> BrokerContext {
        BrokerContext::with_transport(full_config(), dyn_transport(mock)).unwrap()
    }

    pub fn input_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    pub fn path_of(file: &NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }
}
