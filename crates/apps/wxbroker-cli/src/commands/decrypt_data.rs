//! Decrypt mini program user data command.

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{DecryptDataOutput, OutputFormat, Render};

/// Execute the decrypt-data command.
///
/// The watermark must name `appid`, or the `[app]` appid when none is given.
pub fn decrypt_data(
    config: &CliConfig,
    format: OutputFormat,
    data: &str,
    session_key: &str,
    iv: &str,
    appid: Option<String>,
) -> CliResult<String> {
    let appid = match appid {
        Some(appid) => appid,
        None => config
            .app
            .as_ref()
            .map(|app| app.appid.clone())
            .ok_or_else(|| CliError::user("no --appid given and no [app] section configured"))?,
    };

    let data = wxbroker_crypto::decrypt_data(data, session_key, iv, &appid)?;
    let output = DecryptDataOutput { appid, data };
    Ok(output.render(format))
}
