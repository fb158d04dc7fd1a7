//! Verify a signed merchant record command.

use tracing::debug;
use wxbroker_crypto::{verify as verify_fields, SignType};
use wxbroker_wire::StructuredMessage;

use crate::commands::{read_input, signing_key};
use crate::config::{parse_sign_type, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Render, VerifyOutput};

/// Execute the verify command.
///
/// The sign type comes from the flag, then the record's own `sign_type`
/// field, then the `[merchant]` section.
pub fn verify(
    config: &CliConfig,
    format: OutputFormat,
    input: &str,
    key: Option<String>,
    sign_type: Option<SignType>,
) -> CliResult<String> {
    let record = StructuredMessage::from_xml(&read_input(input)?)?;
    let signature = record
        .get("sign")
        .ok_or_else(|| CliError::user("record has no sign field"))?;

    let sign_type = match sign_type {
        Some(sign_type) => sign_type,
        None => match record
            .get("sign_type")
            .or_else(|| config.merchant.as_ref().and_then(|m| m.sign_type.as_deref()))
        {
            Some(name) => parse_sign_type(name)?,
            None => SignType::default(),
        },
    };
    debug!(sign_type = %sign_type, fields = record.len(), "Verifying record");

    let key = signing_key(config, key)?;
    if !verify_fields(&record, signature, key.expose(), sign_type) {
        return Err(CliError::InvalidSignature);
    }

    let output = VerifyOutput {
        sign_type: sign_type.to_string(),
        sign: signature.to_string(),
        fields: record.len() - 1,
    };
    Ok(output.render(format))
}
