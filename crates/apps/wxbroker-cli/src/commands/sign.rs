//! Sign merchant fields command.

use wxbroker_crypto::{sign as sign_fields, SignType};
use wxbroker_wire::StructuredMessage;

use crate::commands::{read_input, signing_key};
use crate::config::{parse_sign_type, CliConfig};
use crate::error::{CliError, CliResult};
use crate::output::{OutputFormat, Render, SignOutput};

/// Execute the sign command.
pub fn sign(
    config: &CliConfig,
    format: OutputFormat,
    fields: &[String],
    xml: Option<&str>,
    key: Option<String>,
    sign_type: Option<SignType>,
) -> CliResult<String> {
    let mut record = match xml {
        Some(input) => StructuredMessage::from_xml(&read_input(input)?)?,
        None => StructuredMessage::new(),
    };
    for field in fields {
        let (name, value) = field
            .split_once('=')
            .ok_or_else(|| CliError::user(format!("expected FIELD=VALUE, got '{}'", field)))?;
        if name.is_empty() {
            return Err(CliError::user(format!("empty field name in '{}'", field)));
        }
        record.insert(name, value);
    }
    if record.is_empty() {
        return Err(CliError::user("nothing to sign"));
    }

    let key = signing_key(config, key)?;
    let sign_type = resolve_sign_type(config, sign_type)?;
    let signature = sign_fields(&record, key.expose(), sign_type)?;
    record.insert("sign", &signature);

    let output = SignOutput {
        sign_type: sign_type.to_string(),
        sign: signature,
        xml: record.to_xml()?,
    };
    Ok(output.render(format))
}

/// The explicit sign type, else the `[merchant]` one, else MD5.
fn resolve_sign_type(config: &CliConfig, sign_type: Option<SignType>) -> CliResult<SignType> {
    if let Some(sign_type) = sign_type {
        return Ok(sign_type);
    }
    match config.merchant.as_ref().and_then(|m| m.sign_type.as_deref()) {
        Some(configured) => parse_sign_type(configured),
        None => Ok(SignType::default()),
    }
}
