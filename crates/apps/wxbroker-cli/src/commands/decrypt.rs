//! Decrypt a component callback body command.

use wxbroker_api::CallbackQuery;

use crate::commands::read_input;
use crate::context::BrokerContext;
use crate::error::CliResult;
use crate::output::{fields_of, DecryptOutput, OutputFormat, Render};

/// Execute the decrypt command.
///
/// Only verifies and decrypts; nothing is stored.
pub fn decrypt(
    ctx: &BrokerContext,
    format: OutputFormat,
    input: &str,
    query: &CallbackQuery,
) -> CliResult<String> {
    let body = read_input(input)?;
    let message = ctx.component()?.decrypt_callback(&body, query)?;

    let output = DecryptOutput {
        fields: fields_of(&message),
        xml: message.to_xml()?,
    };
    Ok(output.render(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context, input_file, path_of};
    use crate::error::CliError;
    use serde_json::Value;
    use wxbroker_api::ApiError;
    use wxbroker_cache::CredentialKind;
    use wxbroker_test_utils::{
        encrypted_callback, verify_ticket_push, MockTransport, TEST_COMPONENT_APPID,
    };

    #[test]
    fn test_decrypt_shows_fields_without_storing() {
        let ctx = context(&MockTransport::new());
        let (body, query) = encrypted_callback(&verify_ticket_push("ticket@@@1"), "1413192605", "n1");
        let file = input_file(&body);

        let output = decrypt(&ctx, OutputFormat::Json, &path_of(&file), &query).unwrap();
        let json: Value = serde_json::from_str(&output).unwrap();
        let fields = json["fields"].as_array().unwrap();
        assert!(fields
            .iter()
            .any(|f| f["name"] == "ComponentVerifyTicket" && f["value"] == "ticket@@@1"));

        let scope = ctx.broker.scope(TEST_COMPONENT_APPID, CredentialKind::VerifyTicket);
        assert!(ctx.broker.peek(&scope).unwrap().is_none());
    }

    #[test]
    fn test_decrypt_rejects_bad_signature() {
        let ctx = context(&MockTransport::new());
        let (body, mut query) = encrypted_callback(&verify_ticket_push("t"), "1413192605", "n1");
        query.msg_signature = "0".repeat(40);
        let file = input_file(&body);

        let err = decrypt(&ctx, OutputFormat::Human, &path_of(&file), &query).unwrap_err();
        assert!(matches!(err, CliError::Api(ApiError::Integrity(_))));
        assert_eq!(err.exit_code(), 4);
    }
}
