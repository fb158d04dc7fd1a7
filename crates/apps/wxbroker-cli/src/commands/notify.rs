//! Verify a payment notification command.
//!
//! Failed payments are printed and acknowledged like successful ones.

use std::sync::Arc;

use wxbroker_api::PaymentNotifications;
use wxbroker_wire::StructuredMessage;

use crate::commands::read_input;
use crate::context::BrokerContext;
use crate::error::CliResult;
use crate::output::{fields_of, NotifyOutput, OutputFormat, Render};

/// Execute the notify command.
pub fn notify(ctx: &BrokerContext, format: OutputFormat, input: &str) -> CliResult<String> {
    let body = read_input(input)?;
    let merchant = Arc::new(ctx.merchant()?);
    let message: StructuredMessage = merchant.verify_notification(&body)?;

    let ack = PaymentNotifications::new(merchant).handle(&body)?;
    let output = NotifyOutput {
        out_trade_no: message.get("out_trade_no").unwrap_or_default().to_string(),
        result_code: message.get("result_code").unwrap_or_default().to_string(),
        fields: fields_of(&message),
        ack,
    };
    Ok(output.render(format))
}
