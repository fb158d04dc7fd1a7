//! Accept a component callback command.

use std::sync::{Arc, Mutex};

use wxbroker_api::callback::VERIFY_TICKET_INFO_TYPE;
use wxbroker_api::{CallbackQuery, ComponentCallbacks};

use crate::commands::read_input;
use crate::context::BrokerContext;
use crate::error::CliResult;
use crate::output::{fields_of, CallbackOutput, OutputFormat, Render};

/// Execute the callback command.
///
/// Runs the body through the same dispatch a web endpoint would, so a
/// pushed verify ticket lands in the credential cache.
pub fn callback(
    ctx: &BrokerContext,
    format: OutputFormat,
    input: &str,
    query: &CallbackQuery,
) -> CliResult<String> {
    let body = read_input(input)?;
    let component = ctx.component()?;
    let message = component.decrypt_callback(&body, query)?;
    let info_type = message.require("InfoType")?.to_string();

    let seen = Arc::new(Mutex::new(false));
    let mut callbacks = ComponentCallbacks::new(Arc::clone(&component));
    let flag = Arc::clone(&seen);
    callbacks.on(info_type.clone(), move |_| {
        if let Ok(mut seen) = flag.lock() {
            *seen = true;
        }
        Ok(())
    });
    let ack = callbacks.handle(&body, query)?;

    let dispatched = seen.lock().map(|seen| *seen).unwrap_or(false);
    let output = CallbackOutput {
        ticket_stored: dispatched && info_type == VERIFY_TICKET_INFO_TYPE,
        info_type,
        fields: fields_of(&message),
        ack: ack.to_string(),
    };
    Ok(output.render(format))
}
