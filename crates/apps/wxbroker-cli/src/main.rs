//! wxbroker CLI binary entry point.

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

use wxbroker_api::CallbackQuery;
use wxbroker_cli::{
    cli::{CallbackArgs, Cli, Commands},
    commands,
    config::{default_config_path, CliConfig},
    context::BrokerContext,
    error::{CliError, CliResult},
    output::OutputFormat,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        print_error(&e);
        std::process::exit(e.exit_code());
    }
}

/// Log to stderr when `--verbose` or `RUST_LOG` asks for it.
fn init_logging(verbose: bool) {
    let has_rust_log = std::env::var("RUST_LOG").is_ok();
    if !verbose && !has_rust_log {
        return;
    }
    let mut filter = EnvFilter::from_default_env();
    if verbose {
        if let Ok(directive) = "wxbroker=debug".parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Print a user-friendly error message with a recovery hint.
fn print_error(e: &CliError) {
    eprintln!("{}: {}", "Error".red().bold(), e);

    if let Some(suggestion) = e.suggestion() {
        eprintln!("{}: {}", "Hint".cyan(), suggestion);
    }
}

fn callback_query(args: CallbackArgs) -> CallbackQuery {
    CallbackQuery {
        timestamp: args.timestamp,
        nonce: args.nonce,
        msg_signature: args.msg_signature,
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    // Load configuration
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = CliConfig::load(&config_path)?;

    // Get output format
    let format: OutputFormat = cli.format.into();

    // Dispatch command
    let output = match cli.command {
        // Offline commands
        Commands::Sign {
            fields,
            xml,
            key,
            sign_type,
        } => commands::sign(
            &config,
            format,
            &fields,
            xml.as_deref(),
            key,
            sign_type.map(Into::into),
        )?,

        Commands::Verify {
            input,
            key,
            sign_type,
        } => commands::verify(&config, format, &input, key, sign_type.map(Into::into))?,

        Commands::DecryptData {
            data,
            session_key,
            iv,
            appid,
        } => commands::decrypt_data(&config, format, &data, &session_key, &iv, appid)?,

        // Commands using the account clients
        Commands::Decrypt { input, query } => {
            let ctx = BrokerContext::from_config(config)?;
            commands::decrypt(&ctx, format, &input, &callback_query(query))?
        }

        Commands::Callback { input, query } => {
            let ctx = BrokerContext::from_config(config)?;
            commands::callback(&ctx, format, &input, &callback_query(query))?
        }

        Commands::Notify { input } => {
            let ctx = BrokerContext::from_config(config)?;
            commands::notify(&ctx, format, &input)?
        }

        Commands::Token { target } => {
            let ctx = BrokerContext::from_config(config)?;
            commands::token(&ctx, format, target).await?
        }

        Commands::AuthorizeUrl { kind } => {
            let ctx = BrokerContext::from_config(config)?;
            commands::authorize_url(&ctx, format, kind).await?
        }
    };

    // Print output
    println!("{}", output);

    Ok(())
}
