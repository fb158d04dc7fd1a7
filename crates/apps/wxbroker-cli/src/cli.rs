//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use wxbroker_api::AuthType;
use wxbroker_crypto::SignType;

use crate::output::OutputFormat;

/// WeChat open platform broker CLI.
#[derive(Parser, Debug)]
#[command(name = "wxbroker")]
#[command(version)]
#[command(about = "Sign, verify and decrypt platform messages; fetch credentials")]
#[command(
    long_about = "wxbroker works with WeChat open platform accounts: merchant payments, third-party components and apps.\n\nCredentials are read from the config file (see --config) and cached between runs."
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "WXBROKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (human or json).
    #[arg(short, long, global = true, default_value = "human")]
    pub format: OutputFormatArg,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Output format argument for clap.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormatArg {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Signature algorithm argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SignTypeArg {
    #[value(name = "MD5", alias = "md5")]
    Md5,
    #[value(name = "HMAC-SHA256", alias = "hmac-sha256")]
    HmacSha256,
}

impl From<SignTypeArg> for SignType {
    fn from(arg: SignTypeArg) -> Self {
        match arg {
            SignTypeArg::Md5 => SignType::Md5,
            SignTypeArg::HmacSha256 => SignType::HmacSha256,
        }
    }
}

/// Account types offered on the component login page.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum AuthTypeArg {
    /// Official accounts only.
    Official,
    /// Mini programs only.
    Mini,
    /// Both.
    #[default]
    All,
}

impl From<AuthTypeArg> for AuthType {
    fn from(arg: AuthTypeArg) -> Self {
        match arg {
            AuthTypeArg::Official => AuthType::OfficialAccount,
            AuthTypeArg::Mini => AuthType::MiniProgram,
            AuthTypeArg::All => AuthType::All,
        }
    }
}

/// Signature parameters from a callback URL.
#[derive(clap::Args, Debug, Clone)]
pub struct CallbackArgs {
    /// `timestamp` query parameter.
    #[arg(long)]
    pub timestamp: String,

    /// `nonce` query parameter.
    #[arg(long)]
    pub nonce: String,

    /// `msg_signature` query parameter.
    #[arg(long)]
    pub msg_signature: String,
}

/// CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    // =========================================================================
    // Merchant messages
    // =========================================================================
    /// Sign a set of fields with the merchant key.
    ///
    /// Fields come as FIELD=VALUE arguments, from an XML record, or both.
    Sign {
        /// Fields to sign, as FIELD=VALUE.
        fields: Vec<String>,

        /// Read fields from an XML record ("-" for stdin).
        #[arg(long)]
        xml: Option<String>,

        /// Signing key (defaults to the [merchant] key).
        #[arg(long, env = "WXBROKER_SIGN_KEY", hide_env_values = true)]
        key: Option<String>,

        /// Signature algorithm (defaults to the [merchant] sign_type).
        #[arg(long, value_enum)]
        sign_type: Option<SignTypeArg>,
    },

    /// Check the `sign` field of an XML record.
    Verify {
        /// XML file ("-" for stdin).
        input: String,

        /// Signing key (defaults to the [merchant] key).
        #[arg(long, env = "WXBROKER_SIGN_KEY", hide_env_values = true)]
        key: Option<String>,

        /// Signature algorithm (defaults to the record's sign_type, then MD5).
        #[arg(long, value_enum)]
        sign_type: Option<SignTypeArg>,
    },

    /// Verify a payment notification and print the acknowledgment.
    Notify {
        /// Notification body file ("-" for stdin).
        input: String,
    },

    // =========================================================================
    // Encrypted messages
    // =========================================================================
    /// Verify and decrypt an encrypted callback body.
    Decrypt {
        /// Callback body file ("-" for stdin).
        input: String,

        #[command(flatten)]
        query: CallbackArgs,
    },

    /// Decrypt mini program user data and check its watermark.
    DecryptData {
        /// Base64 encrypted data.
        #[arg(long)]
        data: String,

        /// Base64 session key.
        #[arg(long)]
        session_key: String,

        /// Base64 IV.
        #[arg(long)]
        iv: String,

        /// Expected watermark appid (defaults to the [app] appid).
        #[arg(long)]
        appid: Option<String>,
    },

    /// Accept a component callback, storing any verify ticket.
    Callback {
        /// Callback body file ("-" for stdin).
        input: String,

        #[command(flatten)]
        query: CallbackArgs,
    },

    // =========================================================================
    // Credentials
    // =========================================================================
    /// Print an access token, fetching it if the cache has none.
    Token {
        #[command(subcommand)]
        target: TokenTarget,
    },

    /// Build an authorization URL.
    AuthorizeUrl {
        #[command(subcommand)]
        kind: AuthorizeKind,
    },
}

/// Which token to print.
#[derive(Subcommand, Debug)]
pub enum TokenTarget {
    /// The [app] account's access token.
    App {
        /// Drop the cached token first.
        #[arg(long)]
        refresh: bool,
    },

    /// The component access token.
    Component {
        /// Drop the cached token first.
        #[arg(long)]
        refresh: bool,
    },

    /// An authorized account's access token.
    Authorizer {
        /// Authorizer appid.
        #[arg(long)]
        appid: String,

        /// Authorizer refresh token.
        #[arg(long, env = "WXBROKER_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,

        /// Drop the cached token first.
        #[arg(long)]
        refresh: bool,
    },
}

/// Which authorization URL to build.
#[derive(Subcommand, Debug)]
pub enum AuthorizeKind {
    /// Component login page (creates a pre-auth code).
    Component {
        #[arg(long)]
        redirect_uri: String,

        /// Account types to offer.
        #[arg(long, value_enum, default_value = "all")]
        auth_type: AuthTypeArg,

        /// Offer only this account.
        #[arg(long)]
        biz_appid: Option<String>,

        #[arg(long)]
        state: Option<String>,
    },

    /// In-app user OAuth.
    ///
    /// With --appid the URL is issued on behalf of that authorized account
    /// through the component; otherwise the [app] account is used.
    Oauth {
        #[arg(long)]
        redirect_uri: String,

        #[arg(long, default_value = "snsapi_base")]
        scope: String,

        #[arg(long, default_value = "")]
        state: String,

        /// Authorized account appid.
        #[arg(long)]
        appid: Option<String>,
    },

    /// Website QR code login.
    Qrconnect {
        #[arg(long)]
        redirect_uri: String,

        #[arg(long, default_value = "snsapi_login")]
        scope: String,

        #[arg(long, default_value = "")]
        state: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_sign() {
        let cli = Cli::parse_from([
            "wxbroker",
            "sign",
            "appid=wx1",
            "nonce_str=abc",
            "--key",
            "k",
            "--sign-type",
            "HMAC-SHA256",
        ]);
        match cli.command {
            Commands::Sign {
                fields,
                key,
                sign_type,
                xml,
            } => {
                assert_eq!(fields, vec!["appid=wx1", "nonce_str=abc"]);
                assert_eq!(key.as_deref(), Some("k"));
                assert!(matches!(sign_type, Some(SignTypeArg::HmacSha256)));
                assert!(xml.is_none());
            }
            _ => panic!("Expected Sign command"),
        }
    }

    #[test]
    fn test_cli_parse_decrypt() {
        let cli = Cli::parse_from([
            "wxbroker",
            "decrypt",
            "-",
            "--timestamp",
            "1409304348",
            "--nonce",
            "xxxxxx",
            "--msg-signature",
            "sig",
        ]);
        match cli.command {
            Commands::Decrypt { input, query } => {
                assert_eq!(input, "-");
                assert_eq!(query.timestamp, "1409304348");
                assert_eq!(query.msg_signature, "sig");
            }
            _ => panic!("Expected Decrypt command"),
        }
    }

    #[test]
    fn test_cli_parse_token_authorizer() {
        let cli = Cli::parse_from([
            "wxbroker",
            "token",
            "authorizer",
            "--appid",
            "wxabc",
            "--refresh-token",
            "refresh@@@x",
        ]);
        match cli.command {
            Commands::Token {
                target:
                    TokenTarget::Authorizer {
                        appid,
                        refresh_token,
                        refresh,
                    },
            } => {
                assert_eq!(appid, "wxabc");
                assert_eq!(refresh_token, "refresh@@@x");
                assert!(!refresh);
            }
            _ => panic!("Expected Token authorizer command"),
        }
    }

    #[test]
    fn test_cli_parse_authorize_url_defaults() {
        let cli = Cli::parse_from([
            "wxbroker",
            "--format",
            "json",
            "authorize-url",
            "oauth",
            "--redirect-uri",
            "https://example.com/cb",
        ]);
        assert!(matches!(cli.format, OutputFormatArg::Json));
        match cli.command {
            Commands::AuthorizeUrl {
                kind: AuthorizeKind::Oauth { scope, state, appid, .. },
            } => {
                assert_eq!(scope, "snsapi_base");
                assert_eq!(state, "");
                assert!(appid.is_none());
            }
            _ => panic!("Expected AuthorizeUrl oauth command"),
        }
    }

    #[test]
    fn test_cli_verify_app() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
