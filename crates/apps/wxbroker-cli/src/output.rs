//! Output formatting for CLI.

use colored::Colorize;
use serde::Serialize;
use serde_json::{Map, Value};
use wxbroker_wire::StructuredMessage;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use 'human' or 'json'.", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Trait for renderable output.
pub trait Render {
    /// Render as human-readable string.
    fn render_human(&self) -> String;

    /// Render as JSON string.
    fn render_json(&self) -> String;

    /// Render in the specified format.
    fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Human => self.render_human(),
            OutputFormat::Json => self.render_json(),
        }
    }
}

/// One named field of a decoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

/// Fields of a message in name order.
pub fn fields_of(message: &StructuredMessage) -> Vec<Field> {
    message
        .iter()
        .map(|(name, value)| Field {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

fn render_fields(fields: &[Field]) -> Vec<String> {
    let width = fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
    fields
        .iter()
        .map(|f| {
            let name = format!("{:width$}", f.name, width = width);
            format!("  {}  {}", name.bold(), f.value)
        })
        .collect()
}

// =============================================================================
// Output Types
// =============================================================================

/// Output for sign command.
#[derive(Debug, Serialize)]
pub struct SignOutput {
    pub sign_type: String,
    pub sign: String,
    /// The record with its `sign` field set.
    pub xml: String,
}

impl Render for SignOutput {
    fn render_human(&self) -> String {
        format!(
            "{} {}\n{} {}\n\n{}",
            "Sign type:".bold(),
            self.sign_type,
            "Sign:".bold(),
            self.sign.green(),
            self.xml
        )
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Output for verify command.
#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub sign_type: String,
    pub sign: String,
    pub fields: usize,
}

impl Render for VerifyOutput {
    fn render_human(&self) -> String {
        format!(
            "{} {} over {} fields ({})",
            "Signature valid:".green().bold(),
            self.sign_type,
            self.fields,
            self.sign
        )
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Output for decrypt command.
#[derive(Debug, Serialize)]
pub struct DecryptOutput {
    pub fields: Vec<Field>,
    pub xml: String,
}

impl Render for DecryptOutput {
    fn render_human(&self) -> String {
        let mut lines = vec![format!("{}", "Decrypted message:".green().bold())];
        lines.extend(render_fields(&self.fields));
        lines.join("\n")
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Output for decrypt-data command.
#[derive(Debug, Serialize)]
pub struct DecryptDataOutput {
    /// Watermark appid that was checked.
    pub appid: String,
    pub data: Map<String, Value>,
}

impl Render for DecryptDataOutput {
    fn render_human(&self) -> String {
        let mut lines = vec![format!(
            "{} {}",
            "Watermark matches:".green().bold(),
            self.appid
        )];
        for (name, value) in &self.data {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            lines.push(format!("  {}  {}", name.bold(), value));
        }
        lines.join("\n")
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Output for callback command.
#[derive(Debug, Serialize)]
pub struct CallbackOutput {
    pub info_type: String,
    pub ticket_stored: bool,
    pub fields: Vec<Field>,
    /// Body to send back to the platform.
    pub ack: String,
}

impl Render for CallbackOutput {
    fn render_human(&self) -> String {
        let mut lines = vec![format!(
            "{} {}",
            "Callback accepted:".green().bold(),
            self.info_type
        )];
        if self.ticket_stored {
            lines.push(format!("{}", "Verify ticket stored".cyan()));
        }
        lines.extend(render_fields(&self.fields));
        lines.push(format!("{} {}", "Ack:".bold(), self.ack));
        lines.join("\n")
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Output for notify command.
#[derive(Debug, Serialize)]
pub struct NotifyOutput {
    pub out_trade_no: String,
    /// `SUCCESS` or `FAIL`.
    pub result_code: String,
    pub fields: Vec<Field>,
    /// Body to send back to the platform.
    pub ack: String,
}

impl Render for NotifyOutput {
    fn render_human(&self) -> String {
        let status = if self.result_code == "FAIL" {
            "Payment failed:".red().bold()
        } else {
            "Payment verified:".green().bold()
        };
        let mut lines = vec![format!("{} {}", status, self.out_trade_no)];
        lines.extend(render_fields(&self.fields));
        lines.push(format!("{}\n{}", "Ack:".bold(), self.ack));
        lines.join("\n")
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Output for token command.
#[derive(Debug, Serialize)]
pub struct TokenOutput {
    /// `app`, `component` or `authorizer`.
    pub kind: String,
    pub appid: String,
    pub access_token: String,
    /// Seconds until the cached token expires.
    pub expires_in: Option<u64>,
}

impl Render for TokenOutput {
    fn render_human(&self) -> String {
        let mut lines = vec![
            format!("{} {} ({})", "Access token for".bold(), self.appid, self.kind),
            format!("  {}", self.access_token.green()),
        ];
        if let Some(expires_in) = self.expires_in {
            lines.push(format!("  {} {}s", "Expires in:".dimmed(), expires_in));
        }
        lines.join("\n")
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Output for authorize-url command.
#[derive(Debug, Serialize)]
pub struct AuthorizeUrlOutput {
    pub kind: String,
    pub url: String,
}

impl Render for AuthorizeUrlOutput {
    fn render_human(&self) -> String {
        format!("{} ({})\n{}", "Authorization URL".bold(), self.kind, self.url)
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
