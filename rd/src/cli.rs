//! CLI command definitions and the console line format

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::ReviewerIdentity;

/// ReviewDaemon - review campaign conversation engine
#[derive(Parser)]
#[command(
    name = "rd",
    about = "Conversation engine and timeout reconciler for review campaigns",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Console transport: read `name|phone|message` lines
    Run,

    /// List a reviewer's durable progress records
    Records {
        name: String,
        phone: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run one reconciler tick (with housekeeping) and exit
    Sweep,
}

/// Output format for `records`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

/// Log file location
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reviewdaemon")
        .join("logs")
        .join("reviewdaemon.log")
}

/// Split a console line into the sender identity and the message text
pub fn parse_console_line(line: &str) -> Option<(ReviewerIdentity, String)> {
    let mut parts = line.splitn(3, '|');
    let name = parts.next()?.trim();
    let phone = parts.next()?.trim();
    let message = parts.next()?.trim();
    if name.is_empty() || phone.is_empty() {
        return None;
    }
    Some((ReviewerIdentity::new(name, phone), message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_no_command() {
        let cli = Cli::parse_from(["rd"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_records() {
        let cli = Cli::parse_from(["rd", "-c", "/tmp/rd.yml", "records", "홍길동", "010-1234-5678", "-f", "json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/rd.yml")));
        match cli.command {
            Some(Command::Records { name, phone, format }) => {
                assert_eq!(name, "홍길동");
                assert_eq!(phone, "010-1234-5678");
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("Expected Records command, got {other:?}"),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("TEXT".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_parse_console_line() {
        let (identity, message) = parse_console_line("홍길동 | 010-1234-5678 | 1번|extra").unwrap();
        assert_eq!(identity.name, "홍길동");
        assert_eq!(identity.phone, "010-1234-5678");
        assert_eq!(message, "1번|extra");

        assert!(parse_console_line("홍길동|010").is_none());
        assert!(parse_console_line(" |010|hi").is_none());
    }
}
