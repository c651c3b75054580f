pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::TypeHint;

#[derive(Parser)]
#[command(name = "textgrab")]
#[command(about = "Extract plain text from web pages and documents", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/textgrab/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Acquire the text of a URL
    Fetch {
        /// Page or document URL
        url: String,

        /// Routing hint: html, pdf, google-drive, google-docs, tencent-doc
        #[arg(long)]
        hint: Option<TypeHint>,

        /// Override the global deadline in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Print the full result with its attempt trail as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and probe OCR language data
    Check,
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_with_hint() {
        let cli = Cli::parse_from([
            "textgrab",
            "fetch",
            "https://drive.google.com/file/d/abc/view",
            "--hint",
            "google-drive",
            "--deadline-secs",
            "90",
            "--json",
        ]);
        match cli.command {
            Commands::Fetch {
                url,
                hint,
                deadline_secs,
                json,
            } => {
                assert_eq!(url, "https://drive.google.com/file/d/abc/view");
                assert_eq!(hint, Some(TypeHint::GoogleDrive));
                assert_eq!(deadline_secs, Some(90));
                assert!(json);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["textgrab", "check", "--config", "/tmp/textgrab.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/textgrab.toml")));
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn test_unknown_hint_is_rejected() {
        assert!(Cli::try_parse_from(["textgrab", "fetch", "https://x.org", "--hint", "docx"]).is_err());
    }
}
