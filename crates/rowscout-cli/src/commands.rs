//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use rowscout::{BrowserOptions, SearchMode, Token, Tokens};
use std::path::PathBuf;

/// rowscout: find rows in a paginated web table and act on them
#[derive(Parser, Debug)]
#[command(name = "rowscout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (only errors and the JSON result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a file into a cell of the row matching a search
    Upload(UploadArgs),

    /// Locate a row and print where it is
    Find(FindArgs),

    /// Print the parts positions of an orga list entry
    Parts(PartsArgs),

    /// Tick part positions of an orga list entry as ok
    CheckParts(CheckPartsArgs),

    /// Load and resolve a client configuration
    Validate(ValidateArgs),

    /// Check that a URL answers over HTTP
    Probe(ProbeArgs),
}

/// Configuration file and client selection
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// YAML configuration file
    #[arg(long, env = "ROWSCOUT_CONFIG", default_value = "rowscout.yaml")]
    pub config: PathBuf,

    /// Client entry in the configuration
    #[arg(long, env = "ROWSCOUT_CLIENT")]
    pub client: String,

    /// Value for TABLE_ID
    #[arg(long, env = "ROWSCOUT_TABLE_ID")]
    pub table_id: Option<String>,

    /// Value for TABLE_NAME
    #[arg(long, env = "ROWSCOUT_TABLE_NAME")]
    pub table_name: Option<String>,

    /// Value for ORGA_LIST_ID
    #[arg(long, env = "ROWSCOUT_ORGA_LIST_ID")]
    pub orga_list_id: Option<String>,
}

impl ConfigArgs {
    /// Session tokens given on the command line
    #[must_use]
    pub fn tokens(&self) -> Tokens {
        [
            (Token::TableId, &self.table_id),
            (Token::TableName, &self.table_name),
            (Token::OrgaListId, &self.orga_list_id),
        ]
        .into_iter()
        .fold(Tokens::new(), |tokens, (token, value)| match value {
            Some(value) => tokens.with(token, value.clone()),
            None => tokens,
        })
    }
}

/// Everything a browser-backed workflow needs
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Configuration selection
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Login name
    #[arg(long, env = "ROWSCOUT_USERNAME")]
    pub username: String,

    /// Login password
    #[arg(long, env = "ROWSCOUT_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Chromium binary
    #[arg(long, env = "ROWSCOUT_CHROME")]
    pub chrome: Option<PathBuf>,
}

impl SessionArgs {
    /// Browser launch options from the flags
    #[must_use]
    pub fn browser_options(&self) -> BrowserOptions {
        let mut options = BrowserOptions::new().with_headless(!self.headed);
        if self.no_sandbox {
            options = options.with_no_sandbox();
        }
        if let Some(chrome) = &self.chrome {
            options = options.with_executable(chrome);
        }
        options
    }
}

/// Arguments for the upload command
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Session settings
    #[command(flatten)]
    pub session: SessionArgs,

    /// Field that receives the file
    #[arg(long)]
    pub field: String,

    /// Field searched for the row
    #[arg(long)]
    pub search_field: String,

    /// Value searched for
    #[arg(long)]
    pub value: String,

    /// File to upload
    #[arg(long)]
    pub file: PathBuf,

    /// Search mode
    #[arg(long, default_value = "filter")]
    pub mode: ModeArg,
}

/// Arguments for the find command
#[derive(Args, Debug, Clone)]
pub struct FindArgs {
    /// Session settings
    #[command(flatten)]
    pub session: SessionArgs,

    /// Field searched
    #[arg(long)]
    pub field: String,

    /// Value searched for
    #[arg(long)]
    pub value: String,

    /// Search mode
    #[arg(long, default_value = "scan")]
    pub mode: ModeArg,
}

/// Arguments for the parts command
#[derive(Args, Debug, Clone)]
pub struct PartsArgs {
    /// Session settings
    #[command(flatten)]
    pub session: SessionArgs,

    /// Field searched
    #[arg(long)]
    pub search_field: String,

    /// Value searched for
    #[arg(long)]
    pub value: String,

    /// Search mode
    #[arg(long, default_value = "filter")]
    pub mode: ModeArg,
}

/// Arguments for the check-parts command
#[derive(Args, Debug, Clone)]
pub struct CheckPartsArgs {
    /// Session settings
    #[command(flatten)]
    pub session: SessionArgs,

    /// Field searched
    #[arg(long)]
    pub search_field: String,

    /// Value searched for
    #[arg(long)]
    pub value: String,

    /// Position id or name to tick (repeatable; none ticks all)
    #[arg(long = "position")]
    pub positions: Vec<String>,

    /// Search mode
    #[arg(long, default_value = "filter")]
    pub mode: ModeArg,
}

/// Arguments for the validate command
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Configuration selection
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Arguments for the probe command
#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// URL to request
    pub url: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout: u64,
}

/// Search mode argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ModeArg {
    /// Walk every page
    #[default]
    Scan,
    /// Use the in-app column filter
    Filter,
}

impl From<ModeArg> for SearchMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Scan => Self::ScanAllPages,
            ModeArg::Filter => Self::Filtered,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
