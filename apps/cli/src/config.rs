//! CLI configuration
//!
//! Settings are layered: built-in defaults, then an optional `fsh.toml` (or the
//! file given with `--config`), then `FSH_`-prefixed environment variables, then
//! command line flags.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "fsh.toml";

/// Apply a batch of FSH rules to a FHIR definition and write the result.
#[derive(Parser, Debug, Default)]
#[command(name = "fsh-apply", version)]
pub struct Args {
    /// Configuration file (defaults to ./fsh.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of FHIR JSON definitions to resolve names and URLs against
    #[arg(short, long)]
    pub definitions: Option<PathBuf>,

    /// Parent definition, by name, id or URL
    #[arg(short, long)]
    pub parent: String,

    /// JSON file holding the rule batch
    #[arg(short, long)]
    pub rules: PathBuf,

    /// Id of the new profile
    #[arg(long)]
    pub id: String,

    /// Name of the new profile (defaults to the id)
    #[arg(long)]
    pub name: Option<String>,

    /// Canonical URL of the new profile (defaults to one under the canonical base)
    #[arg(long)]
    pub url: Option<String>,

    /// Output file; the StructureDefinition goes to stdout when omitted
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub definitions: Option<PathBuf>,
    /// Base of generated canonical URLs
    pub canonical: String,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            definitions: None,
            canonical: "http://example.org/fhir".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl CliConfig {
    pub fn load(args: &Args) -> Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        match &args.config {
            Some(path) => builder = builder.add_source(config::File::from(path.clone())),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder = builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE))
            }
            None => {}
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FSH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: CliConfig = builder.build()?.try_deserialize()?;
        config.apply_args(args);
        Ok(config)
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(definitions) = &args.definitions {
            self.definitions = Some(definitions.clone());
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json = true;
        }
    }

    /// Canonical URL for a profile with id `id`.
    pub fn profile_url(&self, id: &str) -> String {
        format!(
            "{}/StructureDefinition/{}",
            self.canonical.trim_end_matches('/'),
            id
        )
    }
}
