//! fsh-apply
//!
//! Applies a JSON batch of FSH rules to a parent definition and writes the
//! resulting profile as a StructureDefinition with snapshot and differential.

mod config;
mod logging;

use anyhow::Context;
use clap::Parser;
use crate::config::{Args, CliConfig};
use fsh_context::{load_directory, DefinitionIndex};
use fsh_elements::{apply_rules, Diagnostics, Rule, Severity, StructureDefinition};
use std::fs;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = CliConfig::load(&args).context("Failed to load configuration")?;
    logging::init_logging(&config.logging)?;

    let index = match &config.definitions {
        Some(dir) => load_directory(dir)
            .with_context(|| format!("Failed to load definitions from {}", dir.display()))?,
        None => DefinitionIndex::new(),
    };
    tracing::info!(definitions = index.len(), "Definitions loaded");

    let parent = StructureDefinition::fish(&index, &args.parent)
        .with_context(|| format!("Failed to load parent definition {}", args.parent))?;
    let name = args.name.clone().unwrap_or_else(|| args.id.clone());
    let url = args
        .url
        .clone()
        .unwrap_or_else(|| config.profile_url(&args.id));
    let mut profile = parent.derive_profile(&args.id, &name, &url);

    let text = fs::read_to_string(&args.rules)
        .with_context(|| format!("Failed to read rules from {}", args.rules.display()))?;
    let mut rules: Vec<Rule> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse rules in {}", args.rules.display()))?;

    let mut diagnostics = Diagnostics::new();
    apply_rules(&mut profile, &mut rules, &index, &mut diagnostics);
    for diagnostic in diagnostics.iter().filter(|d| d.severity >= Severity::Warning) {
        eprintln!("{}", diagnostic);
    }

    let resource = profile
        .to_resource()
        .context("Failed to serialize StructureDefinition")?;
    let output = serde_json::to_string_pretty(&resource)?;
    match &args.out {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", output),
    }

    let errors = diagnostics.errors().count();
    tracing::info!(
        rules = rules.len(),
        errors,
        differential = profile.differential().len(),
        "Profile written"
    );
    if errors > 0 {
        anyhow::bail!("{} rule(s) could not be applied", errors);
    }
    Ok(())
}
