use {anyhow::Result, clap::Subcommand};

use tryon_config::{
    template::default_config_template,
    validate::{self, Severity},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a commented default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration (file, env overrides, defaults).
    Show,
    /// Validate the configuration file and report errors/warnings.
    Validate {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

pub fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let path = tryon_config::save_config(&default_config_template(), force)?;
            println!("Config written to {}", path.display());
            Ok(())
        },
        ConfigAction::Show => {
            let config = tryon_config::discover_and_load();
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
        ConfigAction::Validate { verbose } => check(verbose),
    }
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(verbose: bool) -> Result<()> {
    let result = validate::validate(None);

    match result.config_path {
        Some(ref path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let shown: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .collect();
    for d in &shown {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };
        let location = if d.path.is_empty() {
            String::new()
        } else {
            format!("{}: ", d.path)
        };
        eprintln!("  {BOLD}{color}{label}{RESET} {location}{}", d.message);
    }
    if !shown.is_empty() {
        eprintln!();
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
