//! dashstate CLI - inspect dashboards, tokens and value-state rules

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use std::fs;

use dashstate::error::{DashError, FixSuggestion, Result};
use dashstate::state::StateObject;
use dashstate::token;
use dashstate::{
    ActivateOptions, Activation, AliasResolution, DashboardConfig, DashboardContext,
    DecodeOutcome, StateMatchRule, ValueStateMapper,
};

#[derive(Parser)]
#[command(name = "dashstate")]
#[command(about = "dashstate - dashboard state stack and widget data engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a dashboard document
    Validate {
        /// Path to dashboard .yaml/.json file
        file: String,
    },

    /// Encode a JSON state path into a navigation token
    Encode {
        /// Path to a JSON array of { id?, params }
        file: String,

        /// Percent-encode the token for use in a URL
        #[arg(long)]
        uri: bool,
    },

    /// Decode a navigation token
    Decode {
        token: String,

        /// Replay the path against this dashboard
        #[arg(short, long)]
        dashboard: Option<String>,
    },

    /// Map raw values to states with a rules file
    Map {
        /// YAML list of state match rules
        rules: String,

        /// Raw values (JSON literals or plain text)
        #[arg(required = true)]
        values: Vec<String>,

        /// Decimals used when no state label applies
        #[arg(long)]
        decimals: Option<usize>,

        /// Units appended when no state label applies
        #[arg(long)]
        units: Option<String>,
    },

    /// Resolve an entity alias under a dashboard state
    Resolve {
        /// Path to dashboard .yaml/.json file
        dashboard: String,

        /// Alias name or id
        alias: String,

        /// Navigation token to restore first
        #[arg(short, long)]
        token: Option<String>,

        /// State to open (after the token, if any)
        #[arg(short, long)]
        state: Option<String>,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => validate_dashboard(&file),
        Commands::Encode { file, uri } => encode_path(&file, uri),
        Commands::Decode { token, dashboard } => decode_token(&token, dashboard.as_deref()),
        Commands::Map {
            rules,
            values,
            decimals,
            units,
        } => map_values(&rules, &values, decimals, units.as_deref()),
        Commands::Resolve {
            dashboard,
            alias,
            token,
            state,
        } => resolve_alias(&dashboard, &alias, token.as_deref(), state.as_deref()),
    };

    if let Err(e) = result {
        tracing::debug!(code = e.code(), "command failed");
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_context(file: &str) -> Result<DashboardContext> {
    DashboardContext::from_config(DashboardConfig::load(file)?)
}

fn validate_dashboard(file: &str) -> Result<()> {
    let config = DashboardConfig::load(file)?;
    config.validate()?;

    println!("{} Dashboard '{}' is valid", "✓".green(), file);
    if !config.title.is_empty() {
        println!("  Title: {}", config.title);
    }
    println!("  Root: {}", config.root_state_id().unwrap_or_default());
    println!("  States: {}", config.states.len());
    println!("  Aliases: {}", config.entity_aliases.len());

    Ok(())
}

fn encode_path(file: &str, uri: bool) -> Result<()> {
    let json = fs::read_to_string(file)?;
    let path: Vec<StateObject> = serde_json::from_str(&json)?;
    if path.is_empty() {
        return Err(DashError::InvalidToken {
            details: "state path is empty".to_string(),
        });
    }

    let encoded = token::encode_path(&path)?;
    if uri {
        println!("{}", token::to_uri_component(&encoded));
    } else {
        println!("{}", encoded);
    }
    Ok(())
}

fn decode_token(raw: &str, dashboard: Option<&str>) -> Result<()> {
    let Some(dashboard) = dashboard else {
        let path = token::decode_path(raw)?;
        println!("{}", serde_json::to_string_pretty(&path)?);
        return Ok(());
    };

    let ctx = load_context(dashboard)?;
    let controller = ctx.state_controller();
    match controller.decode(raw) {
        DecodeOutcome::Restored { depth } => {
            println!("{} Restored {} state(s)", "✓".green(), depth);
        }
        DecodeOutcome::Partial { missing, depth } => {
            println!(
                "{} State '{}' not found, restored {} state(s)",
                "!".yellow(),
                missing,
                depth
            );
        }
        DecodeOutcome::Fallback { reason } => {
            println!("{} Fell back to root: {}", "!".yellow(), reason);
        }
    }

    println!("  Path: {}", controller.path_ids().join(" > ").cyan());
    println!(
        "  Params: {}",
        serde_json::to_string(&controller.get_state_params())?
    );
    Ok(())
}

fn parse_raw(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn map_values(
    rules_file: &str,
    values: &[String],
    decimals: Option<usize>,
    units: Option<&str>,
) -> Result<()> {
    let yaml = fs::read_to_string(rules_file)?;
    let rules: Vec<StateMatchRule> = serde_yaml::from_str(&yaml)?;
    for rule in &rules {
        rule.validate()?;
    }

    let mapper = ValueStateMapper::new(&rules);
    for value in values {
        let raw = parse_raw(value);
        let resolved = mapper.resolve(&raw);
        println!(
            "{} {} {} ({})",
            value,
            "→".cyan(),
            mapper.tooltip(&raw, decimals, units),
            resolved
        );
    }
    Ok(())
}

fn resolve_alias(
    dashboard: &str,
    alias: &str,
    token: Option<&str>,
    state: Option<&str>,
) -> Result<()> {
    let ctx = load_context(dashboard)?;
    let controller = ctx.state_controller();

    if let Some(token) = token {
        if let DecodeOutcome::Fallback { reason } = controller.decode(token) {
            eprintln!("{} Fell back to root: {}", "!".yellow(), reason);
        }
    }
    if let Some(state_id) = state {
        let params = controller.get_state_params();
        if let Activation::NotFound { state_id } =
            controller.activate(state_id, params, ActivateOptions::default())
        {
            return Err(DashError::StateNotFound { state_id });
        }
    }

    let filter = ctx.resolve_alias(alias)?;
    match ctx.resolve_entities(alias) {
        AliasResolution::Entities(entities) => {
            println!("{} {} entity(ies)", "✓".green(), entities.len());
            for entity in entities {
                println!("  {}", entity);
            }
        }
        AliasResolution::Query { .. } => {
            println!("{} Server-side query", "→".cyan());
            println!("{}", serde_json::to_string_pretty(filter)?);
        }
        AliasResolution::Unresolved { reason, .. } => {
            println!("{} Unresolved: {}", "!".yellow(), reason);
        }
    }
    Ok(())
}
