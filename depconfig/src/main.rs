#[macro_use]
extern crate log;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use depconfig::{Diagnostic, Engine, FsLoader, Value, store};
use serde_json::Value as Json;

/// Inspect, check and export dependency-driven configurations.
#[derive(Parser, Debug)]
#[command(name = "depconfig", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Schema document to load; repeat for several roots
    #[arg(short, long, required = true)]
    schema: Vec<PathBuf>,

    /// Stored configuration (.json or .toml) applied on top of the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Set an option after loading, e.g. `--set PORT=8080`
    #[arg(long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// Provide an external option or context variable, e.g. `--context OS=linux`
    #[arg(long = "context", value_name = "NAME=VALUE")]
    context: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the configuration and report diagnostics
    Check,
    /// Print the option tree with values and visibility
    Show {
        /// Include hidden options
        #[arg(short, long)]
        all: bool,
    },
    /// Write the visible options to a configuration file
    Dump {
        /// Output file; the extension selects JSON or TOML
        #[arg(short, long, default_value = ".config.json")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut loader = FsLoader::current_dir()?;
    let roots: Vec<String> = cli.schema.iter().map(|p| p.display().to_string()).collect();
    let roots: Vec<&str> = roots.iter().map(String::as_str).collect();
    let mut engine = Engine::ingest(&mut loader, &roots)?;
    info!(
        "loaded `{}` with {} nodes",
        engine.forest().name(),
        engine.forest().len()
    );

    inject_context(&mut engine, &cli.context)?;

    let mut diagnostics = Vec::new();
    if let Some(config) = &cli.config {
        let stored = store::read_config(config)?;
        diagnostics.extend(engine.load_config(&stored));
    }

    apply_sets(&mut engine, &cli.set)?;
    diagnostics.extend_from_slice(engine.diagnostics());

    match cli.command {
        Command::Check => {
            for dangling in engine.dangling_references() {
                if !diagnostics.contains(&dangling) {
                    diagnostics.push(dangling);
                }
            }
            report(&diagnostics);
            if diagnostics.is_empty() {
                let options = engine.forest().iter().filter(|(_, n)| !n.is_group()).count();
                println!("{} {options} options resolved", "ok:".green().bold());
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Show { all } => {
            show(&engine, all);
            report(&diagnostics);
            Ok(ExitCode::SUCCESS)
        }
        Command::Dump { output } => {
            report(&diagnostics);
            if let Some(backup) = store::write_config(&output, &engine.export())? {
                println!("{}", format!("backup: {}", backup.display()).cyan());
            }
            println!("{} {}", "written:".green().bold(), output.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `--context`: external options parse by their declared type, anything
/// else becomes a context variable.
fn inject_context(engine: &mut Engine, items: &[String]) -> anyhow::Result<()> {
    for (name, text) in parse_assignments(items)? {
        let result = if engine.forest().get_ignore_case(&name).is_some() {
            engine.inject_text(&name, &text)
        } else {
            engine.inject(&name, parse_scalar(&text))
        };
        result.with_context(|| format!("--context {name}"))?;
    }
    Ok(())
}

fn apply_sets(engine: &mut Engine, items: &[String]) -> anyhow::Result<()> {
    for (name, text) in parse_assignments(items)? {
        engine
            .set_text(&name, &text)
            .with_context(|| format!("--set {name}"))?;
    }
    Ok(())
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{} {diagnostic}", "warning:".yellow().bold());
    }
}

fn show(engine: &Engine, all: bool) {
    let forest = engine.forest();
    println!("{}", forest.name().bold().purple());

    for (id, node) in forest.iter() {
        let state = engine.resolution().state(id);
        if !all && !state.visible {
            continue;
        }

        let mut text = if node.is_group() {
            format!("{}/", node.name)
        } else {
            let value = engine
                .get_value(&node.name)
                .map(Value::to_string)
                .unwrap_or_default();
            format!("{} = {value}", node.name)
        };
        if node.external {
            text.push_str(" [external]");
        }
        if !state.visible {
            text.push_str(" [hidden]");
        }

        let text = if !state.visible {
            text.dimmed()
        } else if node.is_group() {
            text.bold()
        } else if !state.enabled {
            text.cyan()
        } else {
            text.normal()
        };
        println!("{}{text}", "  ".repeat(forest.depth(id) + 1));
    }
}

/// Split `NAME=VALUE` pairs, keeping the value text as typed.
fn parse_assignments(items: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    items
        .iter()
        .map(|item| {
            let (name, value) = item
                .split_once('=')
                .with_context(|| format!("expected NAME=VALUE, got `{item}`"))?;
            Ok((name.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Context variables have no declared type; JSON scalars keep theirs.
fn parse_scalar(text: &str) -> Value {
    match serde_json::from_str::<Json>(text) {
        Ok(Json::Bool(b)) => Value::Bool(b),
        Ok(Json::Number(n)) => n
            .as_i64()
            .map_or_else(|| Value::Str(text.to_string()), Value::Int),
        Ok(Json::String(s)) => Value::Str(s),
        _ => Value::Str(text.to_string()),
    }
}
