//! JSON:API Graph CLI
//!
//! Command-line interface for validating JSON:API documents and reading
//! them back into per-type objects.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use jsonapi_graph::*;
use serde_json::Value;
use tracing::debug;

#[derive(Parser)]
#[command(name = "jsonapi-graph")]
#[command(about = "Validate JSON:API documents and untransform them into plain objects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the structure of a JSON:API document
    Validate {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Untransform a document into objects grouped by resource type
    Untransform {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        /// Also untransform resources from "included"
        #[arg(long)]
        included: bool,

        /// Replace relationship placeholders with the related objects
        #[arg(long)]
        nest: bool,

        /// Cut circular references with { id } stubs (requires --nest)
        #[arg(long, requires = "nest")]
        remove_circular: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    setup_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { document, json } => run_validate(&document, json),
        Commands::Untransform {
            document,
            included,
            nest,
            remove_circular,
            output,
            pretty,
        } => {
            let options = UntransformOptions::new()
                .untransform_included(included)
                .nest_included(nest)
                .remove_circular_dependencies(remove_circular);
            run_untransform(&document, options, output, pretty)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default: warnings only).
fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run_validate(source: &str, json_output: bool) -> Result<(), u8> {
    let document = load_document_auto(source).map_err(|e| {
        report_error(json_output, &format!("loading document: {}", e));
        e.exit_code() as u8
    })?;

    match validate_document(&document) {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(UntransformError::InvalidDocument { path, violation }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "path": path,
                    "error": violation.to_string(),
                });
                println!("{}", output);
            } else {
                eprintln!("Invalid document at {}: {}", display_path(&path), violation);
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

fn run_untransform(
    source: &str,
    options: UntransformOptions,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let document = load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    // schemas are not configurable from the command line, so every type
    // in the document is read back with the passthrough defaults
    let mut engine = Engine::new();
    for resource_type in resource_types(&document) {
        engine
            .register(&resource_type, Schema::builder().build())
            .map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
    }
    debug!(types = engine.registry().len(), "registered passthrough schemas");

    let buckets = engine.untransform(&document, options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = if pretty {
        serde_json::to_string_pretty(&buckets)
    } else {
        serde_json::to_string(&buckets)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

/// Every non-empty resource type named by a resource or identifier.
///
/// Empty types are left for the validator to report with their path.
fn resource_types(document: &Value) -> BTreeSet<String> {
    let mut types = BTreeSet::new();
    let resources = ["data", "included"]
        .iter()
        .filter_map(|key| document.get(*key))
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        });

    for resource in resources {
        collect_type(resource, &mut types);
        let Some(Value::Object(relationships)) = resource.get("relationships") else {
            continue;
        };
        for relationship in relationships.values() {
            match relationship.get("data") {
                Some(Value::Array(identifiers)) => {
                    for identifier in identifiers {
                        collect_type(identifier, &mut types);
                    }
                }
                Some(identifier) => collect_type(identifier, &mut types),
                None => {}
            }
        }
    }
    types
}

fn collect_type(resource: &Value, types: &mut BTreeSet<String>) {
    if let Some(resource_type) = resource.get("type").and_then(Value::as_str) {
        if !resource_type.is_empty() {
            types.insert(resource_type.to_string());
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
