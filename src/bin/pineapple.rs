//! Pineapple CLI
//!
//! Command-line interface for validating, trimming and linting payloads
//! against field descriptors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pineapple::{
    lint_file, load_descriptors, load_json_auto, load_messages, load_models, ErrorMessages,
    FieldDescriptor, FieldError, Severity, Validator,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pineapple")]
#[command(about = "Validate and sanitize JSON payloads against field descriptors")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a payload against a descriptor list
    Validate {
        /// Payload source: file path or URL
        payload: String,

        /// Descriptor list source: file path or URL
        #[arg(long)]
        schema: String,

        /// Named model registry (object of name -> descriptor)
        #[arg(long)]
        models: Option<String>,

        /// Error-message schema
        #[arg(long)]
        messages: Option<String>,

        /// Accept the empty string for required fields
        #[arg(long)]
        lenient_required: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Validate, then print the payload reduced to described fields
    Trim {
        /// Payload source: file path or URL
        payload: String,

        /// Descriptor list source: file path or URL
        #[arg(long)]
        schema: String,

        /// Named model registry (object of name -> descriptor)
        #[arg(long)]
        models: Option<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Lint a descriptor file without a payload
    Lint {
        /// Descriptor file to lint
        schema: PathBuf,

        /// Named model registry used to resolve `model` references
        #[arg(long)]
        models: Option<String>,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            payload,
            schema,
            models,
            messages,
            lenient_required,
            json,
        } => run_validate(ValidateArgs {
            payload,
            schema,
            models,
            messages,
            strict_required: !lenient_required,
            json_output: json,
        }),

        Commands::Trim {
            payload,
            schema,
            models,
            output,
            pretty,
        } => run_trim(&payload, &schema, models.as_deref(), output, pretty),

        Commands::Lint {
            schema,
            models,
            format,
            strict,
        } => run_lint(&schema, models.as_deref(), &format, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Documents shared by `validate` and `trim`, all loaded up front.
struct Inputs {
    payload: Value,
    descriptors: Vec<FieldDescriptor>,
    models: HashMap<String, FieldDescriptor>,
}

fn load_inputs(
    payload: &str,
    schema: &str,
    models: Option<&str>,
    json_output: bool,
) -> Result<Inputs, u8> {
    let payload = load_json_auto(payload).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;
    let descriptors = load_descriptors(schema).map_err(|e| {
        report_error(json_output, &format!("loading schema: {}", e));
        e.exit_code() as u8
    })?;
    let models = match models {
        Some(source) => load_models(source).map_err(|e| {
            report_error(json_output, &format!("loading models: {}", e));
            e.exit_code() as u8
        })?,
        None => HashMap::new(),
    };
    Ok(Inputs {
        payload,
        descriptors,
        models,
    })
}

fn runtime(json_output: bool) -> Result<tokio::runtime::Runtime, u8> {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| {
            report_error(json_output, &format!("starting runtime: {}", e));
            2u8
        })
}

struct ValidateArgs {
    payload: String,
    schema: String,
    models: Option<String>,
    messages: Option<String>,
    strict_required: bool,
    json_output: bool,
}

fn run_validate(args: ValidateArgs) -> Result<(), u8> {
    let ValidateArgs {
        payload,
        schema,
        models,
        messages,
        strict_required,
        json_output,
    } = args;

    let inputs = load_inputs(&payload, &schema, models.as_deref(), json_output)?;
    let messages = match messages {
        Some(source) => load_messages(&source).map_err(|e| {
            report_error(json_output, &format!("loading messages: {}", e));
            e.exit_code() as u8
        })?,
        None => ErrorMessages::default(),
    };

    let validator = Validator::builder()
        .models(inputs.models)
        .messages(messages)
        .strict_required(strict_required)
        .build();

    let result = runtime(json_output)?
        .block_on(validator.validate(&inputs.payload, &inputs.descriptors))
        .map_err(|e| {
            report_error(json_output, &e.to_string());
            e.exit_code() as u8
        })?;

    if result.is_valid() {
        if json_output {
            println!(r#"{{"valid":true}}"#);
        } else {
            println!("Valid");
        }
        Ok(())
    } else {
        report_invalid(json_output, &result.errors);
        Err(1)
    }
}

fn run_trim(
    payload: &str,
    schema: &str,
    models: Option<&str>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let inputs = load_inputs(payload, schema, models, false)?;
    let validator = Validator::builder().models(inputs.models).build();

    let trimmed = runtime(false)?
        .block_on(validator.sanitize(&inputs.payload, &inputs.descriptors))
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?
        .map_err(|errors| {
            report_invalid(false, &errors);
            1u8
        })?;

    let json_output = if pretty {
        serde_json::to_string_pretty(&trimmed)
    } else {
        serde_json::to_string(&trimmed)
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

fn report_invalid(json_output: bool, errors: &[FieldError]) {
    if json_output {
        let output = serde_json::json!({
            "valid": false,
            "errors": errors
        });
        println!("{}", output);
    } else {
        eprintln!("Validation failed:");
        for error in errors {
            eprintln!("  {}", error);
        }
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

fn run_lint(schema: &Path, models: Option<&str>, format: &str, strict: bool) -> Result<(), u8> {
    if !schema.exists() {
        eprintln!("Error: path not found: {}", schema.display());
        return Err(2);
    }

    let models = match models {
        Some(source) => load_models(source).map_err(|e| {
            eprintln!("Error: loading models: {}", e);
            e.exit_code() as u8
        })?,
        None => HashMap::new(),
    };

    let result = lint_file(schema, &models);

    if format == "json" {
        let output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        println!("Linting {} ...\n", schema.display());

        for diag in &result.diagnostics {
            let (color, name) = match diag.severity {
                Severity::Error => ("\x1b[31m", "error"),
                Severity::Warning => ("\x1b[33m", "warning"),
            };
            println!(
                "    {}{}[{}]\x1b[0m: {} - {}",
                color, name, diag.code, diag.path, diag.message
            );
        }

        println!();
        if result.passed(strict) {
            println!(
                "\x1b[32m✓ {} descriptors checked, all passed\x1b[0m",
                result.descriptors
            );
        } else {
            println!(
                "\x1b[31m✗ {} descriptors checked ({} errors, {} warnings)\x1b[0m",
                result.descriptors, result.errors, result.warnings
            );
        }
    }

    if result.passed(strict) {
        Ok(())
    } else {
        Err(1)
    }
}
