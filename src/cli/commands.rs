use crate::binder::{bind_with, BindOptions};
use crate::otel;
use crate::request::RawRequest;
use crate::runtime_config::RuntimeConfig;
use crate::schema::load_schemas;
use crate::validator::{print_issues, SchemaError};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use http::Method;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Command-line interface for brrtbind
#[derive(Parser, Debug)]
#[command(name = "brrtbind", version)]
#[command(about = "Check binding schemas and replay requests through the binder", long_about = None)]
pub struct Cli {
    /// Log level for diagnostics on stderr
    #[arg(long, global = true, env = "BRRTB_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a schema document and report construction issues
    Check {
        /// Schema document (YAML or JSON)
        #[arg(short, long)]
        schema: PathBuf,
    },
    /// Bind a recorded request against one model
    Bind {
        /// Schema document (YAML or JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Model to bind against
        #[arg(short, long)]
        model: String,

        /// Request fixture (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Print only explicitly supplied fields
        #[arg(long, default_value_t = false)]
        set_only: bool,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_target() -> String {
    "/".to_string()
}

/// A recorded request, as read from a fixture file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestFixture {
    #[serde(default = "default_method")]
    pub method: String,
    /// Path plus optional query string
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub path_params: BTreeMap<String, String>,
    /// Header pairs in order; names may repeat
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// JSON body; sets `content-type: application/json` unless a header says otherwise
    #[serde(default)]
    pub body: Option<Value>,
    /// Raw textual body
    #[serde(default)]
    pub body_text: Option<String>,
}

impl RequestFixture {
    /// Read a fixture file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request fixture {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid request fixture {}", path.display()))
    }

    pub fn into_raw(self) -> Result<RawRequest> {
        let method = Method::from_bytes(self.method.as_bytes())
            .with_context(|| format!("invalid HTTP method `{}`", self.method))?;
        let mut headers = self.headers;
        let has_content_type = headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("content-type"));
        let body = match (self.body, self.body_text) {
            (Some(_), Some(_)) => return Err(anyhow!("fixture sets both `body` and `body_text`")),
            (Some(json), None) => {
                if !has_content_type {
                    headers.push(("content-type".to_string(), "application/json".to_string()));
                }
                serde_json::to_vec(&json).context("fixture body does not serialize")?
            }
            (None, Some(text)) => text.into_bytes(),
            (None, None) => Vec::new(),
        };
        let mut raw = RawRequest::from_parts(method, &self.target, headers, body);
        for (name, value) in self.path_params {
            raw = raw.with_path_param(&name, value);
        }
        Ok(raw)
    }
}

fn report_schema_error(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<SchemaError>() {
        Some(schema_err) => {
            print_issues(&schema_err.issues);
            true
        }
        None => false,
    }
}

/// Execute a parsed command, writing results to `out`.
///
/// Returns `Ok(false)` when the command ran but the input is invalid (schema issues or
/// validation errors); those are reported, not raised.
///
/// # Errors
///
/// I/O failures and unreadable documents or fixtures.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<bool> {
    match &cli.command {
        Commands::Check { schema } => match load_schemas(schema) {
            Ok(registry) => {
                let names: Vec<&str> = registry.names().collect();
                writeln!(out, "{} model(s) OK: {}", registry.len(), names.join(", "))?;
                Ok(true)
            }
            Err(err) if report_schema_error(&err) => Ok(false),
            Err(err) => Err(err),
        },
        Commands::Bind {
            schema,
            model,
            request,
            set_only,
        } => {
            let registry = match load_schemas(schema) {
                Ok(registry) => registry,
                Err(err) if report_schema_error(&err) => return Ok(false),
                Err(err) => return Err(err),
            };
            let object = registry.get(model).ok_or_else(|| {
                let known: Vec<&str> = registry.names().collect();
                anyhow!("unknown model `{model}` (known: {})", known.join(", "))
            })?;
            let raw = RequestFixture::load(request)?.into_raw()?;
            let opts = BindOptions::from(&RuntimeConfig::from_env());
            let (ok, rendered) = match bind_with(&object, &raw, &opts) {
                Ok(bound) if *set_only => (true, bound.to_json_set_only()),
                Ok(bound) => (true, bound.to_json()),
                Err(errs) => (false, errs.to_problem_json()),
            };
            serde_json::to_writer_pretty(&mut *out, &rendered)?;
            writeln!(out)?;
            Ok(ok)
        }
    }
}

/// Parse arguments, set up logging and run.
pub fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();
    otel::init_logging(&cli.log_level)?;
    let stdout = std::io::stdout();
    let ok = run(&cli, &mut stdout.lock())?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
