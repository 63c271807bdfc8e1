//! Command-line access to the promptlab core.
//!
//! Works offline on local files: import recorded spans, inspect template
//! variables, render templates, and check prompt configurations.
//!
//! # Examples
//!
//! ```sh
//! # Rebuild a prompt from a span's attribute dump
//! promptlab import span.json --name "checkout flow"
//!
//! # Variables referenced by a template
//! promptlab scan --text "Summarize {{topic}} for {{audience}}"
//!
//! # Render with values
//! promptlab render prompt.txt --var topic=rust --var audience=beginners
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use promptlab::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Prompt-authoring workspace tools.
#[derive(Parser)]
#[command(name = "promptlab", version)]
struct Cli {
    /// Log at debug level (overrides PROMPTLAB_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rebuild an editable prompt from a span attribute file.
    Import {
        /// JSON file holding one span's attributes.
        span: PathBuf,
        /// Provider to use when the span does not name one.
        #[arg(long)]
        provider: Option<String>,
        /// Model to use when the span does not name one.
        #[arg(long)]
        model: Option<String>,
        /// Name for the imported prompt.
        #[arg(long)]
        name: Option<String>,
        /// Workspace config file (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the whole workspace state, including derived keywords.
        #[arg(long)]
        state: bool,
    },
    /// Print the distinct variables referenced by a template.
    Scan(TextSource),
    /// Substitute variables in a template.
    Render {
        #[command(flatten)]
        source: TextSource,
        /// Variable value as `name=value`. Repeatable.
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },
    /// Print the JSON Schema of a prompt.
    Schema,
    /// Check tool parameter schemas and the response format schema.
    Validate {
        /// Prompt or prompt config JSON file.
        prompt: PathBuf,
    },
}

/// Template text from `--text`, a file, or stdin.
#[derive(Args)]
struct TextSource {
    /// Template text.
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,
    /// Template file. Reads stdin when neither this nor --text is given.
    file: Option<PathBuf>,
}

impl TextSource {
    fn read(&self) -> Result<String, String> {
        match (&self.text, &self.file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => read_file(path),
            (None, None) => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|e| format!("failed to read stdin: {e}"))?;
                Ok(buf)
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Import {
            span,
            provider,
            model,
            name,
            config,
            state,
        } => import(span, provider, model, name, config, state).await,
        Command::Scan(source) => source.read().map(|text| {
            for name in scan(&text) {
                println!("{name}");
            }
        }),
        Command::Render { source, vars } => render(&source, &vars),
        Command::Schema => print_json(&json_schema_for::<Prompt>()),
        Command::Validate { prompt } => validate(&prompt),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("PROMPTLAB_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn import(
    span: PathBuf,
    provider: Option<String>,
    model: Option<String>,
    name: Option<String>,
    config: Option<PathBuf>,
    print_state: bool,
) -> Result<(), String> {
    let mut config = match config {
        Some(path) => PlaygroundConfig::from_file(path)?,
        None => PlaygroundConfig::default(),
    };
    if let Some(provider) = provider {
        config.default_provider = provider;
    }
    if let Some(model) = model {
        config.default_model = model;
    }
    if let Some(name) = name {
        config.import_name = name;
    }

    let workspace = Workspace::new(Arc::new(Offline), config);
    let span_id = span.to_string_lossy().into_owned();
    let prompt_id = workspace
        .import_trace(&SpanFiles, &span_id)
        .await
        .map_err(|e| e.to_string())?;

    let state = workspace.snapshot();
    if print_state {
        print_json(&state)
    } else {
        let prompt = state
            .prompt(&prompt_id)
            .ok_or_else(|| format!("imported prompt {prompt_id} is missing"))?;
        print_json(prompt)
    }
}

fn render(source: &TextSource, vars: &[String]) -> Result<(), String> {
    let text = source.read()?;
    let values = vars
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| format!("expected NAME=VALUE, got '{pair}'"))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    print!("{}", substitute(&text, &values));
    Ok(())
}

fn validate(path: &Path) -> Result<(), String> {
    let raw = read_file(path)?;
    let config: PromptConfig =
        serde_json::from_str(&raw).map_err(|e| format!("invalid prompt {}: {e}", path.display()))?;
    let problems = config.validation_errors();
    if problems.is_empty() {
        println!("ok");
        return Ok(());
    }
    for problem in &problems {
        println!("{problem}");
    }
    Err(format!("{} problem(s) in {}", problems.len(), path.display()))
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

// ── Offline collaborators ──────────────────────────────────────────

/// Span source reading attribute dumps from disk. The span id is a path.
struct SpanFiles;

impl SpanSource for SpanFiles {
    fn span_attributes<'a>(&'a self, span_id: &'a str) -> ApiFuture<'a, serde_json::Value> {
        Box::pin(async move {
            let raw = tokio::fs::read_to_string(span_id)
                .await
                .map_err(|e| ApiError::NotFound(format!("{span_id}: {e}")))?;
            serde_json::from_str(&raw).map_err(|e| ApiError::Request(format!("{span_id}: {e}")))
        })
    }
}

/// The CLI has no backend; every remote call fails.
struct Offline;

fn offline<'a, T: Send + 'a>() -> ApiFuture<'a, T> {
    Box::pin(async { Err(ApiError::Request("no backend configured".into())) })
}

impl PlaygroundApi for Offline {
    fn save<'a>(&'a self, _: &'a str, _: &'a PromptConfig) -> ApiFuture<'a, SavedPrompt> {
        offline()
    }

    fn list_prompts<'a>(&'a self, _: Option<&'a str>) -> ApiFuture<'a, Vec<BackendPrompt>> {
        offline()
    }

    fn list_versions<'a>(&'a self, _: &'a str) -> ApiFuture<'a, Vec<PromptVersion>> {
        offline()
    }

    fn get_version<'a>(&'a self, _: &'a str, _: u32) -> ApiFuture<'a, PromptConfig> {
        offline()
    }

    fn run(&self, _: CompletionRequest) -> ApiFuture<'_, CompletionResponse> {
        offline()
    }

    fn render_variables(
        &self,
        _: Vec<Message>,
        _: BTreeMap<String, String>,
    ) -> ApiFuture<'_, Vec<Message>> {
        offline()
    }

    fn list_providers(&self) -> ApiFuture<'_, Vec<String>> {
        offline()
    }

    fn list_models<'a>(&'a self, _: &'a str) -> ApiFuture<'a, Vec<String>> {
        offline()
    }
}
