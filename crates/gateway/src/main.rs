mod commands;
mod logging;
mod outbound_safety;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "toolgate",
    version,
    about = "Expose declaratively configured REST APIs as callable tools"
)]
struct Cli {
    /// API configuration file (JSON). Without it, `TOOLGATE_API_CONFIG` / `TOOLGATE_API_CONFIG_REF`
    /// are used.
    #[arg(long, global = true, env = "TOOLGATE_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Log filter (e.g. `info`, `toolgate_http_tools=debug`). Overrides `RUST_LOG`.
    #[arg(long, global = true, env = "TOOLGATE_LOG")]
    log_level: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Default per-request timeout when neither tool nor API sets one.
    #[arg(long, global = true, default_value_t = toolgate_http_tools::client::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[arg(long, global = true, default_value_t = toolgate_http_tools::client::DEFAULT_MAX_CONCURRENT_REQUESTS)]
    max_concurrent_requests: usize,

    /// Global cap on tool result text (bytes).
    #[arg(long, global = true, default_value_t = toolgate_http_tools::response_shaping::DEFAULT_MAX_RESPONSE_BYTES)]
    max_response_bytes: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and validate the configuration, then print a summary.
    Validate,

    /// Print every registered tool (name, description, input schema, annotations) as JSON.
    List,

    /// Invoke one tool and print its text result.
    Call {
        /// Generated tool name (see `list`).
        tool: String,

        /// Arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// Convert an OpenAPI 3 document into a draft API configuration.
    ImportOpenapi {
        /// File path, http(s) URL, or inline JSON/YAML.
        source: String,

        /// API name (defaults to the document title).
        #[arg(long)]
        name: Option<String>,

        /// Base URL (defaults to the first server URL).
        #[arg(long)]
        base_url: Option<String>,

        /// Only import operations matching `METHOD /path` globs.
        #[arg(long)]
        include: Vec<String>,

        #[arg(long)]
        exclude: Vec<String>,

        /// Expected document hash (`sha256:<hex>`).
        #[arg(long)]
        spec_hash: Option<String>,

        /// Write the draft here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write example responses (tool name -> example) here.
        #[arg(long)]
        previews: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref(), cli.log_format)?;

    let settings = commands::Settings {
        config: cli.config,
        timeout_ms: cli.timeout_ms,
        max_concurrent_requests: cli.max_concurrent_requests,
        max_response_bytes: cli.max_response_bytes,
        safety: outbound_safety::outbound_http_safety(),
    };

    match cli.command {
        Command::Validate => commands::validate(&settings),
        Command::List => commands::list(&settings),
        Command::Call { tool, args } => commands::call(&settings, &tool, &args).await,
        Command::ImportOpenapi {
            source,
            name,
            base_url,
            include,
            exclude,
            spec_hash,
            output,
            previews,
        } => {
            let options = toolgate_openapi_tools::ImportOptions {
                api_name: name,
                base_url,
                include,
                exclude,
            };
            commands::import_openapi(
                &settings,
                &source,
                &options,
                spec_hash.as_deref(),
                output.as_deref(),
                previews.as_deref(),
            )
            .await
        }
    }
}
