//! `searchdoc`: inspect and run search deep links from the command line.
//!
//! ```bash
//! searchdoc decode 'rivers/%5B%5B%22genre%22%2C%22or%22%2C%22map%22%5D%5D//10/'
//! searchdoc compile --config facets.json 'rivers//%7B%22year%22%3A%22desc%22%7D'
//! searchdoc search --base-url http://localhost:3000 'rivers'
//! ```
//!
//! Results are written to stdout as pretty JSON; logs go to stderr and are
//! controlled by `RUST_LOG` (default `warn`).

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use searchdoc_client::{ClientConfig, HttpTransport, RequestStatus, SearchSession};
use searchdoc_core::{
    compile_query, decode_url_path, default_text_fields, encode_url_path, SearchConfig,
    SearchDocument,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "searchdoc")]
#[command(about = "Decode, encode, compile and run search deep links")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a URL path into a search document (JSON).
    Decode {
        /// Percent-encoded path: text/filters/sort/limit/offset
        path: String,
    },
    /// Encode a search document (JSON, `-` for stdin) into a URL path.
    Encode {
        /// JSON document, or `-` to read it from stdin
        #[arg(default_value = "-")]
        document: String,
    },
    /// Compile a URL path into the backend query body.
    Compile {
        path: String,

        /// Search config file (facets and text fields)
        #[arg(long, env = "SEARCHDOC_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Run the search for a URL path and print the response.
    Search {
        path: String,

        /// Search config file (facets and text fields)
        #[arg(long, env = "SEARCHDOC_CONFIG")]
        config: Option<PathBuf>,

        /// Backend origin
        #[arg(long, default_value = "http://localhost:3000", env = "SEARCHDOC_BASE_URL")]
        base_url: String,

        /// Search endpoint path
        #[arg(long, default_value = "/rest/search", env = "SEARCHDOC_SEARCH_PATH")]
        search_path: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "30", env = "SEARCHDOC_TIMEOUT_SECS")]
        timeout_secs: u64,
    },
}

fn load_search_config(path: Option<&PathBuf>) -> anyhow::Result<SearchConfig> {
    match path {
        Some(path) => SearchConfig::from_path(path)
            .with_context(|| format!("failed to load search config {}", path.display())),
        None => Ok(SearchConfig::default()),
    }
}

fn read_document(arg: &str) -> anyhow::Result<SearchDocument> {
    let json = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read document from stdin")?;
        buf
    } else {
        arg.to_string()
    };
    serde_json::from_str(&json).context("invalid search document JSON")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Decode { path } => {
            let document = decode_url_path(&path)?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Command::Encode { document } => {
            let document = read_document(&document)?;
            println!("{}", encode_url_path(&document));
        }
        Command::Compile { path, config } => {
            let search_config = load_search_config(config.as_ref())?;
            let document = decode_url_path(&path)?;
            let query = compile_query(&document, &search_config, &default_text_fields())?;
            println!("{}", serde_json::to_string_pretty(&query)?);
        }
        Command::Search {
            path,
            config,
            base_url,
            search_path,
            timeout_secs,
        } => {
            let search_config = load_search_config(config.as_ref())?;
            let client_config = ClientConfig {
                base_url,
                search_path,
                request_timeout: Duration::from_secs(timeout_secs),
                ..ClientConfig::default()
            };
            let transport = HttpTransport::new(&client_config)?;
            let session = SearchSession::new(client_config, search_config, Arc::new(transport));

            let state = session.search_url_path(&path).await?;
            if state.status == RequestStatus::Loaded {
                if let Some(payload) = &state.payload {
                    println!("{}", serde_json::to_string_pretty(payload)?);
                }
            }
        }
    }

    Ok(())
}
