use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "omnicore", about = "Control-plane core for a fleet of machine resources", version)]
pub struct Cli {
    /// Base URL of a running server. Defaults to http://localhost:8080.
    #[arg(long, env = "OMNICORE_URL", global = true)]
    pub remote: Option<String>,

    /// Bearer token for the server. Falls back to ~/.omnicore/token.
    #[arg(long, env = "OMNICORE_TOKEN", global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the server: resource store, controller runtime, and HTTP API.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Namespace this instance reconciles.
        #[arg(long, default_value = "default")]
        namespace: String,

        /// Use an in-memory store — state is lost on restart.
        #[arg(long)]
        ephemeral: bool,

        /// Path to the SQLite database file (ignored if --ephemeral).
        #[arg(long)]
        store_path: Option<String>,

        /// Generate a fresh token even if one already exists on disk.
        #[arg(long)]
        rotate_token: bool,

        /// Path to a YAML server config (bind address, compression, runtime
        /// concurrency). Overrides the matching CLI flags where present.
        #[arg(long)]
        config: Option<String>,
    },

    /// Fetch a single resource by pointer.
    Get { resource_type: String, namespace: String, id: String },

    /// List resources of a type within a namespace.
    List {
        resource_type: String,
        namespace: String,

        /// Comma-separated label selector, e.g. "env=prod,!deprecated".
        #[arg(long)]
        label_selector: Option<String>,
    },

    /// Stream resource events as they happen.
    Watch {
        resource_type: String,
        namespace: String,

        #[arg(long)]
        label_selector: Option<String>,
    },

    /// List registered controllers and their declared inputs/outputs.
    Controllers,

    /// Render the controller-to-resource-type dependency graph.
    DependencyGraph {
        #[arg(long, default_value = "text")]
        output: GraphOutput,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum GraphOutput {
    Text,
    Json,
    Dot,
}
