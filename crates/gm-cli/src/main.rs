use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gm_core::{
    AddressingScheme, Correlation, Never, decode_graph, decode_nodes, derive_grid,
    derive_namespace_identity, derive_time_scoped_grid, duration_from_playback, extract_tags,
    passphrase_to_mnemonic,
};
use gm_session::{AnnotationLoader, GraphSession, Settings, WebSocketConnector};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "gm", about = "Derived-identity annotations for shared video")]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, global = true, env = "GM_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemeArg {
    Derived,
    Explicit,
}

impl From<SchemeArg> for AddressingScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Derived => AddressingScheme::Derived,
            SchemeArg::Explicit => AddressingScheme::Explicit,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the recovery phrase derived from a passphrase
    Mnemonic { passphrase: String },

    /// Print the base identity key of a namespace
    Identity { namespace: String },

    /// Print the key grid of a namespace
    Grid {
        namespace: String,

        /// Derive the grid of this second instead of the un-timed grid
        #[arg(long)]
        second: Option<u64>,

        #[arg(long)]
        rows: Option<u32>,

        #[arg(long)]
        columns: Option<u32>,
    },

    /// Decode a graph payload file and print it as JSON
    Decode { path: PathBuf },

    /// Correlate the tags in a graph payload file against a namespace
    Correlate {
        namespace: String,

        /// Playback duration in seconds
        #[arg(long)]
        duration: f64,

        /// Graph payload file
        #[arg(long)]
        graph: PathBuf,

        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
    },

    /// Fetch a namespace's tag graph from the store and correlate it
    Fetch {
        namespace: String,

        /// Playback duration in seconds
        #[arg(long)]
        duration: f64,

        /// WebSocket endpoint of the graph store
        #[arg(long)]
        endpoint: Option<String>,

        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path).context("failed to load settings")?,
        None => Settings::default(),
    };
    Ok(settings.apply_env())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Mnemonic { passphrase } => cmd_mnemonic(passphrase),
        Commands::Identity { namespace } => cmd_identity(namespace),
        Commands::Grid {
            namespace,
            second,
            rows,
            columns,
        } => cmd_grid(&cli, namespace, *second, *rows, *columns),
        Commands::Decode { path } => cmd_decode(path),
        Commands::Correlate {
            namespace,
            duration,
            graph,
            scheme,
        } => cmd_correlate(&cli, namespace, *duration, graph, *scheme),
        Commands::Fetch {
            namespace,
            duration,
            endpoint,
            timeout_ms,
            scheme,
        } => {
            cmd_fetch(
                &cli,
                namespace,
                *duration,
                endpoint.as_deref(),
                *timeout_ms,
                *scheme,
            )
            .await
        }
    }
}

fn cmd_mnemonic(passphrase: &str) -> Result<()> {
    let phrase = passphrase_to_mnemonic(passphrase).context("failed to encode mnemonic")?;
    println!("{phrase}");
    Ok(())
}

fn cmd_identity(namespace: &str) -> Result<()> {
    let identity = derive_namespace_identity(namespace).context("failed to derive identity")?;
    println!("namespace:  {namespace}");
    println!("path:       {}", identity.path);
    println!("public_key: {}", identity.public_key);
    Ok(())
}

fn cmd_grid(
    cli: &Cli,
    namespace: &str,
    second: Option<u64>,
    rows: Option<u32>,
    columns: Option<u32>,
) -> Result<()> {
    let settings = load_settings(cli)?;
    let rows = rows.unwrap_or(settings.rows);
    let columns = columns.unwrap_or(settings.columns);

    let cells = match second {
        Some(second) => derive_time_scoped_grid(namespace, second, rows, columns),
        None => derive_grid(namespace, rows, columns),
    }
    .context("failed to derive grid")?;

    for cell in &cells {
        println!("{:>3} {:>3} {}", cell.row, cell.column, cell.public_key);
    }
    Ok(())
}

fn cmd_decode(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let graph = decode_graph(&text);
    println!("{}", serde_json::to_string_pretty(&graph)?);
    Ok(())
}

fn print_correlation(cli: &Cli, correlation: &Correlation) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&correlation.points)?);
    if cli.verbose {
        let stats = &correlation.stats;
        eprintln!(
            "--- grids={}, keys={}, matched={}, unmatched={} ---",
            stats.grids_derived, stats.keys_derived, stats.matched, stats.unmatched
        );
    }
    Ok(())
}

fn cmd_correlate(
    cli: &Cli,
    namespace: &str,
    duration: f64,
    graph: &Path,
    scheme: Option<SchemeArg>,
) -> Result<()> {
    let mut settings = load_settings(cli)?;
    if let Some(scheme) = scheme {
        settings.scheme = scheme.into();
    }
    let correlator = settings.correlator().context("invalid grid settings")?;

    let text = std::fs::read_to_string(graph)
        .with_context(|| format!("failed to read {}", graph.display()))?;
    let tags = extract_tags(&decode_nodes(&text));
    let correlation = correlator
        .correlate(namespace, duration_from_playback(duration), &tags, &Never)
        .context("correlation failed")?;

    print_correlation(cli, &correlation)
}

async fn cmd_fetch(
    cli: &Cli,
    namespace: &str,
    duration: f64,
    endpoint: Option<&str>,
    timeout_ms: Option<u64>,
    scheme: Option<SchemeArg>,
) -> Result<()> {
    let mut settings = load_settings(cli)?;
    if let Some(endpoint) = endpoint {
        settings.endpoint = Some(endpoint.to_string());
    }
    if let Some(timeout_ms) = timeout_ms {
        settings.request_timeout_ms = timeout_ms;
    }
    if let Some(scheme) = scheme {
        settings.scheme = scheme.into();
    }
    let config = settings
        .session_config()
        .context("invalid session settings")?;
    let correlator = settings.correlator().context("invalid grid settings")?;

    let session = GraphSession::open(WebSocketConnector, config).await;
    let loader = AnnotationLoader::new(session, correlator);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let correlation = loader
        .load_with_stats(namespace, duration_from_playback(duration), &cancel)
        .await
        .context("failed to load annotations")?;

    print_correlation(cli, &correlation)
}
