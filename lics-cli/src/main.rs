mod server;
mod handlers;

use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lics_core::client::LicenseClient;
use lics_core::config::{AlgorithmConfig, ClientConfig};
use lics_core::error::status_of;

#[derive(Parser)]
#[command(
    name = "lics",
    about = "lics: algorithm license leasing server and client",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the license server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3100", env = "LICS_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "LICS_HOST")]
        host: String,

        /// Licensed algorithm, as ID=CLASS (e.g. 100=VIDEO). Repeatable.
        #[arg(long = "algorithm", value_parser = handlers::parse_algorithm)]
        algorithms: Vec<(u32, lics_core::types::TaskClass)>,

        /// Static quota, as ID=TOTAL (e.g. 100=5000). Repeatable.
        #[arg(long = "quota", value_parser = handlers::parse_quota)]
        quotas: Vec<(u32, u32)>,

        /// Base URL of an HTTP quota authority; overrides --quota
        #[arg(long, env = "LICS_QUOTA_URL")]
        quota_url: Option<String>,

        /// Seconds between reconciliation cycles
        #[arg(long, default_value = "30", env = "LICS_RECONCILE_INTERVAL_SECS")]
        reconcile_interval_secs: u64,

        /// Maximum requests served concurrently
        #[arg(long, default_value = "1024")]
        max_inflight: usize,
    },

    /// Connect to a server, acquire licenses, hold them, then release
    Acquire {
        /// License server base URL
        #[arg(long, default_value = "http://127.0.0.1:3100", env = "LICS_SERVER_URL")]
        server: String,

        /// Algorithm to acquire, as ID=CLASS
        #[arg(long, value_parser = handlers::parse_algorithm)]
        algorithm: (u32, lics_core::types::TaskClass),

        /// Number of licenses to request
        #[arg(short, long, default_value = "1")]
        count: u32,

        /// Seconds to hold the grant before releasing
        #[arg(long, default_value = "0")]
        hold_secs: u64,
    },

    /// Print version information
    Version,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            algorithms,
            quotas,
            quota_url,
            reconcile_interval_secs,
            max_inflight,
        } => {
            server::run(server::ServeOptions {
                host,
                port,
                catalogue: algorithms,
                quota: quotas,
                quota_url,
                reconcile_interval: Duration::from_secs(reconcile_interval_secs.max(1)),
                max_inflight,
            })
            .await;
        }
        Commands::Acquire {
            server,
            algorithm,
            count,
            hold_secs,
        } => {
            let (algorithm_id, task_class) = algorithm;
            let config =
                ClientConfig::new(server, vec![AlgorithmConfig::new(algorithm_id, task_class)]);

            // The client is blocking; keep it off the runtime threads
            let outcome = tokio::task::spawn_blocking(move || {
                acquire_once(config, algorithm_id, count, hold_secs)
            })
            .await
            .expect("Acquire task panicked");

            println!("{}", serde_json::to_string_pretty(&outcome).unwrap_or_default());
            if outcome["status"] != 0 {
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("lics {}", env!("CARGO_PKG_VERSION"));
            println!("Algorithm license leasing over HTTP");
        }
    }
}

fn acquire_once(
    config: ClientConfig,
    algorithm_id: u32,
    count: u32,
    hold_secs: u64,
) -> serde_json::Value {
    let client = match LicenseClient::connect(config) {
        Ok(client) => client,
        Err(e) => {
            return serde_json::json!({ "status": e.code(), "error": e.to_string() });
        }
    };

    if !client.wait_until_connected(Duration::from_secs(10)) {
        tracing::warn!("Server did not answer within 10s");
    }

    let acquired = client.acquire(algorithm_id, count);
    let granted = *acquired.as_ref().unwrap_or(&0);
    if granted > 0 && hold_secs > 0 {
        tracing::info!(granted, hold_secs, "Holding licenses");
        std::thread::sleep(Duration::from_secs(hold_secs));
    }

    let released = if granted > 0 {
        client.release(algorithm_id, granted)
    } else {
        Ok(0)
    };
    client.shutdown();

    serde_json::json!({
        "algorithm_id": algorithm_id,
        "requested": count,
        "granted": granted,
        "status": status_of(&acquired),
        "release_status": status_of(&released),
        "error": acquired.err().map(|e| e.to_string()),
    })
}
