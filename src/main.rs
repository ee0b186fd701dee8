use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use vox_gateway::{
    ServerConfig, TwilioRestClient, routes,
    simulate::{self, SimulateOptions},
    state::AppState,
};

/// Vox Gateway - Twilio phone calls bridged to OpenAI Realtime
#[derive(Parser, Debug)]
#[command(name = "vox-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the bridge server
    Serve {
        /// Host to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(long)]
        port: Option<u16>,
    },

    /// Place an outbound call via Twilio that connects back to /twiml
    Dial {
        /// Destination phone number in E.164, e.g. +14155550123
        to: String,

        /// Caller ID / Twilio number in E.164
        #[arg(long)]
        from: String,

        /// Override the TwiML URL (defaults to VOX_PUBLIC_BASE_URL + /twiml)
        #[arg(long = "twiml-url")]
        twiml_url: Option<String>,
    },

    /// Run a local text simulation over stdin/stdout
    Simulate {
        /// Do not play assistant audio
        #[arg(long = "no-play")]
        no_play: bool,

        /// Directory to write logs and WAV files (defaults to VOX_LOG_DIR)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("vox: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Install the crypto provider before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        info!("Loading configuration from {}", config_path.display());
        ServerConfig::from_file(config_path)?
    } else {
        ServerConfig::from_env()?
    };

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Dial {
            to,
            from,
            twiml_url,
        } => dial(&config, &to, &from, twiml_url).await,
        Commands::Simulate { no_play, out } => {
            let out_dir = out.unwrap_or_else(|| config.log_dir.clone());
            simulate::run(
                &config,
                SimulateOptions {
                    out_dir,
                    play_audio: !no_play,
                },
            )
            .await
        }
    }
}

async fn serve(mut config: ServerConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        if port == 0 {
            anyhow::bail!("Invalid --port: {port}");
        }
        config.port = port;
    }

    tokio::fs::create_dir_all(&config.log_dir)
        .await
        .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;

    let address = config.address();
    let socket_addr: SocketAddr = tokio::net::lookup_host(&address)
        .await
        .with_context(|| format!("Invalid server address '{address}'"))?
        .next()
        .ok_or_else(|| anyhow!("Invalid server address '{}'", address))?;

    if config.public_base_url.is_none() {
        info!("VOX_PUBLIC_BASE_URL not set; /twiml will answer 500 until it is configured");
    }

    let app = routes::create_router(AppState::new(config));

    let listener = TcpListener::bind(&socket_addr).await?;
    println!("vox serve listening on http://{socket_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn dial(
    config: &ServerConfig,
    to: &str,
    from: &str,
    twiml_url: Option<String>,
) -> anyhow::Result<()> {
    let twiml_url = twiml_url
        .filter(|url| !url.is_empty())
        .or_else(|| config.twiml_url().map(String::from))
        .ok_or_else(|| {
            anyhow!(
                "Missing TwiML URL. Set VOX_PUBLIC_BASE_URL (public https base URL for your running `vox serve`) or pass --twiml-url."
            )
        })?;

    let client = TwilioRestClient::new(
        config.twilio_account_sid.as_deref(),
        config.twilio_auth_token.as_deref(),
    )?;
    let result = client.dial(to, from, &twiml_url).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
