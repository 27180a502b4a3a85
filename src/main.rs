use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use coursework::{config::Config, db::Db, AppState};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, env = "COURSEWORK_CONFIG", default_value = ".config.json")]
    config: PathBuf,

    /// The address to bind to.
    #[arg(short, long, env = "COURSEWORK_ADDRESS", default_value = "127.0.0.1:8080")]
    address: String,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "coursework=debug,tower_http=info".to_owned());

    let log_file = match &config.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("could not open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(fmt::layer().with_span_events(fmt::format::FmtSpan::CLOSE))
        .with(log_file)
        .init();

    let db = Db::new(&config.database_url).await?;
    let app = coursework::router(AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(&args.address)
        .await
        .wrap_err_with(|| format!("could not bind {}", args.address))?;
    tracing::info!("listening on {}", args.address);
    axum::serve(listener, app).await?;

    Ok(())
}
