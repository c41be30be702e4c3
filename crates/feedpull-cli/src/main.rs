use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use feedpull_client::{OAuthTokenProvider, ReqwestFetcher};
use feedpull_core::config::DEFAULT_CONCURRENCY;
use feedpull_core::{
    AppError, CompositeRecord, Environment, HarvestConfig, Harvester, LibrarySelector,
    TokenProvider, TracingHarvestReporter,
};

#[derive(Parser, Debug)]
#[command(
    name = "feedpull",
    version,
    about = "Harvest a library's catalogue from the Overdrive API into a JSON file"
)]
struct Cli {
    /// File to write the harvested records to (JSON array)
    output: PathBuf,

    /// OAuth client key
    #[arg(short = 'k', long, env = "OVERDRIVE_CLIENT_KEY")]
    client_key: String,

    /// OAuth client secret
    #[arg(short = 's', long, env = "OVERDRIVE_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Library to harvest
    #[arg(short, long)]
    library_id: String,

    /// Parent library, for Advantage accounts
    #[arg(short, long)]
    parent_library_id: Option<String>,

    /// Use the QA integration host instead of production
    #[arg(short, long, default_value_t = false)]
    qa: bool,

    /// Also fetch each product's metadata
    #[arg(short, long, default_value_t = false)]
    metadata: bool,

    /// Also fetch each product's availability (v1 and v2)
    #[arg(short, long, default_value_t = false)]
    availability: bool,

    /// Maximum requests in flight
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,
}

impl Cli {
    fn environment(&self) -> Environment {
        if self.qa {
            Environment::Qa
        } else {
            Environment::Production
        }
    }

    fn library(&self) -> LibrarySelector {
        match &self.parent_library_id {
            Some(parent) => LibrarySelector::advantage(&self.library_id, parent),
            None => LibrarySelector::new(&self.library_id),
        }
    }

    fn harvest_config(&self) -> HarvestConfig {
        HarvestConfig::for_environment(self.environment())
            .with_concurrency(self.concurrency)
            .with_metadata(self.metadata)
            .with_availability(self.availability)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialise logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_failure(&e));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("feedpull=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(cli: &Cli) -> Result<()> {
    let config = cli.harvest_config();
    let library = cli.library();
    let timeout = Duration::from_secs(cli.timeout_secs);

    tracing::info!(
        environment = %cli.environment(),
        library_id = %library.library_id,
        concurrency = config.concurrency,
        "Requesting access token"
    );
    let token = OAuthTokenProvider::new(&cli.client_key, &cli.client_secret)?
        .with_timeout(timeout)?
        .bearer_token()
        .await
        .context("Failed to obtain access token")?;

    let fetcher = ReqwestFetcher::with_timeout(&config.base_url, &token, timeout)
        .context("Failed to create HTTP client")?;
    let harvester = Harvester::new(fetcher, config)?;

    let report = harvester.run(&library, &TracingHarvestReporter).await?;
    tracing::info!(
        pages = report.stats.pages_fetched,
        sub_resources = report.stats.sub_resources_fetched,
        retries = report.stats.retries,
        peak_in_flight = report.stats.peak_in_flight,
        "Harvest complete"
    );

    write_records(&cli.output, &report.records)?;
    tracing::info!(
        records = report.records.len(),
        path = %cli.output.display(),
        "Records written"
    );
    Ok(())
}

/// Write records as a pretty-printed JSON array.
fn write_records(path: &Path, records: &[CompositeRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records).context("Failed to serialise records")?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// The message printed before exiting on a fatal error.
///
/// API failures carry the response diagnostic (status, headers, body).
fn render_failure(error: &anyhow::Error) -> String {
    match error
        .downcast_ref::<AppError>()
        .and_then(AppError::failed_response)
    {
        Some(failed) => format!("{error:#}\n{}", failed.diagnostic()),
        None => format!("Error: {error:#}"),
    }
}
