use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reservation_sync_service::config::{ApiVariant, ImportSource, DEFAULT_API_URL};
use reservation_sync_service::db::ReservationRepository;
use reservation_sync_service::services::ReservationImporter;

#[derive(Parser)]
#[command(name = "import-reservations")]
#[command(about = "Import reservations from the WTT3 timetable API", long_about = None)]
struct Cli {
    /// Base URL for the WTT3 API (overrides WTT3_API_URL)
    #[arg(long, env = "WTT3_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// API key for authentication (overrides WTT3_API_KEY)
    #[arg(long, env = "WTT3_API_KEY")]
    api_key: Option<String>,

    /// Upstream protocol variant: 'rest' or 'day-feed'
    #[arg(long, env = "WTT3_API_VARIANT", value_enum, default_value = "rest")]
    variant: ApiVariant,

    /// Start date filter (ISO format: YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    start_date: Option<String>,

    /// End date filter (ISO format: YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    end_date: Option<String>,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Number of parallel day fetches (day-feed variant)
    #[arg(long, env = "WTT3_FETCH_CONCURRENCY", default_value = "4")]
    concurrency: usize,

    /// Verify configuration without importing any data
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reservation_sync_service=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let start = cli
        .start_date
        .as_deref()
        .map(|value| parse_cli_datetime(value, "start-date"))
        .transpose()?;
    let end = cli
        .end_date
        .as_deref()
        .map(|value| parse_cli_datetime(value, "end-date"))
        .transpose()?;

    let source = ImportSource::new(cli.api_url, cli.api_key, cli.variant)
        .with_concurrency(cli.concurrency);

    if cli.dry_run {
        println!("DRY RUN MODE - No data will be imported");
        println!("API URL: {}", source.base_url);
        println!(
            "API key: {}",
            if source.api_key.is_some() { "***" } else { "(none)" }
        );
        println!("Variant: {:?}", source.variant);
        if let Some(start) = start {
            println!("Start date: {start}");
        }
        if let Some(end) = end {
            println!("End date: {end}");
        }
        return Ok(());
    }

    // Surface credential problems before touching the network or the database.
    if source.variant == ApiVariant::DayFeed && source.api_key.is_none() {
        return Err(
            "An API key is required for the day-feed API variant (set --api-key or WTT3_API_KEY)"
                .into(),
        );
    }

    let database_url = cli
        .database_url
        .ok_or("DATABASE_URL is required (set --database-url or the environment variable)")?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    let importer = ReservationImporter::new(&source, ReservationRepository::new(pool));
    let report = importer.import(start, end).await?;

    println!(
        "Imported {} new reservations and updated {} existing reservations.",
        report.created, report.updated
    );
    if !report.skipped.is_empty() {
        println!("Skipped {} record(s):", report.skipped.len());
        for skip in &report.skipped {
            println!("  - {}", skip.reason);
        }
    }
    if !report.fetch_failures.is_empty() {
        println!("{} fetch unit(s) failed:", report.fetch_failures.len());
        for failure in &report.fetch_failures {
            println!("  - {}: {}", failure.unit, failure.error);
        }
    }

    Ok(())
}

fn parse_cli_datetime(value: &str, flag: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
    }
    Err(format!(
        "Invalid {flag} format: {value}. Use ISO format: YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS"
    ))
}
