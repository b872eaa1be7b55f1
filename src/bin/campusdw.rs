use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "campusdw", about = "Campus admissions and revenue metrics warehouse")]
struct Cli {
    /// Database path (default: ~/.campusdw/campusdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Period-over-period metrics by campus
    Metrics {
        /// Metric: leads, closed-won, cumulative-arr
        metric: String,
        /// Period unit: day, week, month (default: config default_period)
        #[arg(long)]
        period: Option<String>,
        /// Number of periods to include, or a window like 12w / 90d / 6m
        #[arg(long)]
        lookback: Option<String>,
        /// Restrict to one campus ID
        #[arg(long)]
        campus: Option<String>,
        /// Window end date (YYYY-MM-DD, default: today)
        #[arg(long)]
        as_of: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace a warehouse table with a Sheets API ValueRange export
    Import {
        /// Target: campuses, leads, opportunities, fellows, property_pipeline
        target: String,
        /// Path to the ValueRange JSON file
        file: String,
    },
    /// Run an ad-hoc SQL query and print rows as JSON
    Sql {
        query: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show warehouse status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => campusdw::Database::open_at(path).await?,
        None => campusdw::Database::open().await?,
    };
    let dw = campusdw::CampusDW::new(db);

    match cli.command {
        Commands::Metrics {
            metric,
            period,
            lookback,
            campus,
            as_of,
            json,
        } => {
            let kind = campusdw::MetricKind::parse(&metric)?;
            let mut request = dw.default_request().await?;
            if let Some(p) = period {
                request.period = campusdw::PeriodUnit::parse(&p)?;
            }
            if let Some(l) = lookback {
                apply_lookback(&mut request, &l)?;
            }
            request.campus_id = campus;
            request.as_of = match as_of {
                Some(s) => Some(
                    chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                        .map_err(|_| anyhow::anyhow!("Invalid --as-of date: {s}"))?,
                ),
                None => None,
            };
            let summary = dw.metrics(kind, &request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Import { target, file } => {
            let report = dw.import_sheet(&target, &file).await?;
            print_sync_report(&report);
        }
        Commands::Sql { query } => {
            let rows = dw.execute_sql(&query).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Config { action } => {
            handle_config(&dw, action).await?;
        }
        Commands::Status => {
            print_status(&dw).await?;
        }
    }

    Ok(())
}

/// `--lookback 8` keeps the period unit; `--lookback 8w` sets both.
fn apply_lookback(request: &mut campusdw::MetricsRequest, value: &str) -> anyhow::Result<()> {
    if let Ok(n) = value.trim().parse::<u32>() {
        request.lookback_units = n;
    } else {
        let window = campusdw::LookbackWindow::parse(value)?;
        request.period = window.unit;
        request.lookback_units = window.units;
    }
    Ok(())
}

async fn handle_config(dw: &campusdw::CampusDW, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dw.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dw.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = dw.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(dw: &campusdw::CampusDW) -> anyhow::Result<()> {
    let status = dw.status().await?;
    println!("Warehouse Status");
    for (table, count) in &status.tables {
        println!("  {table:<24} {count}");
    }
    println!();
    if status.recent_jobs.is_empty() {
        println!("  No imports yet.");
    } else {
        println!("  Recent imports:");
        for job in &status.recent_jobs {
            println!(
                "    #{} {} {} ({} rows, {} failed) at {}",
                job.id,
                job.target,
                job.status,
                job.items_synced,
                job.items_failed,
                job.completed_at.as_deref().unwrap_or(&job.started_at)
            );
        }
    }
    Ok(())
}

fn print_summary(s: &campusdw::MetricsSummary) {
    println!("{} by {} ({} periods)", s.metric, s.period_type, s.periods.len());
    if s.periods.is_empty() {
        println!("  No data in this window.");
        return;
    }
    if let Some(latest) = s.latest_period {
        println!("  Latest: {} = {}", latest, format_value(s.latest_total));
    }
    println!();
    for point in &s.time_series {
        let change = s.changes.get(&point.period).copied().unwrap_or_default();
        println!(
            "  {:<16} {:>12}  {:>10}  {:>+7.1}%",
            point.formatted_date,
            format_value(point.total),
            format_delta(change.raw),
            change.percentage
        );
    }
    if !s.campuses.is_empty() {
        println!();
        println!("  By campus:");
        for campus in &s.campuses {
            let total = s.campus_totals.get(campus).copied().unwrap_or(0.0);
            println!("    {campus:<24} {}", format_value(total));
        }
    }
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

fn format_delta(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:+.0}")
    } else {
        format!("{v:+.2}")
    }
}

fn print_sync_report(report: &campusdw::SyncReport) {
    println!("Import: {}", report.target);
    println!("  Status:   {:?}", report.status);
    println!("  Imported: {}", report.items_synced);
    println!("  Replaced: {}", report.items_removed);
    if report.items_failed > 0 {
        println!("  Failed:   {}", report.items_failed);
    }
    if let Some(ref err) = report.error {
        println!("  Error:    {err}");
    }
}
