//! Shipment SLA - risk and SLA assessment for tracked shipments
//!
//! Module structure:
//! - `domain/` - Core business types (Shipment, Status catalog, SLA tables)
//! - `io/` - External interfaces (shipment sources, JSONL reports)
//! - `services/` - Business logic (RiskEngine, ShipmentStore, Refresher)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::json;
use shipment_sla::domain::{Priority, Shipment, ShipmentId, ShipmentType, StatusCatalog, StatusColumn};
use shipment_sla::infra::{Config, LogFormat, Metrics};
use shipment_sla::io::{JsonFileSource, ReportWriter, ShipmentSource};
use shipment_sla::services::{
    Refresher, RiskEngine, ShipmentFilter, ShipmentStore, SortDirection, SortField, SortSpec,
    StatusFilter, StoreError, SystemClock,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Shipment SLA - flags shipments that are at risk of missing, or have missed, their SLA
#[derive(Parser, Debug)]
#[command(name = "shipment-sla", version, about)]
struct Args {
    /// Path to TOML configuration file (else CONFIG_FILE, else config/dev.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Shipments JSON file, overriding [data] file
    #[arg(long, global = true)]
    data: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh and re-assess periodically until Ctrl+C
    Watch,
    /// List shipments matching a filter
    List {
        /// Substring of id, type or location (case-insensitive)
        #[arg(long)]
        search: Option<String>,
        /// all, new, in-progress or completed
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// Only delayed shipments (combines with --at-risk)
        #[arg(long)]
        delayed: bool,
        /// Only at-risk shipments (combines with --delayed)
        #[arg(long)]
        at_risk: bool,
        /// Shipment type, or "all"
        #[arg(long = "type")]
        shipment_type: Option<String>,
        /// low, medium, high or critical
        #[arg(long)]
        priority: Option<Priority>,
        /// Sort field (id, type, status, priority, created, expected, lastUpdate, risk, location)
        #[arg(long)]
        sort: Option<SortField>,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one shipment with its assessment and SLA status
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Risk totals and per-column counts
    Summary,
    /// Delayed and at-risk shipments, most severe first
    AtRisk {
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn init_logging(config: &Config) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.log_format() {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn build_store(config: &Config) -> Arc<ShipmentStore> {
    let sla = config.sla_tables();
    let catalog = StatusCatalog::from_sla(&sla);
    Arc::new(ShipmentStore::new(RiskEngine::new(sla), catalog, Arc::new(SystemClock)))
}

/// One-shot load for the query commands
async fn load_store(config: &Config) -> anyhow::Result<Arc<ShipmentStore>> {
    let store = build_store(config);
    let source = JsonFileSource::new(config.data_file());
    let ticket = store.begin_snapshot();
    let shipments = source.fetch().await?;
    store
        .apply_snapshot(ticket, shipments)
        .context("snapshot superseded during load")?;
    Ok(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref());
    if let Some(data) = &args.data {
        config = config.with_data_file(data);
    }

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        config_file = %config.config_file(),
        data_file = %config.data_file(),
        refresh_interval_secs = %config.refresh_interval_secs(),
        report_enabled = %config.report_enabled(),
        "config_loaded"
    );

    match args.command {
        Command::Watch => run_watch(config).await,
        Command::List { search, status, delayed, at_risk, shipment_type, priority, sort, desc, json } => {
            let filter = ShipmentFilter {
                search: search.unwrap_or_default(),
                status,
                show_delayed: delayed,
                show_at_risk: at_risk,
                shipment_type: shipment_type
                    .filter(|t| !t.eq_ignore_ascii_case("all"))
                    .map(|t| t.parse::<ShipmentType>().unwrap_or_else(|never| match never {})),
                priority,
                sort: sort.map(|field| SortSpec {
                    field,
                    direction: if desc { SortDirection::Desc } else { SortDirection::Asc },
                }),
            };
            let store = load_store(&config).await?;
            let shipments = store.query(&filter);
            if json {
                println!("{}", serde_json::to_string_pretty(&shipments)?);
            } else {
                print_table(&shipments);
            }
            Ok(())
        }
        Command::Show { id, json } => {
            let store = load_store(&config).await?;
            show(&store, &ShipmentId::new(id), json)
        }
        Command::Summary => {
            let store = load_store(&config).await?;
            let summary = store.summary();
            println!(
                "total: {}  on time: {}  at risk: {}  delayed: {}",
                summary.total.count, summary.total.on_time, summary.total.at_risk, summary.total.delayed
            );
            for column in [StatusColumn::New, StatusColumn::InProgress, StatusColumn::Completed] {
                println!("{:<12} {}", column.label(), summary.grouped.column(column).len());
            }
            Ok(())
        }
        Command::AtRisk { limit } => {
            let store = load_store(&config).await?;
            print_table(&store.at_risk(limit.unwrap_or(config.at_risk_limit())));
            Ok(())
        }
    }
}

async fn run_watch(config: Config) -> anyhow::Result<()> {
    let store = build_store(&config);
    let metrics = Arc::new(Metrics::new());
    let source: Arc<dyn ShipmentSource> = Arc::new(JsonFileSource::new(config.data_file()));

    let mut refresher = Refresher::new(source, store, metrics.clone())
        .with_interval(Duration::from_secs(config.refresh_interval_secs().max(1)));
    if config.report_enabled() {
        refresher = refresher.with_report(ReportWriter::new(config.report_file()));
    }

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        // first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    refresher.run(shutdown_rx).await;

    metrics.report().log();
    info!("shipment-sla shutdown complete");
    Ok(())
}

fn show(store: &ShipmentStore, id: &ShipmentId, json: bool) -> anyhow::Result<()> {
    let shipment = match store.get(id) {
        Ok(shipment) => shipment,
        Err(StoreError::NotFound(id)) => bail!("shipment {} not found", id),
        Err(e) => return Err(e.into()),
    };
    let assessment = store.assessment(id)?;
    let sla = store.sla_status(id)?;
    let info = store.catalog().status_info(&shipment.status);

    if json {
        let out = json!({ "shipment": shipment, "assessment": assessment, "sla": sla });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}  [{}]", shipment.id, shipment.risk_level.label());
    println!("  type:        {}", shipment.shipment_type);
    println!("  priority:    {}", shipment.priority);
    println!("  status:      {} ({})", info.label, shipment.status);
    println!("  location:    {}", shipment.current_location);
    println!("  created:     {}", shipment.created_date);
    println!("  expected:    {}", shipment.expected_delivery);
    println!("  sla:         {}", sla.label());
    println!(
        "  in status:   {:.1}h of {}h",
        assessment.status_elapsed_hours, assessment.status_sla_hours
    );
    println!(
        "  total:       {:.1}h of {}h",
        assessment.total_elapsed_hours, assessment.shipment_sla_hours
    );
    if !assessment.reasons.is_empty() {
        let reasons: Vec<&str> = assessment.reasons.iter().map(|r| r.as_str()).collect();
        println!("  reasons:     {}", reasons.join(", "));
    }
    if let Some(reason) = &shipment.delay_reason {
        println!("  delay:       {}", reason);
    }
    for issue in assessment.issues.iter().chain(sla.issue.iter()) {
        println!("  data issue:  {}", issue);
    }
    if !info.can_transition_to.is_empty() {
        let next: Vec<&str> = info.can_transition_to.iter().map(|s| s.as_str()).collect();
        println!("  next:        {}", next.join(", "));
    }
    Ok(())
}

fn print_table(shipments: &[Shipment]) {
    println!(
        "{:<42} {:<18} {:<24} {:<9} {:<8} {}",
        "ID", "TYPE", "STATUS", "PRIORITY", "RISK", "LOCATION"
    );
    for s in shipments {
        println!(
            "{:<42} {:<18} {:<24} {:<9} {:<8} {}",
            s.id.as_str(),
            s.shipment_type.as_str(),
            s.status.as_str(),
            s.priority.as_str(),
            s.risk_level.label(),
            s.current_location
        );
    }
}
