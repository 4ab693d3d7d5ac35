mod config;
mod graphql;
mod http;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_db::{DbPool, connect, table_inventory};
use platform_obs::{ObsConfig, init_tracing};
use products_deals::{AnthropicScorer, DealStore, NewDeal, PriceType};
use sea_orm::ActiveEnum;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    graphql::GraphqlData,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "dealdesk", version, about = "Commodity deal desk")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// List tables with their row counts.
    Tables,
    /// Show the most recently received deal.
    Check,
    /// Insert a demo deal.
    Seed,
    /// Reset corrupted AI reasoning on scored deals.
    #[command(name = "repair-reasoning")]
    RepairReasoning,
    /// Score one deal with the AI scorer and store the result.
    Score {
        #[arg(value_name = "DEAL_ID")]
        deal_id: i32,
    },
    /// Print the GraphQL schema.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Write to a file instead of stdout")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Roll back the most recent migration.
    Down,
    /// Roll back everything and re-apply.
    Reset,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "127.0.0.1")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 5000)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<&ServeCommand> for ServeConfig {
    fn from(value: &ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::default().from_env())?;
    let cli = Cli::parse();
    let config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, config).await,
        Command::Migrate(action) => migrate(action, &config).await,
        Command::Tables => print_tables(&config).await,
        Command::Check => check_latest(&config).await,
        Command::Seed => run_seed(&config).await,
        Command::RepairReasoning => repair_reasoning(&config).await,
        Command::Score { deal_id } => score_deal(deal_id, &config).await,
        Command::SchemaPrint { output } => schema_print(output).await,
    }
}

async fn setup_pool(config: &AppConfig) -> Result<DbPool> {
    connect(&config.database)
        .await
        .with_context(|| format!("failed to open {}", config.database.url))
}

async fn open_store(config: &AppConfig) -> Result<DealStore> {
    let pool = setup_pool(config).await?;
    ensure_migrations(&pool, false).await?;
    Ok(DealStore::new(pool))
}

fn build_scorer(config: &AppConfig) -> Result<Option<Arc<AnthropicScorer>>> {
    if config.scorer.api_key.is_none() {
        warn!("ANTHROPIC_API_KEY not set; AI scoring disabled");
        return Ok(None);
    }
    let scorer = AnthropicScorer::new(config.scorer.clone()).context("failed to build scorer")?;
    Ok(Some(Arc::new(scorer)))
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool(&config).await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let store = DealStore::new(pool);
    let schema = graphql::build_schema(GraphqlData {
        store: store.clone(),
        scorer: build_scorer(&config)?,
    });
    let attachments = Arc::new(config.attachment_policy());
    let state = AppState {
        store,
        schema,
        config: config.clone(),
        attachments,
    };
    http::serve(ServeConfig::from(&cmd), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        bail!("pending migrations detected; run `dealdesk migrate up` or pass --allow-dirty");
    }
    Ok(())
}

async fn migrate(action: MigrateCommand, config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    match action {
        MigrateCommand::Up => {
            Migrator::up(&pool, None).await?;
            info!("database migrations applied");
        }
        MigrateCommand::Down => {
            Migrator::down(&pool, Some(1)).await?;
            info!("most recent migration rolled back");
        }
        MigrateCommand::Reset => {
            Migrator::reset(&pool).await?;
            Migrator::up(&pool, None).await?;
            info!("database reset");
        }
    }
    Ok(())
}

async fn print_tables(config: &AppConfig) -> Result<()> {
    let pool = setup_pool(config).await?;
    let tables = table_inventory(&pool).await?;
    if tables.is_empty() {
        println!("no tables; run `dealdesk migrate up`");
    }
    for table in tables {
        println!("{:<24} {:>8} rows", table.name, table.rows);
    }
    Ok(())
}

async fn check_latest(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let Some(deal) = store.latest_deal().await? else {
        println!("no deals found");
        return Ok(());
    };
    let pct = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v}%"));
    println!("most recent deal");
    println!("  id:          {}", deal.id);
    println!("  commodity:   {}", deal.commodity_type);
    println!("  source:      {}", deal.source_name);
    println!("  status:      {}", deal.status);
    println!("  price type:  {}", deal.price_type.to_value());
    println!("  gross:       {}", pct(deal.gross_discount));
    println!("  commission:  {}", pct(deal.commission));
    println!("  net:         {}", pct(deal.net_discount));
    Ok(())
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let today = chrono::Local::now().date_naive();
    let deal = store
        .create_deal(NewDeal {
            deal_text: Some("Ghana gold dore bars, 500kg, LME -9%, SBLC payment, CIF".into()),
            price_type: PriceType::LmeDiscount,
            gross_discount: Some(9.0),
            quantity: Some(500.0),
            quantity_unit: Some("kg".into()),
            origin_country: Some("Ghana".into()),
            payment_method: Some("SBLC".into()),
            shipping_terms: Some("CIF".into()),
            ..NewDeal::new("Gold", "John Mensah", today)
        })
        .await?;
    info!(deal_id = deal.id, "demo deal inserted");
    Ok(())
}

async fn repair_reasoning(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let report = store.repair_ai_reasoning().await?;
    println!("{} scored deal(s) checked", report.scored);
    for id in &report.repaired {
        println!("  deal {id}: cleared corrupted reasoning");
    }
    for id in &report.invalid_analysis {
        println!("  deal {id}: analysis is not valid JSON (kept as-is)");
    }
    Ok(())
}

async fn score_deal(deal_id: i32, config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    let Some(scorer) = build_scorer(config)? else {
        bail!("ANTHROPIC_API_KEY is required for scoring");
    };
    let deal = store
        .get_deal(deal_id)
        .await?
        .with_context(|| format!("deal {deal_id} not found"))?;
    let analysis = scorer.score_deal(&deal).await?;
    store.record_ai_score(deal_id, &analysis).await?;
    println!(
        "deal {deal_id}: score {} ({:?} risk) via {}",
        analysis.score,
        analysis.risk_level,
        scorer.model()
    );
    for line in &analysis.reasoning {
        println!("  - {line}");
    }
    Ok(())
}

async fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let pool = connect(&platform_db::DatabaseSettings::in_memory()).await?;
    let schema = graphql::build_schema(GraphqlData {
        store: DealStore::new(pool),
        scorer: None,
    });
    let sdl = schema.sdl();
    match path {
        Some(target) => {
            std::fs::write(&target, sdl)
                .with_context(|| format!("failed to write {}", target.display()))?;
            info!(path = %target.display(), "schema written");
        }
        None => println!("{sdl}"),
    }
    Ok(())
}
