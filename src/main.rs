use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};

use liquidity_migration::bootstrap::AppState;
use liquidity_migration::config::Config;
use liquidity_migration::engine::service;

#[derive(Parser, Debug)]
#[command(name = "migration-analytics")]
#[command(about = "Execution quality and vault performance across a Uniswap V2 -> V4 liquidity migration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Snapshot the V2 pair: tokens, decimals, reserves.
    PairMetadata(BlockArgs),
    /// List V2 Burn events around a candidate block.
    ConfirmMigration(ConfirmArgs),
    /// Pick the final migration block and record the rule that chose it.
    SelectMigration(SelectArgs),
    /// Pre-migration V2 slippage series.
    V2Slippage,
    /// Post-migration V4 slippage series.
    V4Slippage,
    /// Vault composition, value and baselines after migration.
    VaultTimeseries,
    /// Vault ranges, tick coverage and current tick estimate.
    Liquidity(BlockArgs),
    /// Median / p90 of fee-excluded slippage per venue, direction and size.
    Summary,
}

#[derive(Args, Debug)]
struct BlockArgs {
    /// Block to read at; defaults to the chain head.
    #[arg(long)]
    block: Option<u64>,
}

#[derive(Args, Debug)]
struct ConfirmArgs {
    #[arg(long)]
    candidate_block: u64,
}

#[derive(Args, Debug)]
struct SelectArgs {
    /// Center of the Burn scan window.
    #[arg(long)]
    candidate_block: Option<u64>,

    /// Regime-change estimate, used when no Burn is found.
    #[arg(long)]
    regime_change_block: Option<u64>,

    /// Largest Sync-drop block, the last fallback.
    #[arg(long)]
    sync_drop_block: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = Config::from_env().map_err(|e| anyhow!("{}", e)).context("failed to load configuration")?;
    let state = AppState::new(&config)
        .map_err(|e| anyhow!("{}", e))
        .context("failed to initialize application state")?;

    match cli.command {
        Commands::PairMetadata(args) => {
            let meta = service::pair_metadata(&state, args.block).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Commands::ConfirmMigration(args) => {
            let burns = service::confirm_migration(&state, args.candidate_block).await?;
            println!("{} Burn events around block {}", burns.len(), args.candidate_block);
        }
        Commands::SelectMigration(args) => {
            let record =
                service::select_migration(&state, args.candidate_block, args.regime_change_block, args.sync_drop_block)
                    .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::V2Slippage => {
            let records = service::v2_slippage(&state).await?;
            println!("{} V2 slippage rows", records.len());
        }
        Commands::V4Slippage => {
            let records = service::v4_slippage(&state).await?;
            println!("{} V4 slippage rows", records.len());
        }
        Commands::VaultTimeseries => match service::vault_timeseries(&state).await? {
            Some(perf) => println!("{}", serde_json::to_string_pretty(&perf)?),
            None => println!("no vault observations"),
        },
        Commands::Liquidity(args) => {
            let snap = service::liquidity(&state, args.block).await?;
            println!("{}", serde_json::to_string_pretty(&snap)?);
        }
        Commands::Summary => {
            for row in service::summary(&state)? {
                println!(
                    "{:<11} {:<10} {:>8}  median={}  p90={}  n={}",
                    row.venue,
                    row.direction,
                    row.usd_notional,
                    liquidity_migration::output::dec_str(&row.median_pct),
                    liquidity_migration::output::dec_str(&row.p90_pct),
                    row.count
                );
            }
        }
    }
    Ok(())
}
