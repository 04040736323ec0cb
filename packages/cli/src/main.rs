#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Batch CLI for the gun violence dashboard data toolchain.
//!
//! Two scheduled entry points: `daily-update` refreshes the shooting
//! victims table, cumulative counts, and homicide totals;
//! `scrape-courts-portal` plus `finalize-courts-scraping` run the
//! weekly chunked court scrape. `save-geojson-layers` re-publishes the
//! static geography consumed by the dashboard front end.
//!
//! Exit code is 0 on success and non-zero on any fatal error; a failed
//! scheduled run changes no data files.

use clap::{Parser, Subcommand};
use gv_dashboard_pipeline::DailyUpdateOptions;
use gv_dashboard_store::paths::DataPaths;

#[derive(Parser)]
#[command(name = "gv-dashboard-data", about = "Gun violence dashboard data jobs")]
struct Cli {
    /// Override the data directory (defaults to the project's data/).
    #[arg(long, global = true)]
    data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daily pre-processing update.
    DailyUpdate {
        /// Cap on downloaded feed rows (testing aid).
        #[arg(long)]
        limit: Option<u64>,
        /// Bypass the homicide freshness and monotonicity checks.
        #[arg(long)]
        force_homicides: bool,
    },
    /// Scrape the courts portal for one chunk of DC numbers.
    ScrapeCourtsPortal {
        /// Total number of parallel worker processes.
        #[arg(long, default_value_t = 1)]
        nprocs: usize,
        /// This worker's chunk index (0-based, below --nprocs).
        #[arg(long, default_value_t = 0)]
        pid: usize,
        /// Seconds to wait between portal requests.
        #[arg(long, default_value_t = 7)]
        sleep: u64,
        /// Scrape but do not save the results.
        #[arg(long)]
        dry_run: bool,
    },
    /// Combine chunked court-scrape results into the side table.
    FinalizeCourtsScraping {
        /// Combine but do not save the results.
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-publish the geojson layers used by the dashboard.
    SaveGeojsonLayers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = gv_dashboard_cli_utils::init_logger();

    let cli = Cli::parse();
    let paths = cli
        .data_dir
        .map_or_else(DataPaths::default_root, DataPaths::new);

    match cli.command {
        Command::DailyUpdate {
            limit,
            force_homicides,
        } => {
            let options = DailyUpdateOptions {
                limit,
                force_homicides,
                ..DailyUpdateOptions::default()
            };
            let progress =
                gv_dashboard_cli_utils::IndicatifProgress::records_bar(&multi, "Downloading feed");
            gv_dashboard_pipeline::run_daily_update(&paths, &options, &progress).await?;
        }
        Command::ScrapeCourtsPortal {
            nprocs,
            pid,
            sleep,
            dry_run,
        } => {
            gv_dashboard_pipeline::run_scrape_courts(&paths, nprocs, pid, sleep, dry_run)
                .await?;
        }
        Command::FinalizeCourtsScraping { dry_run } => {
            gv_dashboard_pipeline::run_finalize_courts(&paths, dry_run)?;
        }
        Command::SaveGeojsonLayers => {
            gv_dashboard_pipeline::run_save_geojson_layers(&paths).await?;
        }
    }

    Ok(())
}
