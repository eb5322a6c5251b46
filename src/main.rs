//! balancegrid: average balance by loan and credit card use
//!
//! Orchestrates loading, aggregation, joining, reporting and rendering.

use anyhow::Result;
use balancegrid::{load_and_join, render_facet_grid, viz, Args};
use clap::Parser;
use log::debug;
use std::time::Instant;

fn main() -> Result<()> {
    let args = Args::parse();

    pretty_env_logger::formatted_builder()
        .filter_level(args.log_level())
        .parse_env("RUST_LOG")
        .init();

    let start_time = Instant::now();

    debug!("accounts: {}, transactions: {}", args.accounts, args.transactions);
    let table = load_and_join(&args.accounts, &args.transactions)?;
    let data_time = start_time.elapsed();

    println!("✓ Data joined: {} accounts", table.len());
    if args.verbose {
        println!("  Processing time: {:.2}s", data_time.as_secs_f64());
    }

    viz::print_facet_statistics(&table);

    if let Some(export_path) = &args.export {
        table.export_csv(export_path)?;
        println!("\nJoined table saved to: {}", export_path);
    }

    let viz_start = Instant::now();
    render_facet_grid(&table.records, &args.grid_options(), &args.output)?;

    println!("\nFacet grid saved to: {}", args.output);
    if args.verbose {
        println!("  Rendering time: {:.2}s", viz_start.elapsed().as_secs_f64());
        println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    }

    Ok(())
}
