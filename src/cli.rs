//! Command-line interface definitions and argument parsing

use clap::Parser;
use log::LevelFilter;

use crate::viz::{GridOptions, DEFAULT_BINS, DEFAULT_FONT, DEFAULT_TITLE};

/// Compare account average balances across credit card and loan use
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the accounts CSV (account_id, credit_cards, loan_date)
    #[arg(short, long, default_value = "data/accounts_analytical.csv")]
    pub accounts: String,

    /// Path to the transactions CSV (account_id, balance)
    #[arg(short, long, default_value = "data/transactions.csv")]
    pub transactions: String,

    /// Output path for the facet grid (.png or .svg)
    #[arg(short, long, default_value = "balance_facets.png")]
    pub output: String,

    /// Number of histogram bins per facet
    #[arg(short, long, default_value_t = DEFAULT_BINS)]
    pub bins: usize,

    /// TrueType/OpenType font file for all plot text
    #[arg(long, default_value = DEFAULT_FONT)]
    pub font: String,

    /// Overall plot title
    #[arg(long, default_value = DEFAULT_TITLE)]
    pub title: String,

    /// Also write the joined table to this CSV file
    #[arg(long)]
    pub export: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn grid_options(&self) -> GridOptions {
        GridOptions {
            bins: self.bins,
            title: self.title.clone(),
            font_path: self.font.clone(),
        }
    }

    /// Default log level; `RUST_LOG` still takes precedence
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}
