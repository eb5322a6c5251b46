//! balancegrid: compare account average balances across credit card and loan use
//!
//! Loads account and transaction tables, averages each account's balance,
//! labels accounts by card and loan use and renders a faceted histogram grid.

pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_and_join, AnalysisTable};
pub use error::PipelineError;
pub use model::{AccountBalance, CreditCardUse, LoanUse};
pub use viz::{render_facet_grid, GridOptions};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
