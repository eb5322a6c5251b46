//! Joined analysis records, facet partitioning and histogram binning

use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Whether an account holds at least one credit card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CreditCardUse {
    NoCreditCards,
    HasCreditCards,
}

impl CreditCardUse {
    pub const ALL: [CreditCardUse; 2] = [CreditCardUse::NoCreditCards, CreditCardUse::HasCreditCards];

    pub fn from_presence(present: bool) -> Self {
        if present {
            CreditCardUse::HasCreditCards
        } else {
            CreditCardUse::NoCreditCards
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CreditCardUse::NoCreditCards => "No Credit Cards",
            CreditCardUse::HasCreditCards => "Has Credit Card(s)",
        }
    }
}

impl fmt::Display for CreditCardUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CreditCardUse {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CreditCardUse::ALL
            .into_iter()
            .find(|c| c.label() == s)
            .ok_or_else(|| PipelineError::UnknownLabel {
                kind: "credit card",
                label: s.to_string(),
            })
    }
}

/// Whether an account has ever had a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoanUse {
    NoLoans,
    HasLoans,
}

impl LoanUse {
    pub const ALL: [LoanUse; 2] = [LoanUse::NoLoans, LoanUse::HasLoans];

    pub fn from_presence(present: bool) -> Self {
        if present {
            LoanUse::HasLoans
        } else {
            LoanUse::NoLoans
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoanUse::NoLoans => "No Loans",
            LoanUse::HasLoans => "Has Loan(s)",
        }
    }
}

impl fmt::Display for LoanUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LoanUse {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LoanUse::ALL
            .into_iter()
            .find(|l| l.label() == s)
            .ok_or_else(|| PipelineError::UnknownLabel {
                kind: "loan",
                label: s.to_string(),
            })
    }
}

/// One row of the joined table: an account with transactions, its two
/// labels and the mean of its transaction balances.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountBalance {
    pub account_id: String,
    pub cc_user: CreditCardUse,
    pub loan_user: LoanUse,
    pub avg_balance: f64,
}

/// The balances falling into one (loan, credit card) cell of the grid
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub loan_user: LoanUse,
    pub cc_user: CreditCardUse,
    pub balances: Vec<f64>,
}

/// Count, mean and extent of the finite balances of a facet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacetSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl Facet {
    pub fn summary(&self) -> Option<FacetSummary> {
        let finite: Vec<f64> = self.balances.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }

        let min = finite.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = finite.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;

        Some(FacetSummary {
            count: finite.len(),
            mean,
            min,
            max,
        })
    }
}

/// Split records into the four grid cells, row-major: loan use selects the
/// row, credit card use the column. Every cell is present even when empty.
pub fn partition_facets(records: &[AccountBalance]) -> Vec<Facet> {
    let mut facets = Vec::with_capacity(LoanUse::ALL.len() * CreditCardUse::ALL.len());
    for loan_user in LoanUse::ALL {
        for cc_user in CreditCardUse::ALL {
            let balances = records
                .iter()
                .filter(|r| r.loan_user == loan_user && r.cc_user == cc_user)
                .map(|r| r.avg_balance)
                .collect();
            facets.push(Facet {
                loan_user,
                cc_user,
                balances,
            });
        }
    }
    facets
}

/// Equal-width histogram over the range of its own values
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges, or none for an empty histogram
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `values` into `bins` equal-width bins spanning `[min, max]`.
    /// The last bin is closed on the right. A constant input spans
    /// `[v - 0.5, v + 0.5]`. Non-finite values are skipped.
    pub fn from_values(values: &[f64], bins: usize) -> crate::Result<Self> {
        if bins == 0 {
            return Err(PipelineError::InvalidBinCount.into());
        }

        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Ok(Histogram {
                edges: Vec::new(),
                counts: Vec::new(),
            });
        }

        let mut lo = finite.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let mut hi = finite.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / bins as f64;
        let mut edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        edges[bins] = hi;

        let mut counts = vec![0; bins];
        for v in finite {
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Ok(Histogram { edges, counts })
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(first edge, last edge)`, if any values were binned
    pub fn range(&self) -> Option<(f64, f64)> {
        Some((*self.edges.first()?, *self.edges.last()?))
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// `(left edge, right edge, count)` for each bin
    pub fn bars(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        self.edges
            .windows(2)
            .zip(self.counts.iter())
            .map(|(w, &c)| (w[0], w[1], c))
    }
}
