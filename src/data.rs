//! Table loading, balance aggregation and label joining using Polars

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use log::{debug, info, warn};
use polars::prelude::*;

use crate::error::PipelineError;
use crate::model::{AccountBalance, CreditCardUse, LoanUse};

pub const ACCOUNT_ID: &str = "account_id";
pub const BALANCE: &str = "balance";
pub const CREDIT_CARDS: &str = "credit_cards";
pub const LOAN_DATE: &str = "loan_date";
pub const AVG_BALANCE: &str = "avg_balance";
pub const CC_USER: &str = "cc_user";
pub const LOAN_USER: &str = "loan_user";

const ROW_NR: &str = "row_nr";

const ACCOUNT_COLUMNS: [&str; 3] = [ACCOUNT_ID, CREDIT_CARDS, LOAN_DATE];
const TRANSACTION_COLUMNS: [&str; 2] = [ACCOUNT_ID, BALANCE];

/// The joined analysis table: one row per account present in both inputs
#[derive(Debug, Clone)]
pub struct AnalysisTable {
    /// Columns `account_id`, `cc_user`, `loan_user`, `avg_balance`, in
    /// accounts-file order
    pub frame: DataFrame,
    /// The same rows, decoded
    pub records: Vec<AccountBalance>,
}

impl AnalysisTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the joined table as CSV
    pub fn export_csv(&self, output_path: &str) -> crate::Result<()> {
        let mut file = File::create(output_path)
            .with_context(|| format!("cannot create export file {}", output_path))?;
        let mut frame = self.frame.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
        info!("exported {} joined rows to {}", frame.height(), output_path);
        Ok(())
    }
}

/// Load both tables, aggregate balances and join them with account labels
///
/// # Arguments
/// * `accounts_path` - CSV with `account_id`, `credit_cards`, `loan_date`
/// * `transactions_path` - CSV with `account_id`, `balance`
pub fn load_and_join(accounts_path: &str, transactions_path: &str) -> crate::Result<AnalysisTable> {
    let accounts = load_table(accounts_path, "accounts", &ACCOUNT_COLUMNS)?;
    let transactions = load_table(transactions_path, "transactions", &TRANSACTION_COLUMNS)?;

    let avg_balances = average_balances(transactions)?;
    let labels = categorize_accounts(accounts)?;
    let frame = join_balances(labels, avg_balances)?;

    let records = decode_records(&frame)?;
    Ok(AnalysisTable { frame, records })
}

/// Read a CSV file completely and check it carries the columns we consume.
/// Every column is read as text; consumers cast what they need, so a late
/// float or non-numeric token never fails the whole read.
pub fn load_table(path: &str, table: &'static str, required: &[&'static str]) -> crate::Result<DataFrame> {
    if !Path::new(path).exists() {
        anyhow::bail!("{} file not found: {}", table, path);
    }

    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .and_then(|lf| lf.collect())
        .with_context(|| format!("cannot read {} table from {}", table, path))?;

    for &column in required {
        if df.column(column).is_err() {
            return Err(PipelineError::MissingColumn { table, column }.into());
        }
    }

    debug!("loaded {} rows from {} ({})", df.height(), path, table);
    Ok(df)
}

/// Mean balance per account id. Ids without transactions never appear;
/// unparseable or missing balances are left out of the mean.
pub fn average_balances(transactions: DataFrame) -> crate::Result<DataFrame> {
    let avg_df = transactions
        .lazy()
        .select([
            col(ACCOUNT_ID).cast(DataType::String),
            col(BALANCE).cast(DataType::Float64),
        ])
        .group_by([col(ACCOUNT_ID)])
        .agg([col(BALANCE).mean().alias(AVG_BALANCE)])
        .collect()?;

    debug!("aggregated balances for {} accounts", avg_df.height());
    Ok(avg_df)
}

/// Derive the credit card and loan labels from the presence of the
/// optional `credit_cards` and `loan_date` fields.
pub fn categorize_accounts(accounts: DataFrame) -> crate::Result<DataFrame> {
    let labels_df = accounts
        .lazy()
        .with_row_index(ROW_NR, None)
        .select([
            col(ROW_NR),
            col(ACCOUNT_ID).cast(DataType::String),
            when(col(CREDIT_CARDS).is_null())
                .then(lit(CreditCardUse::NoCreditCards.label()))
                .otherwise(lit(CreditCardUse::HasCreditCards.label()))
                .alias(CC_USER),
            when(col(LOAN_DATE).is_null())
                .then(lit(LoanUse::NoLoans.label()))
                .otherwise(lit(LoanUse::HasLoans.label()))
                .alias(LOAN_USER),
        ])
        .collect()?;

    Ok(labels_df)
}

/// Inner join of labels and average balances on account id, keeping the
/// order of the accounts table
pub fn join_balances(labels: DataFrame, avg_balances: DataFrame) -> crate::Result<DataFrame> {
    let n_accounts = labels.height();

    let joined = labels
        .lazy()
        .join(
            avg_balances.lazy(),
            [col(ACCOUNT_ID)],
            [col(ACCOUNT_ID)],
            JoinArgs::new(JoinType::Inner),
        )
        .sort([ROW_NR], SortMultipleOptions::default())
        .select([col(ACCOUNT_ID), col(CC_USER), col(LOAN_USER), col(AVG_BALANCE)])
        .collect()?;

    let dropped = n_accounts.saturating_sub(joined.height());
    if dropped > 0 {
        warn!("{} accounts have no transactions and were dropped by the join", dropped);
    }
    info!("joined table has {} accounts", joined.height());

    Ok(joined)
}

/// Convert the joined frame into typed records
fn decode_records(df: &DataFrame) -> crate::Result<Vec<AccountBalance>> {
    let ids = df.column(ACCOUNT_ID)?.str()?;
    let cc_users = df.column(CC_USER)?.str()?;
    let loan_users = df.column(LOAN_USER)?.str()?;
    let balances = df.column(AVG_BALANCE)?.f64()?;

    let mut records = Vec::with_capacity(df.height());
    for (((id, cc), loan), balance) in ids
        .into_iter()
        .zip(cc_users.into_iter())
        .zip(loan_users.into_iter())
        .zip(balances.into_iter())
    {
        records.push(AccountBalance {
            account_id: id.unwrap_or_default().to_string(),
            cc_user: cc.unwrap_or_default().parse()?,
            loan_user: loan.unwrap_or_default().parse()?,
            avg_balance: balance.unwrap_or(f64::NAN),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    fn transactions_df() -> DataFrame {
        df!(
            ACCOUNT_ID => ["A1", "A1", "A2", "A3", "A3", "A3"],
            BALANCE => [100.0, 200.0, 50.0, 1.0, 2.0, 6.0],
        )
        .unwrap()
    }

    #[test]
    fn test_average_balances() {
        let avg = average_balances(transactions_df()).unwrap();
        assert_eq!(avg.height(), 3);

        let sorted = avg
            .lazy()
            .sort([ACCOUNT_ID], SortMultipleOptions::default())
            .collect()
            .unwrap();
        let means: Vec<f64> = sorted
            .column(AVG_BALANCE)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(means, vec![150.0, 50.0, 3.0]);
    }

    #[test]
    fn test_categorize_accounts() {
        let accounts = df!(
            ACCOUNT_ID => ["A1", "A2", "A3"],
            CREDIT_CARDS => [Some("4111"), None, Some("2")],
            LOAN_DATE => [None, Some("2020-01-01"), Some("2019-05-05")],
        )
        .unwrap();

        let labels = categorize_accounts(accounts).unwrap();
        let cc: Vec<&str> = labels.column(CC_USER).unwrap().str().unwrap().into_no_null_iter().collect();
        let loans: Vec<&str> = labels.column(LOAN_USER).unwrap().str().unwrap().into_no_null_iter().collect();

        assert_eq!(cc, vec!["Has Credit Card(s)", "No Credit Cards", "Has Credit Card(s)"]);
        assert_eq!(loans, vec!["No Loans", "Has Loan(s)", "Has Loan(s)"]);
    }

    #[test]
    fn test_join_drops_accounts_without_transactions() {
        let accounts = df!(
            ACCOUNT_ID => ["A1", "A2", "A9"],
            CREDIT_CARDS => [Some("4111"), None, None],
            LOAN_DATE => [None, Some("2020-01-01"), None],
        )
        .unwrap();

        let labels = categorize_accounts(accounts).unwrap();
        let avg = average_balances(transactions_df()).unwrap();
        let joined = join_balances(labels, avg).unwrap();
        let records = decode_records(&joined).unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.account_id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2"]);
    }

    #[test]
    fn test_load_table_missing_column() {
        let file = csv_file(&["account_id,amount", "1,10.0"]);
        let err = load_table(file.path().to_str().unwrap(), "transactions", &TRANSACTION_COLUMNS).unwrap_err();

        assert_eq!(
            err.downcast_ref::<PipelineError>(),
            Some(&PipelineError::MissingColumn {
                table: "transactions",
                column: "balance"
            })
        );
    }

    #[test]
    fn test_load_table_missing_file() {
        let result = load_table("does/not/exist.csv", "accounts", &ACCOUNT_COLUMNS);
        assert!(result.is_err());
    }

    #[test]
    fn test_numeric_account_ids_join() {
        let accounts = csv_file(&[
            "account_id,district_id,credit_cards,loan_date",
            "1,18,,",
            "2,1,1,1994-01-05",
        ]);
        let transactions = csv_file(&[
            "trans_id,account_id,amount,balance",
            "1,1,1000,1000",
            "2,1,3679,4679",
            "3,2,500,500",
        ]);

        let table = load_and_join(
            accounts.path().to_str().unwrap(),
            transactions.path().to_str().unwrap(),
        )
        .unwrap();

        assert_eq!(
            table.records,
            vec![
                AccountBalance {
                    account_id: "1".to_string(),
                    cc_user: CreditCardUse::NoCreditCards,
                    loan_user: LoanUse::NoLoans,
                    avg_balance: 2839.5,
                },
                AccountBalance {
                    account_id: "2".to_string(),
                    cc_user: CreditCardUse::HasCreditCards,
                    loan_user: LoanUse::HasLoans,
                    avg_balance: 500.0,
                },
            ]
        );
    }

    #[test]
    fn test_float_balance_after_many_integer_rows() {
        let mut lines = vec!["account_id,balance".to_string()];
        lines.extend((0..150).map(|_| "1,100".to_string()));
        lines.push("2,1234.5".to_string());
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = csv_file(&lines);

        let transactions = load_table(file.path().to_str().unwrap(), "transactions", &TRANSACTION_COLUMNS).unwrap();
        let avg = average_balances(transactions)
            .unwrap()
            .lazy()
            .sort([ACCOUNT_ID], SortMultipleOptions::default())
            .collect()
            .unwrap();
        let means: Vec<f64> = avg.column(AVG_BALANCE).unwrap().f64().unwrap().into_no_null_iter().collect();

        assert_eq!(means, vec![100.0, 1234.5]);
    }

    #[test]
    fn test_text_card_number_after_many_numeric_rows() {
        let mut lines = vec!["account_id,credit_cards,loan_date".to_string()];
        lines.extend((0..150).map(|i| format!("{},1,", i)));
        lines.push("X,4111...,".to_string());
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = csv_file(&lines);

        let accounts = load_table(file.path().to_str().unwrap(), "accounts", &ACCOUNT_COLUMNS).unwrap();
        let labels = categorize_accounts(accounts).unwrap();

        assert_eq!(labels.height(), 151);
        let cc: Vec<&str> = labels.column(CC_USER).unwrap().str().unwrap().into_no_null_iter().collect();
        assert!(cc.iter().all(|&label| label == "Has Credit Card(s)"));
    }

    #[test]
    fn test_null_and_unparseable_balances_left_out_of_mean() {
        let accounts = csv_file(&["account_id,credit_cards,loan_date", "A1,,", "A2,,", "A3,,"]);
        let transactions = csv_file(&[
            "account_id,balance",
            "A1,10",
            "A1,",
            "A1,30",
            "A2,",
            "A3,n/a",
            "A3,5",
        ]);

        let table = load_and_join(
            accounts.path().to_str().unwrap(),
            transactions.path().to_str().unwrap(),
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.records[0].avg_balance, 20.0);
        assert_eq!(table.records[1].account_id, "A2");
        assert!(table.records[1].avg_balance.is_nan());
        assert_eq!(table.records[2].avg_balance, 5.0);
    }

    #[test]
    fn test_join_keeps_accounts_file_order() {
        let accounts = csv_file(&["account_id,credit_cards,loan_date", "10,,", "2,,", "7,,", "1,,"]);
        let transactions = csv_file(&["account_id,balance", "1,1", "2,2", "7,7", "10,10"]);

        let table = load_and_join(
            accounts.path().to_str().unwrap(),
            transactions.path().to_str().unwrap(),
        )
        .unwrap();

        let ids: Vec<&str> = table.records.iter().map(|r| r.account_id.as_str()).collect();
        assert_eq!(ids, vec!["10", "2", "7", "1"]);
    }
}
