//! Transaction history with account, type, date range and limit filters

use super::{
    non_empty, parse_arguments, Function, FunctionError, DATE_FORMAT, DATE_TIME_FORMAT,
};
use crate::ledger::{Ledger, Transaction, TransactionType};
use crate::schema::ParamSpec;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ListTransactions {
    ledger: Ledger,
}

impl ListTransactions {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListTransactionsInput {
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    transaction_type: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    end_date: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; yields the calendar day
fn parse_day(field: &str, value: &str) -> Result<NaiveDate, FunctionError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|d| d.date_naive()))
        .map_err(|_| {
            FunctionError::InvalidArguments(format!(
                "{field} must be a date in YYYY-MM-DD format, got {value:?}"
            ))
        })
}

#[async_trait]
impl Function for ListTransactions {
    fn name(&self) -> &str {
        "list_transactions"
    }

    fn description(&self) -> &str {
        "List transaction history with optional filtering by account, type, and date range"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("account_id").describe("Filter by specific account ID (optional)"),
            ParamSpec::string("transaction_type")
                .describe("Filter by transaction type")
                .one_of(&["deposit", "withdrawal", "transfer", "payment"]),
            ParamSpec::string("start_date")
                .describe("Start date for filtering (YYYY-MM-DD format)"),
            ParamSpec::string("end_date").describe("End date for filtering (YYYY-MM-DD format)"),
            ParamSpec::integer("limit").describe("Maximum number of transactions to return"),
        ]
    }

    fn activity(&self) -> &str {
        "listing transactions"
    }

    async fn call(&self, raw_arguments: &str) -> Result<Value, FunctionError> {
        let input: ListTransactionsInput = parse_arguments(raw_arguments)?;
        let account_id = non_empty(input.account_id.as_ref());
        let start = non_empty(input.start_date.as_ref())
            .map(|v| parse_day("start_date", v))
            .transpose()?;
        let end = non_empty(input.end_date.as_ref())
            .map(|v| parse_day("end_date", v))
            .transpose()?;
        let kind = non_empty(input.transaction_type.as_ref()).and_then(TransactionType::parse);

        let (rows, total) = self.ledger.atomically(|book| {
            let mut transactions: Vec<Transaction> = book
                .list_transactions(account_id)
                .into_iter()
                .filter(|t| kind.map_or(true, |k| t.transaction_type == k))
                // Compared as calendar days, so the end date covers the whole day
                .filter(|t| start.map_or(true, |d| t.date.date_naive() >= d))
                .filter(|t| end.map_or(true, |d| t.date.date_naive() <= d))
                .collect();
            if let Some(limit) = input.limit.and_then(|l| usize::try_from(l).ok()) {
                if limit > 0 {
                    transactions.truncate(limit);
                }
            }

            let account_name = |id: &str| book.get_account(id).map(|a| a.name.clone());
            let rows: Vec<Value> = transactions
                .iter()
                .map(|t| {
                    json!({
                        "id": t.id,
                        "account_id": t.account_id,
                        "account_name": account_name(&t.account_id)
                            .unwrap_or_else(|| "Unknown".to_string()),
                        "type": t.transaction_type.to_string(),
                        "amount": t.amount,
                        "description": t.description,
                        "payee_name": t.payee_id.as_deref()
                            .and_then(|id| book.get_payee(id))
                            .map(|p| p.name.clone()),
                        "to_account_name": t.to_account_id.as_deref().and_then(account_name),
                        "date": t.date.format(DATE_TIME_FORMAT).to_string(),
                        "balance_after": t.balance_after,
                    })
                })
                .collect();
            (rows, transactions.len())
        });

        Ok(json!({
            "transactions": rows,
            "total_transactions": total,
            "filter_applied": {
                "account_id": input.account_id,
                "transaction_type": input.transaction_type,
                "start_date": start.map(|d| d.format(DATE_FORMAT).to_string()),
                "end_date": end.map(|d| d.format(DATE_FORMAT).to_string()),
                "limit": input.limit,
            },
        }))
    }
}
