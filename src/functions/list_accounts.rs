//! List the customer's accounts with an optional type filter

use super::{non_empty, parse_arguments, Function, FunctionError, DATE_FORMAT};
use crate::ledger::{Account, AccountType, Ledger};
use crate::schema::ParamSpec;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ListAccounts {
    ledger: Ledger,
}

impl ListAccounts {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListAccountsInput {
    #[serde(default)]
    account_type: Option<String>,
}

/// Row shape shared with `get_account_balance`
pub(super) fn account_row(account: &Account) -> Value {
    json!({
        "id": account.id,
        "name": account.name,
        "type": account.account_type.to_string(),
        "balance": account.balance,
        "account_number": account.account_number,
        "created_date": account.created_date.format(DATE_FORMAT).to_string(),
    })
}

#[async_trait]
impl Function for ListAccounts {
    fn name(&self) -> &str {
        "list_accounts"
    }

    fn description(&self) -> &str {
        "List all bank accounts for the customer with their balances and details"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("account_type")
            .describe("Filter by account type (checking, savings). Leave empty for all accounts.")
            .one_of(&["checking", "savings"])]
    }

    fn activity(&self) -> &str {
        "retrieving accounts"
    }

    async fn call(&self, raw_arguments: &str) -> Result<Value, FunctionError> {
        let input: ListAccountsInput = parse_arguments(raw_arguments)?;

        // An unrecognized type means "no filter"
        let filter = non_empty(input.account_type.as_ref()).and_then(AccountType::parse);
        let accounts: Vec<Account> = self
            .ledger
            .list_accounts()
            .into_iter()
            .filter(|a| filter.map_or(true, |t| a.account_type == t))
            .collect();

        let total_balance: Decimal = accounts.iter().map(|a| a.balance).sum();
        Ok(json!({
            "accounts": accounts.iter().map(account_row).collect::<Vec<_>>(),
            "total_accounts": accounts.len(),
            "total_balance": total_balance,
        }))
    }
}
