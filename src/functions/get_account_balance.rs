//! Balance lookup for one account, or a summary across all of them

use super::list_accounts::account_row;
use super::{
    non_empty, parse_arguments, DomainError, Function, FunctionError, DATE_TIME_FORMAT,
};
use crate::ledger::{AccountType, Ledger, Transaction};
use crate::schema::ParamSpec;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

const RECENT_TRANSACTIONS: usize = 5;

pub struct GetAccountBalance {
    ledger: Ledger,
}

impl GetAccountBalance {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    fn single(&self, account_id: &str) -> Result<Value, FunctionError> {
        let account = self
            .ledger
            .get_account(account_id)
            .ok_or(DomainError::AccountNotFound)?;
        let recent: Vec<Value> = self
            .ledger
            .list_transactions(Some(account_id))
            .iter()
            .take(RECENT_TRANSACTIONS)
            .map(recent_row)
            .collect();

        Ok(json!({
            "account": account_row(&account),
            "recent_transactions": recent,
        }))
    }

    fn summary(&self) -> Value {
        let accounts = self.ledger.list_accounts();
        let balance_of = |kind: Option<AccountType>| -> Decimal {
            accounts
                .iter()
                .filter(|a| kind.map_or(true, |k| a.account_type == k))
                .map(|a| a.balance)
                .sum()
        };

        json!({
            "summary": {
                "total_balance": balance_of(None),
                "checking_balance": balance_of(Some(AccountType::Checking)),
                "savings_balance": balance_of(Some(AccountType::Savings)),
                "total_accounts": accounts.len(),
            },
            "accounts": accounts.iter().map(|a| json!({
                "id": a.id,
                "name": a.name,
                "type": a.account_type.to_string(),
                "balance": a.balance,
                "account_number": a.account_number,
            })).collect::<Vec<_>>(),
        })
    }
}

fn recent_row(transaction: &Transaction) -> Value {
    json!({
        "id": transaction.id,
        "type": transaction.transaction_type.to_string(),
        "amount": transaction.amount,
        "description": transaction.description,
        "date": transaction.date.format(DATE_TIME_FORMAT).to_string(),
        "balance_after": transaction.balance_after,
    })
}

#[derive(Debug, Default, Deserialize)]
struct GetAccountBalanceInput {
    #[serde(default)]
    account_id: Option<String>,
}

#[async_trait]
impl Function for GetAccountBalance {
    fn name(&self) -> &str {
        "get_account_balance"
    }

    fn description(&self) -> &str {
        "Get the current balance and recent activity for a specific account or all accounts"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("account_id").describe(
            "Account ID to get balance for (optional - if not provided, returns all account balances)",
        )]
    }

    fn activity(&self) -> &str {
        "getting account balance"
    }

    async fn call(&self, raw_arguments: &str) -> Result<Value, FunctionError> {
        let input: GetAccountBalanceInput = parse_arguments(raw_arguments)?;
        match non_empty(input.account_id.as_ref()) {
            Some(account_id) => self.single(account_id),
            None => Ok(self.summary()),
        }
    }
}
