//! Move money between two of the customer's own accounts

use super::{non_empty, parse_arguments, DomainError, Function, FunctionError, DATE_TIME_FORMAT};
use crate::ledger::{Account, Ledger, NewTransaction, Transaction, TransactionType};
use crate::schema::ParamSpec;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct TransferFunds {
    ledger: Ledger,
}

impl TransferFunds {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

#[derive(Debug, Deserialize)]
struct TransferFundsInput {
    from_account_id: String,
    to_account_id: String,
    amount: Decimal,
    #[serde(default)]
    description: Option<String>,
}

fn side(account: &Account, new_balance: Decimal, transaction: &Transaction) -> Value {
    json!({
        "id": account.id,
        "name": account.name,
        "account_number": account.account_number,
        "previous_balance": account.balance,
        "new_balance": new_balance,
        "transaction_id": transaction.id,
    })
}

#[async_trait]
impl Function for TransferFunds {
    fn name(&self) -> &str {
        "transfer_funds"
    }

    fn description(&self) -> &str {
        "Transfer money between your accounts"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("from_account_id")
                .describe("ID of the account to transfer from")
                .required(),
            ParamSpec::string("to_account_id")
                .describe("ID of the account to transfer to")
                .required(),
            ParamSpec::decimal("amount")
                .describe("Transfer amount")
                .required(),
            ParamSpec::string("description").describe("Transfer description (optional)"),
        ]
    }

    fn activity(&self) -> &str {
        "transferring funds"
    }

    async fn call(&self, raw_arguments: &str) -> Result<Value, FunctionError> {
        let input: TransferFundsInput = parse_arguments(raw_arguments)?;

        self.ledger.atomically(|book| -> Result<Value, FunctionError> {
            let from = book
                .get_account(&input.from_account_id)
                .cloned()
                .ok_or(DomainError::SourceAccountNotFound)?;
            let to = book
                .get_account(&input.to_account_id)
                .cloned()
                .ok_or(DomainError::DestinationAccountNotFound)?;
            if from.id == to.id {
                return Err(DomainError::SameAccount.into());
            }
            if input.amount <= Decimal::ZERO {
                return Err(DomainError::NonPositiveAmount {
                    operation: "Transfer",
                }
                .into());
            }
            if from.balance < input.amount {
                return Err(DomainError::InsufficientSourceFunds {
                    available: from.balance,
                }
                .into());
            }

            let new_from_balance = from.balance - input.amount;
            let new_to_balance = to.balance + input.amount;
            let description = non_empty(input.description.as_ref()).map(str::to_string);

            let outgoing = book.add_transaction(NewTransaction {
                account_id: from.id.clone(),
                transaction_type: TransactionType::Transfer,
                amount: -input.amount,
                description: description
                    .clone()
                    .unwrap_or_else(|| format!("Transfer to {}", to.name)),
                payee_id: None,
                to_account_id: Some(to.id.clone()),
                balance_after: new_from_balance,
            });
            let incoming = book.add_transaction(NewTransaction {
                account_id: to.id.clone(),
                transaction_type: TransactionType::Transfer,
                amount: input.amount,
                description: description
                    .unwrap_or_else(|| format!("Transfer from {}", from.name)),
                payee_id: None,
                to_account_id: Some(from.id.clone()),
                balance_after: new_to_balance,
            });
            book.update_balance(&from.id, new_from_balance)?;
            book.update_balance(&to.id, new_to_balance)?;

            Ok(json!({
                "success": true,
                "transfer_details": {
                    "from_account": side(&from, new_from_balance, &outgoing),
                    "to_account": side(&to, new_to_balance, &incoming),
                    "amount": input.amount,
                    "description": outgoing.description,
                    "date": outgoing.date.format(DATE_TIME_FORMAT).to_string(),
                },
            }))
        })
    }
}
