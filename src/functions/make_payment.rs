//! Pay a registered payee from one of the customer's accounts

use super::{non_empty, parse_arguments, DomainError, Function, FunctionError, DATE_TIME_FORMAT};
use crate::ledger::{Ledger, NewTransaction, TransactionType};
use crate::schema::ParamSpec;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct MakePayment {
    ledger: Ledger,
}

impl MakePayment {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

#[derive(Debug, Deserialize)]
struct MakePaymentInput {
    from_account_id: String,
    payee_id: String,
    amount: Decimal,
    #[serde(default)]
    description: Option<String>,
}

#[async_trait]
impl Function for MakePayment {
    fn name(&self) -> &str {
        "make_payment"
    }

    fn description(&self) -> &str {
        "Make a payment from one of your accounts to a registered payee"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("from_account_id")
                .describe("ID of the account to pay from")
                .required(),
            ParamSpec::string("payee_id")
                .describe("ID of the payee to pay")
                .required(),
            ParamSpec::decimal("amount")
                .describe("Payment amount")
                .required(),
            ParamSpec::string("description").describe("Payment description (optional)"),
        ]
    }

    fn activity(&self) -> &str {
        "making payment"
    }

    async fn call(&self, raw_arguments: &str) -> Result<Value, FunctionError> {
        let input: MakePaymentInput = parse_arguments(raw_arguments)?;

        self.ledger.atomically(|book| -> Result<Value, FunctionError> {
            let account = book
                .get_account(&input.from_account_id)
                .cloned()
                .ok_or(DomainError::AccountNotFound)?;
            let payee = book
                .get_payee(&input.payee_id)
                .cloned()
                .ok_or(DomainError::PayeeNotFound)?;
            if input.amount <= Decimal::ZERO {
                return Err(DomainError::NonPositiveAmount {
                    operation: "Payment",
                }
                .into());
            }
            if account.balance < input.amount {
                return Err(DomainError::InsufficientFunds {
                    available: account.balance,
                }
                .into());
            }

            let previous_balance = account.balance;
            let new_balance = previous_balance - input.amount;
            let description = non_empty(input.description.as_ref())
                .map_or_else(|| format!("Payment to {}", payee.name), str::to_string);

            let transaction = book.add_transaction(NewTransaction {
                account_id: account.id.clone(),
                transaction_type: TransactionType::Payment,
                amount: -input.amount,
                description,
                payee_id: Some(payee.id.clone()),
                to_account_id: None,
                balance_after: new_balance,
            });
            book.update_balance(&account.id, new_balance)?;

            Ok(json!({
                "success": true,
                "transaction_id": transaction.id,
                "payment_details": {
                    "from_account": {
                        "id": account.id,
                        "name": account.name,
                        "account_number": account.account_number,
                    },
                    "to_payee": {
                        "id": payee.id,
                        "name": payee.name,
                        "account_number": payee.account_number,
                    },
                    "amount": input.amount,
                    "description": transaction.description,
                    "date": transaction.date.format(DATE_TIME_FORMAT).to_string(),
                    "previous_balance": previous_balance,
                    "new_balance": new_balance,
                },
            }))
        })
    }
}
