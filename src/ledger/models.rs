//! Banking domain records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Checking,
    Savings,
}

impl AccountType {
    /// Case-insensitive parse of a user-supplied filter value
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "checking" => Some(AccountType::Checking),
            "savings" => Some(AccountType::Savings),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Checking => write!(f, "Checking"),
            AccountType::Savings => write!(f, "Savings"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
    Payment,
}

impl TransactionType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "deposit" => Some(TransactionType::Deposit),
            "withdrawal" => Some(TransactionType::Withdrawal),
            "transfer" => Some(TransactionType::Transfer),
            "payment" => Some(TransactionType::Payment),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Deposit => "Deposit",
            TransactionType::Withdrawal => "Withdrawal",
            TransactionType::Transfer => "Transfer",
            TransactionType::Payment => "Payment",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    /// Masked number shown to the user
    pub account_number: String,
    pub created_date: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub transaction_type: TransactionType,
    /// Signed: negative for money leaving the account
    pub amount: Decimal,
    pub description: String,
    pub payee_id: Option<String>,
    /// Counterpart account of a transfer
    pub to_account_id: Option<String>,
    pub date: DateTime<Utc>,
    pub balance_after: Decimal,
}

/// A transaction before the ledger assigns its id and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub payee_id: Option<String>,
    pub to_account_id: Option<String>,
    pub balance_after: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payee {
    pub id: String,
    pub name: String,
    pub account_number: String,
    pub routing_number: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_date: DateTime<Utc>,
}
