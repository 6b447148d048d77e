//! Callable functions exposed to the model
//!
//! Each function declares its argument shape, parses the model's raw
//! argument JSON itself, and reports failures through [`FunctionError`].
//! [`Function::invoke`] folds both outcomes into result text, so callers
//! always get something to hand back to the model.

mod dispatcher;
mod get_account_balance;
mod list_accounts;
mod list_payees;
mod list_transactions;
mod make_payment;
mod registry;
mod transfer_funds;

pub use dispatcher::Dispatcher;
pub use get_account_balance::GetAccountBalance;
pub use list_accounts::ListAccounts;
pub use list_payees::ListPayees;
pub use list_transactions::ListTransactions;
pub use make_payment::MakePayment;
pub use registry::{
    BuiltinSource, DiscoveryError, DiscoveryOptions, DuplicatePolicy, Factory, FunctionRegistry,
    FunctionSource, Registration,
};
pub use transfer_funds::TransferFunds;

use crate::ledger::{Ledger, LedgerError};
use crate::schema::{FunctionDescriptor, ParamSpec, SchemaError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result from function execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionOutput {
    pub success: bool,
    pub output: String,
}

impl FunctionOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// Business-rule violations; no state is changed when one is returned
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Account not found")]
    AccountNotFound,
    #[error("Source account not found")]
    SourceAccountNotFound,
    #[error("Destination account not found")]
    DestinationAccountNotFound,
    #[error("Payee not found")]
    PayeeNotFound,
    #[error("Cannot transfer to the same account")]
    SameAccount,
    #[error("{operation} amount must be greater than zero")]
    NonPositiveAmount { operation: &'static str },
    #[error("Insufficient funds. Available balance: ${available:.2}")]
    InsufficientFunds { available: Decimal },
    #[error("Insufficient funds in source account. Available balance: ${available:.2}")]
    InsufficientSourceFunds { available: Decimal },
}

#[derive(Debug, Error)]
pub enum FunctionError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Function {0} not found")]
    NotFound(String),
    #[error("Function unavailable: {0}")]
    Unavailable(String),
}

/// Shared collaborators handed to every function at construction
#[derive(Clone)]
pub struct FunctionContext {
    ledger: Ledger,
}

impl FunctionContext {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

/// A function the model can call
#[async_trait]
pub trait Function: Send + Sync {
    /// Stable name the model addresses the function by
    fn name(&self) -> &str;

    /// What the function does, for the model
    fn description(&self) -> &str;

    /// Declared argument shape
    fn parameters(&self) -> Vec<ParamSpec>;

    /// Gerund phrase naming the operation in error text, e.g. "making payment"
    fn activity(&self) -> &str;

    /// Run against raw argument JSON
    async fn call(&self, raw_arguments: &str) -> Result<Value, FunctionError>;

    fn descriptor(&self) -> Result<FunctionDescriptor, SchemaError> {
        FunctionDescriptor::describe(self.name(), self.description(), &self.parameters())
    }

    /// Run and render the outcome as result text. Never fails.
    async fn invoke(&self, raw_arguments: &str) -> FunctionOutput {
        let rendered = self.call(raw_arguments).await.and_then(|value| {
            serde_json::to_string_pretty(&value)
                .map_err(|e| FunctionError::Unavailable(format!("Failed to encode result: {e}")))
        });
        match rendered {
            Ok(text) => FunctionOutput::success(text),
            // Rule violations are answers the model relays verbatim
            Err(FunctionError::Domain(e)) => FunctionOutput::error(e.to_string()),
            Err(e) => FunctionOutput::error(format!("Error {}: {e}", self.activity())),
        }
    }
}

/// Parse raw argument JSON; an empty payload means "no arguments"
pub(crate) fn parse_arguments<T: DeserializeOwned>(raw_arguments: &str) -> Result<T, FunctionError> {
    let trimmed = raw_arguments.trim();
    let payload = if trimmed.is_empty() { "{}" } else { trimmed };
    serde_json::from_str(payload).map_err(|e| FunctionError::InvalidArguments(e.to_string()))
}

/// Optional string arguments arrive as `""` from some models
pub(crate) fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
