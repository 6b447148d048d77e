//! In-memory banking ledger
//!
//! The domain data collaborator behind the banking functions. All
//! collections live in one [`Book`] guarded by a single mutex; callers that
//! need read-then-write sequences ("check balance, then deduct") run them
//! inside [`Ledger::atomically`] so no concurrent caller can interleave.

mod models;
mod seed;

pub use models::{Account, AccountType, NewTransaction, Payee, Transaction, TransactionType};

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    UnknownAccount(String),
}

/// Account, transaction and payee collections
#[derive(Debug, Clone, Default)]
pub struct Book {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    payees: Vec<Payee>,
}

impl Book {
    /// Active accounts in creation order
    pub fn list_accounts(&self) -> Vec<Account> {
        self.accounts.iter().filter(|a| a.is_active).cloned().collect()
    }

    pub fn get_account(&self, account_id: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.id == account_id && a.is_active)
    }

    pub fn list_payees(&self) -> Vec<Payee> {
        self.payees.iter().filter(|p| p.is_active).cloned().collect()
    }

    pub fn get_payee(&self, payee_id: &str) -> Option<&Payee> {
        self.payees.iter().find(|p| p.id == payee_id && p.is_active)
    }

    /// Transactions newest first, optionally for one account
    pub fn list_transactions(&self, account_id: Option<&str>) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| account_id.map_or(true, |id| t.account_id == id))
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date));
        transactions
    }

    /// Record a transaction, assigning its id and timestamp
    pub fn add_transaction(&mut self, new: NewTransaction) -> Transaction {
        let transaction = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: new.account_id,
            transaction_type: new.transaction_type,
            amount: new.amount,
            description: new.description,
            payee_id: new.payee_id,
            to_account_id: new.to_account_id,
            date: Utc::now(),
            balance_after: new.balance_after,
        };
        self.transactions.push(transaction.clone());
        transaction
    }

    pub fn update_balance(
        &mut self,
        account_id: &str,
        new_balance: Decimal,
    ) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| LedgerError::UnknownAccount(account_id.to_string()))?;
        account.balance = new_balance;
        Ok(())
    }
}

/// Shared handle to the process's ledger
///
/// Cloning is cheap; all clones see the same book.
#[derive(Clone)]
pub struct Ledger {
    book: Arc<Mutex<Book>>,
}

impl Ledger {
    /// Ledger holding the demo accounts, payees and history
    pub fn seeded() -> Self {
        Self::from_book(seed::demo_book())
    }

    pub fn from_book(book: Book) -> Self {
        Self {
            book: Arc::new(Mutex::new(book)),
        }
    }

    /// Restore the demo data (test isolation)
    pub fn reset(&self) {
        *self.lock() = seed::demo_book();
    }

    /// Run a read-then-write sequence under the ledger lock
    pub fn atomically<R>(&self, f: impl FnOnce(&mut Book) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn list_accounts(&self) -> Vec<Account> {
        self.lock().list_accounts()
    }

    pub fn get_account(&self, account_id: &str) -> Option<Account> {
        self.lock().get_account(account_id).cloned()
    }

    pub fn list_payees(&self) -> Vec<Payee> {
        self.lock().list_payees()
    }

    pub fn get_payee(&self, payee_id: &str) -> Option<Payee> {
        self.lock().get_payee(payee_id).cloned()
    }

    pub fn list_transactions(&self, account_id: Option<&str>) -> Vec<Transaction> {
        self.lock().list_transactions(account_id)
    }

    pub fn add_transaction(&self, new: NewTransaction) -> Transaction {
        self.lock().add_transaction(new)
    }

    pub fn update_balance(&self, account_id: &str, new_balance: Decimal) -> Result<(), LedgerError> {
        self.lock().update_balance(account_id, new_balance)
    }

    fn lock(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::seeded()
    }
}
