//! Demo data the ledger starts with

use super::models::{Account, AccountType, Payee, Transaction, TransactionType};
use super::Book;
use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;

fn months_ago(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months)).unwrap_or(now)
}

fn account(
    id: &str,
    name: &str,
    account_type: AccountType,
    balance: Decimal,
    account_number: &str,
    created_date: DateTime<Utc>,
) -> Account {
    Account {
        id: id.to_string(),
        name: name.to_string(),
        account_type,
        balance,
        account_number: account_number.to_string(),
        created_date,
        is_active: true,
    }
}

fn payee(
    id: &str,
    name: &str,
    account_number: &str,
    routing_number: &str,
    email: &str,
    phone: &str,
    created_date: DateTime<Utc>,
) -> Payee {
    Payee {
        id: id.to_string(),
        name: name.to_string(),
        account_number: account_number.to_string(),
        routing_number: routing_number.to_string(),
        email: Some(email.to_string()),
        phone: Some(phone.to_string()),
        is_active: true,
        created_date,
    }
}

fn historical(
    account_id: &str,
    transaction_type: TransactionType,
    amount: Decimal,
    description: &str,
    balance_after: Decimal,
    date: DateTime<Utc>,
    payee_id: Option<&str>,
) -> Transaction {
    Transaction {
        id: uuid::Uuid::new_v4().to_string(),
        account_id: account_id.to_string(),
        transaction_type,
        amount,
        description: description.to_string(),
        payee_id: payee_id.map(str::to_string),
        to_account_id: None,
        date,
        balance_after,
    }
}

/// Three accounts, four payees and a short transaction history
pub fn demo_book() -> Book {
    let now = Utc::now();
    let days_ago = |days: i64| now - Duration::days(days);

    let accounts = vec![
        account(
            "acc-001",
            "Primary Checking",
            AccountType::Checking,
            Decimal::new(250_075, 2),
            "****1234",
            months_ago(now, 24),
        ),
        account(
            "acc-002",
            "Emergency Savings",
            AccountType::Savings,
            Decimal::new(1_500_000, 2),
            "****5678",
            months_ago(now, 24),
        ),
        account(
            "acc-003",
            "Vacation Fund",
            AccountType::Savings,
            Decimal::new(325_050, 2),
            "****9012",
            months_ago(now, 8),
        ),
    ];

    let payees = vec![
        payee(
            "payee-001",
            "Electric Company",
            "123456789",
            "987654321",
            "billing@electricco.com",
            "(555) 123-4567",
            months_ago(now, 18),
        ),
        payee(
            "payee-002",
            "Internet Service Provider",
            "987654321",
            "123456789",
            "bills@isp.com",
            "(555) 987-6543",
            months_ago(now, 20),
        ),
        payee(
            "payee-003",
            "Rent Management Company",
            "456789123",
            "789123456",
            "payments@rentco.com",
            "(555) 456-7890",
            months_ago(now, 24),
        ),
        payee(
            "payee-004",
            "John Doe",
            "111222333",
            "444555666",
            "john.doe@email.com",
            "(555) 111-2222",
            months_ago(now, 6),
        ),
    ];

    let transactions = vec![
        historical(
            "acc-001",
            TransactionType::Deposit,
            Decimal::new(150_000, 2),
            "Salary Deposit",
            Decimal::new(450_000, 2),
            days_ago(30),
            None,
        ),
        historical(
            "acc-001",
            TransactionType::Payment,
            Decimal::new(-85_000, 2),
            "Rent Payment",
            Decimal::new(365_000, 2),
            days_ago(28),
            Some("payee-003"),
        ),
        historical(
            "acc-001",
            TransactionType::Payment,
            Decimal::new(-12_550, 2),
            "Electric Bill",
            Decimal::new(352_450, 2),
            days_ago(25),
            Some("payee-001"),
        ),
        historical(
            "acc-001",
            TransactionType::Payment,
            Decimal::new(-7_525, 2),
            "Internet Bill",
            Decimal::new(250_075, 2),
            days_ago(22),
            Some("payee-002"),
        ),
        historical(
            "acc-002",
            TransactionType::Deposit,
            Decimal::new(50_000, 2),
            "Monthly Savings",
            Decimal::new(1_500_000, 2),
            days_ago(30),
            None,
        ),
        historical(
            "acc-003",
            TransactionType::Deposit,
            Decimal::new(25_050, 2),
            "Vacation Savings",
            Decimal::new(325_050, 2),
            days_ago(15),
            None,
        ),
    ];

    Book {
        accounts,
        transactions,
        payees,
    }
}
