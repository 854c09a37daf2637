//! Test fixture utilities.
//!
//! The account fixture models a two-account balance transfer. The same SQL
//! constants drive the MySQL integration tests and the mock, so a scenario
//! written against one runs unchanged against the other.

use rust_decimal::Decimal;
use unitpool::{ErrorKind, Value};

use crate::mock::{MockDriver, MockDriverBuilder, MockError, MockResponse, decimal_arg, text_arg};

/// Table used by the transfer scenario.
pub const CREATE_ACCOUNT_TABLE: &str = "CREATE TABLE IF NOT EXISTS account (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(64) NOT NULL UNIQUE,
    balance DECIMAL(12, 2) NOT NULL,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4";

/// Drop the transfer table.
pub const DROP_ACCOUNT_TABLE: &str = "DROP TABLE IF EXISTS account";

/// Insert an account: `(name, balance)`.
pub const INSERT_ACCOUNT: &str = "INSERT INTO account (name, balance) VALUES (?, ?)";

/// Read one balance: `(id)`.
pub const SELECT_BALANCE: &str = "SELECT balance FROM account WHERE id = ?";

/// Take money from an account: `(amount, id)`.
pub const DEBIT: &str = "UPDATE account SET balance = balance - ? WHERE id = ?";

/// Add money to an account: `(amount, id)`.
pub const CREDIT: &str = "UPDATE account SET balance = balance + ? WHERE id = ?";

const NEXT_ID: &str = "account.next_id";

fn balance_key(id: u64) -> String {
    format!("account.{id}.balance")
}

fn name_key(name: &str) -> String {
    format!("account.name.{name}")
}

fn id_arg(params: &[Value], index: usize) -> Result<u64, MockError> {
    params
        .get(index)
        .and_then(Value::as_u64)
        .ok_or_else(|| MockError::BadArgument {
            index,
            reason: "expected an account id".into(),
        })
}

fn adjust(sign: i64) -> MockResponse {
    MockResponse::custom(move |store, params| {
        let amount = decimal_arg(params, 0)?;
        let id = id_arg(params, 1)?;
        let key = balance_key(id);
        if !store.contains(&key) {
            return Ok(MockResponse::affected(0));
        }
        let balance = store.decimal(&key)? + amount * Decimal::from(sign);
        store.set(key, balance);
        Ok(MockResponse::affected(1))
    })
}

/// A mock builder that understands the account statements.
///
/// Accounts are created from `(name, balance)` pairs with ids starting at 1.
/// Inserting a duplicate name fails with MySQL error 1062.
pub fn accounts_mock_builder(accounts: &[(&str, i64)]) -> MockDriverBuilder {
    let mut builder = MockDriver::builder();
    for (index, (name, balance)) in accounts.iter().enumerate() {
        let id = index as u64 + 1;
        builder = builder
            .with_value(balance_key(id), Decimal::from(*balance))
            .with_value(name_key(name), id);
    }
    builder
        .with_value(NEXT_ID, accounts.len() as u64)
        .with_response(
            INSERT_ACCOUNT,
            MockResponse::custom(|store, params| {
                let name = text_arg(params, 0)?;
                let balance = decimal_arg(params, 1)?;
                if store.contains(&name_key(name)) {
                    return Ok(MockResponse::error(
                        ErrorKind::Integrity,
                        1062,
                        format!("Duplicate entry '{name}' for key 'account.name'"),
                    ));
                }
                let id = store.next_id(NEXT_ID);
                store.set(name_key(name), id);
                store.set(balance_key(id), balance);
                Ok(MockResponse::inserted(id))
            }),
        )
        .with_response(
            SELECT_BALANCE,
            MockResponse::custom(|store, params| {
                let id = id_arg(params, 0)?;
                let rows = match store.get(&balance_key(id)) {
                    Some(balance) => vec![vec![balance.clone()]],
                    None => Vec::new(),
                };
                Ok(MockResponse::rows(&["balance"], rows))
            }),
        )
        .with_response(DEBIT, adjust(-1))
        .with_response(CREDIT, adjust(1))
}

/// A mock driver holding the given accounts.
pub fn accounts_mock(accounts: &[(&str, i64)]) -> MockDriver {
    accounts_mock_builder(accounts).build()
}

/// Committed balance of account `id` in the mock store.
pub fn balance(driver: &MockDriver, id: u64) -> Option<Decimal> {
    driver.store().decimal(&balance_key(id)).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use unitpool::{ConnectOptions, Driver};

    #[tokio::test]
    async fn test_accounts_mock_transfer() {
        let driver = accounts_mock(&[("alice", 1000), ("bob", 1000)]);
        let mut session = driver.connect(&ConnectOptions::new()).await.unwrap();

        session.begin().await.unwrap();
        session
            .execute(DEBIT, vec![Value::Int(100), Value::UInt(1)])
            .await
            .unwrap();
        session
            .execute(CREDIT, vec![Value::Int(100), Value::UInt(2)])
            .await
            .unwrap();
        session.commit().await.unwrap();

        assert_eq!(balance(&driver, 1), Some(Decimal::from(900)));
        assert_eq!(balance(&driver, 2), Some(Decimal::from(1100)));
    }

    #[tokio::test]
    async fn test_duplicate_account_is_integrity_error() {
        let driver = accounts_mock(&[("alice", 1000)]);
        let mut session = driver.connect(&ConnectOptions::new()).await.unwrap();

        let result = session
            .execute(INSERT_ACCOUNT, vec!["carol".into(), Value::Int(5)])
            .await
            .unwrap();
        assert_eq!(result.last_insert_id, Some(2));

        let err = session
            .execute(INSERT_ACCOUNT, vec!["alice".into(), Value::Int(5)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert_eq!(err.code(), Some(1062));
    }
}
