//! In-memory mock driver for unit and integration tests.
//!
//! [`MockDriver`] implements the `unitpool` driver traits without a
//! network. Statements are answered from pre-configured responses keyed by
//! the exact SQL text the session receives (after placeholder
//! substitution). Custom responses can read and write a shared
//! [`MockStore`], which supports snapshot transactions: `begin` clones the
//! store, `commit` writes the clone back and `rollback` discards it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use unitpool::{Pool, PoolConfig, Value};
//! use unitpool_testing::mock::{MockDriver, MockResponse};
//!
//! let driver = MockDriver::builder()
//!     .with_response(
//!         "SELECT id, name FROM users",
//!         MockResponse::rows(&["id", "name"], vec![vec![Value::Int(1), "alice".into()]]),
//!     )
//!     .build();
//!
//! let pool = Pool::new(driver.handle(), PoolConfig::new()).await?;
//! assert_eq!(driver.stats().connects, 5);
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use thiserror::Error;
use unitpool::{
    ConnectOptions, Cursor, Driver, DriverError, ErrorKind, ExecuteResult, Row, Session, Value,
};

/// Errors raised by mock handlers and fixtures.
#[derive(Debug, Error)]
pub enum MockError {
    /// The store has no entry under the key.
    #[error("mock store has no key {0}")]
    MissingKey(String),

    /// The stored value has the wrong type.
    #[error("mock store key {key} holds {found}, expected {expected}")]
    TypeMismatch {
        /// Key that was read.
        key: String,
        /// Expected type name.
        expected: &'static str,
        /// Type name of the stored value.
        found: &'static str,
    },

    /// A statement argument is missing or has the wrong type.
    #[error("bad argument {index}: {reason}")]
    BadArgument {
        /// Zero-based argument position.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },
}

impl From<MockError> for DriverError {
    fn from(err: MockError) -> Self {
        DriverError::new(ErrorKind::Programming, err.to_string())
    }
}

/// Shared key-value state that custom responses operate on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockStore {
    values: BTreeMap<String, Value>,
}

impl MockStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Remove the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Check if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Read a decimal (integers are widened).
    pub fn decimal(&self, key: &str) -> Result<Decimal, MockError> {
        let value = self
            .get(key)
            .ok_or_else(|| MockError::MissingKey(key.to_string()))?;
        value.as_decimal().ok_or_else(|| MockError::TypeMismatch {
            key: key.to_string(),
            expected: "DECIMAL",
            found: value.type_name(),
        })
    }

    /// Read an unsigned integer.
    pub fn u64(&self, key: &str) -> Result<u64, MockError> {
        let value = self
            .get(key)
            .ok_or_else(|| MockError::MissingKey(key.to_string()))?;
        value.as_u64().ok_or_else(|| MockError::TypeMismatch {
            key: key.to_string(),
            expected: "BIGINT UNSIGNED",
            found: value.type_name(),
        })
    }

    /// Increment the counter under `key` and return the new value.
    pub fn next_id(&mut self, key: &str) -> u64 {
        let next = self.get(key).and_then(Value::as_u64).unwrap_or(0) + 1;
        self.set(key, next);
        next
    }
}

/// Read argument `index` as a decimal.
pub fn decimal_arg(params: &[Value], index: usize) -> Result<Decimal, MockError> {
    params
        .get(index)
        .and_then(Value::as_decimal)
        .ok_or_else(|| MockError::BadArgument {
            index,
            reason: "expected a number".into(),
        })
}

/// Read argument `index` as text.
pub fn text_arg(params: &[Value], index: usize) -> Result<&str, MockError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| MockError::BadArgument {
            index,
            reason: "expected text".into(),
        })
}

type Handler = dyn Fn(&mut MockStore, &[Value]) -> Result<MockResponse, DriverError> + Send + Sync;

/// Mock response configuration.
#[derive(Clone)]
pub enum MockResponse {
    /// Return rows.
    Rows {
        /// Column names.
        columns: Arc<[String]>,
        /// Row data.
        rows: Vec<Vec<Value>>,
    },

    /// Report a statement that changed rows.
    Affected {
        /// Rows changed.
        rows: u64,
        /// Generated row id.
        last_insert_id: Option<u64>,
    },

    /// Fail with a driver error.
    Error(DriverError),

    /// Execute a custom handler against the store.
    Custom(Arc<Handler>),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows { columns, rows } => f
                .debug_struct("Rows")
                .field("columns", columns)
                .field("rows", &rows.len())
                .finish(),
            Self::Affected {
                rows,
                last_insert_id,
            } => f
                .debug_struct("Affected")
                .field("rows", rows)
                .field("last_insert_id", last_insert_id)
                .finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// Create a multi-row response.
    pub fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self::Rows {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }

    /// Create a response with no rows.
    pub fn empty(columns: &[&str]) -> Self {
        Self::rows(columns, Vec::new())
    }

    /// Create a rows-affected response.
    pub fn affected(count: u64) -> Self {
        Self::Affected {
            rows: count,
            last_insert_id: None,
        }
    }

    /// Create a single-row insert response with a generated id.
    pub fn inserted(id: u64) -> Self {
        Self::Affected {
            rows: 1,
            last_insert_id: Some(id),
        }
    }

    /// Create an error response.
    pub fn error(kind: ErrorKind, code: u16, message: impl Into<String>) -> Self {
        Self::Error(DriverError::new(kind, message).with_code(code))
    }

    /// Create a custom response computed from the store and the arguments.
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&mut MockStore, &[Value]) -> Result<MockResponse, DriverError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(handler))
    }
}

/// Counters of everything the mock driver was asked to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Sessions opened.
    pub connects: u64,
    /// Sessions closed with `close`.
    pub closes: u64,
    /// Pings received.
    pub pings: u64,
    /// Statements run through `execute`.
    pub executes: u64,
    /// Cursors opened.
    pub cursors_opened: u64,
    /// Cursors dropped.
    pub cursors_closed: u64,
    /// `fetch` calls.
    pub fetches: u64,
    /// Transactions begun.
    pub begins: u64,
    /// Commits.
    pub commits: u64,
    /// Rollbacks.
    pub rollbacks: u64,
    /// `discard_results` calls.
    pub discards: u64,
}

#[derive(Default)]
struct Counters {
    connects: AtomicU64,
    closes: AtomicU64,
    pings: AtomicU64,
    executes: AtomicU64,
    cursors_opened: AtomicU64,
    cursors_closed: AtomicU64,
    fetches: AtomicU64,
    begins: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    discards: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

struct Shared {
    responses: HashMap<String, MockResponse>,
    default_response: Option<MockResponse>,
    numbered: bool,
    store: Mutex<MockStore>,
    statements: Mutex<Vec<String>>,
    counters: Counters,
    connect_failures: AtomicU32,
    ping_failures: AtomicU32,
    ping_delay: Duration,
}

impl Shared {
    fn response_for(&self, sql: &str) -> Result<MockResponse, DriverError> {
        self.statements.lock().push(sql.to_string());
        self.responses
            .get(sql)
            .or(self.default_response.as_ref())
            .cloned()
            .ok_or_else(|| {
                DriverError::new(ErrorKind::Programming, format!("no mock response for: {sql}"))
                    .with_code(1064)
            })
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Builder for [`MockDriver`].
pub struct MockDriverBuilder {
    responses: HashMap<String, MockResponse>,
    default_response: Option<MockResponse>,
    numbered: bool,
    store: MockStore,
    ping_delay: Duration,
}

impl MockDriverBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: None,
            numbered: false,
            store: MockStore::new(),
            ping_delay: Duration::ZERO,
        }
    }

    /// Add a response for a specific SQL text.
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.responses.insert(sql.into(), response);
        self
    }

    /// Set the response for unmatched statements. Without one, unmatched
    /// statements fail with a programming error.
    #[must_use]
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = Some(response);
        self
    }

    /// Use `$1`, `$2`, ... as the native placeholder instead of `?`.
    #[must_use]
    pub fn numbered_placeholders(mut self) -> Self {
        self.numbered = true;
        self
    }

    /// Make every ping take `delay` before answering.
    #[must_use]
    pub fn ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = delay;
        self
    }

    /// Seed the store.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.store.set(key, value);
        self
    }

    /// Build the driver.
    pub fn build(self) -> MockDriver {
        MockDriver {
            shared: Arc::new(Shared {
                responses: self.responses,
                default_response: self.default_response,
                numbered: self.numbered,
                store: Mutex::new(self.store),
                statements: Mutex::new(Vec::new()),
                counters: Counters::default(),
                connect_failures: AtomicU32::new(0),
                ping_failures: AtomicU32::new(0),
                ping_delay: self.ping_delay,
            }),
        }
    }
}

impl Default for MockDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A mock database driver.
///
/// Clones share responses, store and counters, so a test can keep one
/// handle for inspection while a pool owns another.
#[derive(Clone)]
pub struct MockDriver {
    shared: Arc<Shared>,
}

impl MockDriver {
    /// Create a new builder for the mock driver.
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// A driver handle suitable for [`unitpool::Pool::new`].
    pub fn handle(&self) -> Arc<dyn Driver> {
        Arc::new(self.clone())
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> MockStats {
        let c = &self.shared.counters;
        MockStats {
            connects: load(&c.connects),
            closes: load(&c.closes),
            pings: load(&c.pings),
            executes: load(&c.executes),
            cursors_opened: load(&c.cursors_opened),
            cursors_closed: load(&c.cursors_closed),
            fetches: load(&c.fetches),
            begins: load(&c.begins),
            commits: load(&c.commits),
            rollbacks: load(&c.rollbacks),
            discards: load(&c.discards),
        }
    }

    /// Copy of the committed store.
    pub fn store(&self) -> MockStore {
        self.shared.store.lock().clone()
    }

    /// SQL text of every statement received, in order.
    pub fn statements(&self) -> Vec<String> {
        self.shared.statements.lock().clone()
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.shared.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` pings fail, even with reconnect.
    pub fn fail_next_pings(&self, count: u32) {
        self.shared.ping_failures.store(count, Ordering::SeqCst);
    }
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("responses", &self.shared.responses.len())
            .field("numbered", &self.shared.numbered)
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait::async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn placeholder(&self, index: usize) -> Cow<'static, str> {
        if self.shared.numbered {
            Cow::Owned(format!("${index}"))
        } else {
            Cow::Borrowed("?")
        }
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Session>, DriverError> {
        if Shared::take_failure(&self.shared.connect_failures) {
            return Err(DriverError::new(
                ErrorKind::Operational,
                format!("Can't connect to MySQL server on '{}'", options.host),
            )
            .with_code(2003));
        }
        bump(&self.shared.counters.connects);
        Ok(Box::new(MockSession {
            shared: Arc::clone(&self.shared),
            transaction: None,
        }))
    }
}

struct MockSession {
    shared: Arc<Shared>,
    transaction: Option<MockStore>,
}

impl MockSession {
    fn run(&mut self, sql: &str, params: &[Value]) -> Result<MockResponse, DriverError> {
        let mut response = self.shared.response_for(sql)?;
        loop {
            response = match response {
                MockResponse::Custom(handler) => match self.transaction.as_mut() {
                    Some(snapshot) => handler(snapshot, params)?,
                    None => handler(&mut *self.shared.store.lock(), params)?,
                },
                MockResponse::Error(e) => return Err(e),
                other => return Ok(other),
            };
        }
    }
}

#[async_trait::async_trait]
impl Session for MockSession {
    async fn ping(&mut self, _reconnect: bool) -> Result<(), DriverError> {
        bump(&self.shared.counters.pings);
        if !self.shared.ping_delay.is_zero() {
            tokio::time::sleep(self.shared.ping_delay).await;
        }
        if Shared::take_failure(&self.shared.ping_failures) {
            return Err(DriverError::new(ErrorKind::Operational, "MySQL server has gone away")
                .with_code(2006));
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<ExecuteResult, DriverError> {
        bump(&self.shared.counters.executes);
        match self.run(sql, &params)? {
            MockResponse::Affected {
                rows,
                last_insert_id,
            } => Ok(ExecuteResult {
                rows_affected: rows,
                last_insert_id,
            }),
            MockResponse::Rows { rows, .. } => Ok(ExecuteResult::affected(rows.len() as u64)),
            MockResponse::Error(e) => Err(e),
            MockResponse::Custom(_) => Err(DriverError::new(
                ErrorKind::Interface,
                "custom response did not resolve",
            )),
        }
    }

    async fn cursor<'s>(
        &'s mut self,
        sql: &str,
        params: Vec<Value>,
    ) -> Result<Box<dyn Cursor + 's>, DriverError> {
        let (columns, rows) = match self.run(sql, &params)? {
            MockResponse::Rows { columns, rows } => (columns, rows),
            _ => (Arc::from(Vec::new()), Vec::new()),
        };
        bump(&self.shared.counters.cursors_opened);
        Ok(Box::new(MockCursor {
            rows: rows
                .into_iter()
                .map(|values| Row::new(Arc::clone(&columns), values))
                .collect(),
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        bump(&self.shared.counters.begins);
        self.transaction = Some(self.shared.store.lock().clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        bump(&self.shared.counters.commits);
        if let Some(snapshot) = self.transaction.take() {
            *self.shared.store.lock() = snapshot;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        bump(&self.shared.counters.rollbacks);
        self.transaction = None;
        Ok(())
    }

    fn discard_results(&mut self) {
        bump(&self.shared.counters.discards);
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        bump(&self.shared.counters.closes);
        Ok(())
    }
}

struct MockCursor {
    rows: VecDeque<Row>,
    shared: Arc<Shared>,
}

#[async_trait::async_trait]
impl Cursor for MockCursor {
    async fn fetch(&mut self, max: usize) -> Result<Vec<Row>, DriverError> {
        bump(&self.shared.counters.fetches);
        let n = max.min(self.rows.len());
        Ok(self.rows.drain(..n).collect())
    }
}

impl Drop for MockCursor {
    fn drop(&mut self) {
        bump(&self.shared.counters.cursors_closed);
    }
}
