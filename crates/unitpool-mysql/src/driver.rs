//! The MySQL [`Driver`].

use mysql_async::{Conn, Opts, OptsBuilder};
use unitpool::{ConnectOptions, Driver, DriverError, ErrorKind, Session};

use crate::error::{CONNECT_FAILED, classify};
use crate::session::MySqlSession;

/// Driver that opens sessions with `mysql_async`.
///
/// Placeholders stay as `?`, which MySQL understands natively.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDriver;

impl MySqlDriver {
    /// Create the driver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Build `mysql_async` options from connection options.
    ///
    /// Every new session runs `SET NAMES <charset>`. The only extra
    /// parameter understood is `stmt_cache_size`; others are ignored.
    pub fn opts(options: &ConnectOptions) -> Result<Opts, DriverError> {
        if options.charset.is_empty()
            || !options
                .charset
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(DriverError::new(
                ErrorKind::Interface,
                format!("invalid character set: {:?}", options.charset),
            ));
        }

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(options.host.as_str())
            .tcp_port(options.port)
            .user(non_empty(&options.user))
            .pass(non_empty(&options.password))
            .db_name(non_empty(&options.database))
            .init(vec![format!("SET NAMES {}", options.charset)]);

        for (key, value) in &options.params {
            match key.as_str() {
                "stmt_cache_size" => {
                    let size = value.parse::<usize>().map_err(|_| {
                        DriverError::new(
                            ErrorKind::Interface,
                            format!("invalid stmt_cache_size: {value}"),
                        )
                    })?;
                    builder = builder.stmt_cache_size(Some(size));
                }
                _ => tracing::debug!(key = %key, "ignoring unknown MySQL connection parameter"),
            }
        }

        Ok(builder.into())
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[async_trait::async_trait]
impl Driver for MySqlDriver {
    fn name(&self) -> &'static str {
        "mysql"
    }

    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Session>, DriverError> {
        let opts = Self::opts(options)?;
        tracing::debug!(
            host = %options.host,
            port = options.port,
            database = %options.database,
            "opening MySQL session"
        );

        let conn = tokio::time::timeout(options.connect_timeout, Conn::new(opts.clone()))
            .await
            .map_err(|_| {
                DriverError::new(
                    ErrorKind::Operational,
                    format!(
                        "connection to {}:{} timed out after {:?}",
                        options.host, options.port, options.connect_timeout
                    ),
                )
                .with_code(CONNECT_FAILED)
            })?
            .map_err(classify)?;

        Ok(Box::new(MySqlSession::new(conn, opts)))
    }
}
