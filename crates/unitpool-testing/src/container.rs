//! MySQL container support via testcontainers.

use std::borrow::Cow;

use testcontainers::Image;
use testcontainers::core::{ContainerPort, WaitFor};
use unitpool::ConnectOptions;

/// Port MySQL listens on inside the container.
pub const MYSQL_PORT: u16 = 3306;

/// MySQL container image.
///
/// Uses the official `mysql` image with a root password and a
/// pre-created test database.
#[derive(Debug, Clone)]
pub struct MySqlContainer {
    /// Root password.
    pub password: String,
    /// Database created at startup.
    pub database: String,
    /// Container tag (version).
    pub tag: String,
}

impl Default for MySqlContainer {
    fn default() -> Self {
        Self {
            password: "unitpool".to_string(),
            database: "test_unitpool".to_string(),
            tag: "8.4".to_string(),
        }
    }
}

impl MySqlContainer {
    /// Create a new MySQL container configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set the database created at startup.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Set the container tag (MySQL version).
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Connection options for a running container mapped to `host_port`.
    #[must_use]
    pub fn connect_options(&self, host: &str, host_port: u16) -> ConnectOptions {
        ConnectOptions::new()
            .host(host)
            .port(host_port)
            .user("root")
            .password(self.password.as_str())
            .database(self.database.as_str())
    }
}

impl Image for MySqlContainer {
    fn name(&self) -> &str {
        "mysql"
    }

    fn tag(&self) -> &str {
        &self.tag
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::message_on_stderr("port: 3306  MySQL Community Server")]
    }

    fn env_vars(
        &self,
    ) -> impl IntoIterator<Item = (impl Into<Cow<'_, str>>, impl Into<Cow<'_, str>>)> {
        vec![
            ("MYSQL_ROOT_PASSWORD", self.password.as_str()),
            ("MYSQL_DATABASE", self.database.as_str()),
        ]
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &[ContainerPort::Tcp(MYSQL_PORT)]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_container_defaults() {
        let image = MySqlContainer::new().with_tag("8.0");
        assert_eq!(image.name(), "mysql");
        assert_eq!(image.tag(), "8.0");

        let options = image.connect_options("127.0.0.1", 49153);
        assert_eq!(options.port, 49153);
        assert_eq!(options.user, "root");
        assert_eq!(options.database, "test_unitpool");
    }
}
