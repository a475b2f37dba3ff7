//! Ready-made container services for common databases.

use super::container::ContainerService;
use super::{DATABASE, PASSWORD, USER};
use crate::docker::{ContainerRuntime, ContainerSpec};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Password given to every preset database.
///
/// Fixed rather than random: preset containers are reused across test runs
/// by name, so the password has to be the same every time a handle is built.
pub const PRESET_PASSWORD: &str = "testservices";

/// Database ClickHouse serves without being asked to create one.
const CLICKHOUSE_DEFAULT_DATABASE: &str = "default";

/// Login a preset database is initialized with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub database: String,
}

/// A database image with known credentials and readiness markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Postgres,
    Mysql,
    Mariadb,
    Clickhouse,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Postgres,
        Preset::Mysql,
        Preset::Mariadb,
        Preset::Clickhouse,
    ];

    pub fn default_image(&self) -> &'static str {
        match self {
            Preset::Postgres => "postgres:16",
            Preset::Mysql => "mysql:8.4",
            Preset::Mariadb => "mariadb:11",
            Preset::Clickhouse => "clickhouse/clickhouse-server:latest",
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Preset::Postgres => 5432,
            Preset::Mysql | Preset::Mariadb => 3306,
            Preset::Clickhouse => 9000,
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Preset::Postgres => "postgresql",
            Preset::Mysql => "mysql",
            Preset::Mariadb => "mariadb",
            Preset::Clickhouse => "clickhouse",
        }
    }

    /// Default login for this preset.
    pub fn credentials(&self) -> Credentials {
        let (user, database) = match self {
            Preset::Postgres => ("postgres", "postgresdb"),
            Preset::Mysql | Preset::Mariadb => ("mysqluser", "mysqldb"),
            Preset::Clickhouse => ("clickhouseuser", CLICKHOUSE_DEFAULT_DATABASE),
        };
        Credentials {
            user: user.to_string(),
            password: PRESET_PASSWORD.to_string(),
            database: database.to_string(),
        }
    }

    /// Log lines the image prints, in order, once it really serves clients.
    ///
    /// The port alone is not enough: the engine's proxy accepts connections
    /// before the database inside is up, and most images run a temporary
    /// server during initialization. ClickHouse only does so when it has a
    /// database to create, so its phrase then has to appear twice.
    pub fn ready_phrases(&self, credentials: &Credentials) -> Vec<&'static str> {
        match self {
            Preset::Postgres => vec![
                "PostgreSQL init process complete; ready for start up",
                "database system is ready to accept connections",
            ],
            Preset::Mysql | Preset::Mariadb => {
                vec!["Temporary server started.", "ready for connections."]
            }
            Preset::Clickhouse => {
                let ready = "<Information> Application: Ready for connections.";
                if credentials.database == CLICKHOUSE_DEFAULT_DATABASE {
                    vec![ready]
                } else {
                    vec![ready, ready]
                }
            }
        }
    }

    /// Environment the image reads to initialize `credentials`.
    pub fn container_env(&self, credentials: &Credentials) -> Vec<(&'static str, String)> {
        let Credentials {
            user,
            password,
            database,
        } = credentials.clone();
        match self {
            Preset::Postgres => vec![
                ("POSTGRES_USER", user),
                ("POSTGRES_PASSWORD", password),
                ("POSTGRES_DB", database),
            ],
            Preset::Mysql => vec![
                ("MYSQL_ROOT_PASSWORD", password.clone()),
                ("MYSQL_USER", user),
                ("MYSQL_PASSWORD", password),
                ("MYSQL_DATABASE", database),
            ],
            Preset::Mariadb => vec![
                ("MARIADB_ROOT_PASSWORD", password.clone()),
                ("MARIADB_USER", user),
                ("MARIADB_PASSWORD", password),
                ("MARIADB_DATABASE", database),
            ],
            Preset::Clickhouse => {
                let mut env = vec![
                    ("CLICKHOUSE_USER", user),
                    ("CLICKHOUSE_PASSWORD", password),
                    ("CLICKHOUSE_DEFAULT_ACCESS_MANAGEMENT", "1".to_string()),
                ];
                if database != CLICKHOUSE_DEFAULT_DATABASE {
                    env.push(("CLICKHOUSE_DB", database));
                }
                env
            }
        }
    }

    /// Launch spec for this preset. `image` overrides the default tag.
    pub fn spec(
        &self,
        name: impl Into<String>,
        image: Option<&str>,
        credentials: &Credentials,
    ) -> ContainerSpec {
        self.container_env(credentials).into_iter().fold(
            ContainerSpec::new(name, image.unwrap_or(self.default_image()), self.port()),
            |spec, (key, value)| spec.with_env(key, value),
        )
    }

    /// Apply credentials, scheme and readiness phrases to a container service.
    pub fn configure(&self, service: ContainerService, credentials: &Credentials) -> ContainerService {
        let service = service
            .with_scheme(self.scheme())
            .with_param(USER, &credentials.user)
            .with_param(PASSWORD, &credentials.password)
            .with_param(DATABASE, &credentials.database);
        self.ready_phrases(credentials)
            .into_iter()
            .fold(service, |service, phrase| service.with_ready_phrase(phrase))
    }

    /// A container service for this preset with the default image and login.
    pub fn container(
        &self,
        name: impl Into<String>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> ContainerService {
        let credentials = self.credentials();
        let spec = self.spec(name, None, &credentials);
        self.configure(ContainerService::new(spec, runtime), &credentials)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::Postgres => write!(f, "postgres"),
            Preset::Mysql => write!(f, "mysql"),
            Preset::Mariadb => write!(f, "mariadb"),
            Preset::Clickhouse => write!(f, "clickhouse"),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Preset::Postgres),
            "mysql" => Ok(Preset::Mysql),
            "mariadb" => Ok(Preset::Mariadb),
            "clickhouse" | "ch" => Ok(Preset::Clickhouse),
            other => Err(format!(
                "Unknown preset '{}' (expected one of: postgres, mysql, mariadb, clickhouse)",
                other
            )),
        }
    }
}
