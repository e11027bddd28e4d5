use ipnetwork::IpNetwork;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SQLITE_PATH: &str = "/tmp/database.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(anyhow::anyhow!("Unknown APP_ENV value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres { url: String },
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    /// Window shared by both limits
    pub window: Duration,
    /// Requests per window per client on every `/api` route
    pub api_max_requests: u32,
    /// Inquiry submissions per window per client
    pub inquiry_max_requests: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database: DatabaseBackend,
    pub postgres: PostgresSettings,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub cors_origins: Vec<String>,
    pub rate_limits: RateLimitSettings,
    pub trusted_proxies: Vec<IpNetwork>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset or unparsable numbers fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // APP_ENV wins over NODE_ENV
        let environment = match lookup("APP_ENV").or_else(|| lookup("NODE_ENV")) {
            Some(value) => value.parse()?,
            None => Environment::Development,
        };

        let database = database_backend(&lookup);

        let port = var("PORT", "5000").parse().unwrap_or(5000);

        let postgres = PostgresSettings {
            max_connections: var("PG_MAX_CONNECTIONS", "10").parse().unwrap_or(10),
            connect_timeout: Duration::from_secs(
                var("PG_CONNECT_TIMEOUT_SECS", "10").parse().unwrap_or(10),
            ),
            idle_timeout: Duration::from_secs(var("PG_IDLE_TIMEOUT_SECS", "20").parse().unwrap_or(20)),
        };

        let cors_origins = split_list(&var(
            "CORS_ORIGINS",
            "http://localhost:3000,http://localhost:5000",
        ))
        .map(str::to_string)
        .collect();

        let window_ms: u64 = var("RATE_LIMIT_WINDOW_MS", "900000")
            .parse()
            .unwrap_or(900_000);

        let rate_limits = RateLimitSettings {
            window: Duration::from_millis(window_ms),
            api_max_requests: var("RATE_LIMIT_MAX_REQUESTS", "100").parse().unwrap_or(100),
            inquiry_max_requests: var("INQUIRY_RATE_LIMIT_MAX", "5").parse().unwrap_or(5),
        };

        let trusted_proxies = split_list(&var("TRUSTED_PROXIES", "127.0.0.0/8,::1/128"))
            .filter_map(|s| IpNetwork::from_str(s).ok())
            .collect();

        Ok(Config {
            environment,
            host: var("HOST", "0.0.0.0"),
            port,
            database,
            postgres,
            log_dir: PathBuf::from(var("LOG_DIR", "logs")),
            log_level: var("LOG_LEVEL", "info"),
            cors_origins,
            rate_limits,
            trusted_proxies,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e| anyhow::anyhow!("Invalid socket address: {}", e))
    }
}

/// PostgreSQL whenever a non-SQLite connection string is available, SQLite otherwise
fn database_backend<F>(lookup: &F) -> DatabaseBackend
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
        Some(url) if url.contains("sqlite") => DatabaseBackend::Sqlite {
            path: PathBuf::from(strip_sqlite_scheme(&url)),
        },
        Some(url) => DatabaseBackend::Postgres { url },
        None => match lookup("DB_HOST") {
            Some(db_host) => {
                let db_port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
                let db_name = lookup("DB_NAME").unwrap_or_else(|| "postgres".to_string());
                let db_user = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
                let db_password = lookup("DB_PASSWORD").unwrap_or_default();

                // URL-encode password to handle special characters
                let encoded_password = urlencoding::encode(&db_password);

                DatabaseBackend::Postgres {
                    url: format!(
                        "postgres://{}:{}@{}:{}/{}",
                        db_user, encoded_password, db_host, db_port, db_name
                    ),
                }
            }
            None => DatabaseBackend::Sqlite {
                path: PathBuf::from(DEFAULT_SQLITE_PATH),
            },
        },
    }
}

fn strip_sqlite_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
