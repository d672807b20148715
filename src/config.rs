use std::env;

/// ConfigError
///
/// Raised by `AppConfig::load` when a value required for the current runtime
/// environment is missing or cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingVariable(&'static str),
    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

/// AppConfig
///
/// Holds the application's entire configuration state. It is loaded once at startup,
/// never mutated afterwards, and pulled into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory directory (local only).
    pub db_url: Option<String>,
    // Upper bound for the sqlx connection pool.
    pub db_max_connections: u32,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // Runtime environment marker. Controls log format and the cookie `Secure` flag.
    pub env: Env,
    // HMAC secret used to sign and validate session tokens.
    pub session_secret: String,
    // Lifetime of a session token, in seconds.
    pub session_ttl_secs: i64,
    // Optional first teacher account created at startup.
    pub bootstrap_teacher: Option<BootstrapTeacher>,
}

/// BootstrapTeacher
///
/// Credentials for the initial teacher account. Only teachers can create accounts, so a
/// fresh deployment needs one seeded from the environment.
#[derive(Clone, Debug)]
pub struct BootstrapTeacher {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Env
///
/// Defines the runtime context, used to switch between developer conveniences
/// (pretty logs, in-memory store) and production-grade infrastructure.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_SESSION_SECRET: &str = "local-development-session-secret";
const DEFAULT_SESSION_TTL_SECS: i64 = 3600;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl Default for AppConfig {
    /// default
    ///
    /// A local, database-less configuration used to scaffold test state without
    /// touching process environment variables.
    fn default() -> Self {
        Self {
            db_url: None,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            env: Env::Local,
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            bootstrap_teacher: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from environment variables (after `dotenv` has run in `main`).
    /// Fails fast: production refuses to start without `DATABASE_URL` and `SESSION_SECRET`,
    /// while local mode falls back to development defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let (db_url, session_secret) = match env {
            Env::Production => (
                Some(
                    env::var("DATABASE_URL")
                        .map_err(|_| ConfigError::MissingVariable("DATABASE_URL"))?,
                ),
                env::var("SESSION_SECRET")
                    .map_err(|_| ConfigError::MissingVariable("SESSION_SECRET"))?,
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
                env::var("SESSION_SECRET").unwrap_or_else(|_| LOCAL_SESSION_SECRET.to_string()),
            ),
        };

        Ok(Self {
            db_url,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            env,
            session_secret,
            session_ttl_secs: parse_var("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            bootstrap_teacher: bootstrap_teacher_from_env(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        Err(_) => Ok(default),
    }
}

fn bootstrap_teacher_from_env() -> Option<BootstrapTeacher> {
    let email = env::var("BOOTSTRAP_TEACHER_EMAIL").ok().filter(|v| !v.is_empty())?;
    let password = env::var("BOOTSTRAP_TEACHER_PASSWORD").ok().filter(|v| !v.is_empty())?;
    let name = env::var("BOOTSTRAP_TEACHER_NAME").unwrap_or_else(|_| "Administrator".to_string());
    Some(BootstrapTeacher {
        name,
        email,
        password,
    })
}
