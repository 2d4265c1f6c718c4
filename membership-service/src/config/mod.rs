use secrecy::{ExposeSecret, Secret};
use service_core::config::{self as core_config, get_env, parse_env};
use service_core::error::AppError;
use std::env;

/// Minimum signing secret length in bytes.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub session: SessionConfig,
    pub idle: IdleConfig,
    pub gate: GateConfig,
    pub persistence: PersistenceConfig,
    pub revocation: RevocationConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HMAC signing key. There is no fallback value.
    pub secret: Secret<String>,
    pub ttl_seconds: i64,
    /// Minimum token age before an authenticated request re-issues it.
    pub refresh_after_seconds: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct IdleConfig {
    pub timeout_seconds: u64,
    pub warning_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    pub login_page: String,
    pub unauthorized_page: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceBackend {
    Postgres,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    /// Present iff `backend` is `Postgres`.
    pub database_url: Option<Secret<String>>,
    pub max_connections: u32,
}

/// Where revoked sessions are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationBackend {
    Redis,
    /// Process-local; only correct with a single instance.
    Memory,
}

#[derive(Debug, Clone)]
pub struct RevocationConfig {
    pub backend: RevocationBackend,
    /// Present iff `backend` is `Redis`.
    pub redis_url: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    /// Key the limiter on `x-forwarded-for`; only behind a proxy that sets it.
    pub trust_forwarded_for: bool,
}

impl MembershipConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let backend: PersistenceBackend = get_env("PERSISTENCE_BACKEND", Some("postgres"), is_prod)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let database_url = match backend {
            PersistenceBackend::Postgres => {
                Some(Secret::new(get_env("DATABASE_URL", None, is_prod)?))
            }
            PersistenceBackend::Disabled => None,
        };

        let revocation_backend: RevocationBackend =
            get_env("REVOCATION_BACKEND", Some("memory"), is_prod)?
                .parse()
                .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let redis_url = match revocation_backend {
            RevocationBackend::Redis => Some(Secret::new(get_env("REDIS_URL", None, is_prod)?)),
            RevocationBackend::Memory => None,
        };

        let config = MembershipConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("membership-service"), is_prod)?,
            service_version: get_env(
                "SERVICE_VERSION",
                Some(env!("CARGO_PKG_VERSION")),
                is_prod,
            )?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            session: SessionConfig {
                secret: Secret::new(get_env("SESSION_SECRET", None, is_prod)?),
                ttl_seconds: parse_env("SESSION_TTL_SECONDS", Some("600"), is_prod)?,
                refresh_after_seconds: parse_env(
                    "SESSION_REFRESH_AFTER_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                cookie_name: get_env("SESSION_COOKIE_NAME", Some("mapala_session"), is_prod)?,
                cookie_secure: parse_env("SESSION_COOKIE_SECURE", Some("false"), is_prod)?,
            },
            idle: IdleConfig {
                timeout_seconds: parse_env("IDLE_TIMEOUT_SECONDS", Some("600"), is_prod)?,
                warning_seconds: parse_env("IDLE_WARNING_SECONDS", Some("60"), is_prod)?,
            },
            gate: GateConfig {
                login_page: get_env("LOGIN_PAGE", Some("/auth/login"), is_prod)?,
                unauthorized_page: get_env("UNAUTHORIZED_PAGE", Some("/unauthorized"), is_prod)?,
            },
            persistence: PersistenceConfig {
                backend,
                database_url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("5"), is_prod)?,
            },
            revocation: RevocationConfig {
                backend: revocation_backend,
                redis_url,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                login_attempts: parse_env("RATE_LIMIT_LOGIN_ATTEMPTS", Some("5"), is_prod)?,
                login_window_seconds: parse_env(
                    "RATE_LIMIT_LOGIN_WINDOW_SECONDS",
                    Some("900"),
                    is_prod,
                )?,
                trust_forwarded_for: parse_env(
                    "RATE_LIMIT_TRUST_FORWARDED_FOR",
                    Some("false"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(config_error("PORT must be greater than 0"));
        }

        if self.session.secret.expose_secret().len() < MIN_SESSION_SECRET_BYTES {
            return Err(config_error(format!(
                "SESSION_SECRET must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.ttl_seconds <= 0 {
            return Err(config_error("SESSION_TTL_SECONDS must be positive"));
        }

        if !(1..=60).contains(&self.session.refresh_after_seconds)
            || self.session.refresh_after_seconds >= self.session.ttl_seconds
        {
            return Err(config_error(
                "SESSION_REFRESH_AFTER_SECONDS must be between 1 and 60 and below SESSION_TTL_SECONDS",
            ));
        }

        if self.idle.warning_seconds == 0 || self.idle.warning_seconds >= self.idle.timeout_seconds
        {
            return Err(config_error(
                "IDLE_WARNING_SECONDS must be positive and below IDLE_TIMEOUT_SECONDS",
            ));
        }

        for (key, page) in [
            ("LOGIN_PAGE", &self.gate.login_page),
            ("UNAUTHORIZED_PAGE", &self.gate.unauthorized_page),
        ] {
            if !page.starts_with('/') || page.starts_with("//") {
                return Err(config_error(format!("{} must be a local absolute path", key)));
            }
        }

        if self.persistence.backend == PersistenceBackend::Postgres
            && self.persistence.database_url.is_none()
        {
            return Err(config_error(
                "DATABASE_URL is required when PERSISTENCE_BACKEND=postgres",
            ));
        }

        if self.revocation.backend == RevocationBackend::Redis && self.revocation.redis_url.is_none()
        {
            return Err(config_error("REDIS_URL is required when REVOCATION_BACKEND=redis"));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(config_error("Wildcard CORS origin not allowed in production"));
            }

            if !self.session.cookie_secure {
                tracing::warn!("SESSION_COOKIE_SECURE is false in production");
            }

            if self.persistence.backend == PersistenceBackend::Disabled {
                tracing::warn!("Persistence is disabled in production; logins will be refused");
            }

            if self.revocation.backend == RevocationBackend::Memory {
                tracing::warn!("Session revocation is process-local; run a single instance");
            }
        }

        Ok(())
    }
}

fn config_error(msg: impl Into<String>) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(msg.into()))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for PersistenceBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(PersistenceBackend::Postgres),
            "disabled" => Ok(PersistenceBackend::Disabled),
            _ => Err(format!("Invalid persistence backend: {}", s)),
        }
    }
}

impl PersistenceBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersistenceBackend::Postgres => "postgres",
            PersistenceBackend::Disabled => "disabled",
        }
    }
}

impl std::str::FromStr for RevocationBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(RevocationBackend::Redis),
            "memory" => Ok(RevocationBackend::Memory),
            _ => Err(format!("Invalid revocation backend: {}", s)),
        }
    }
}

impl RevocationBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevocationBackend::Redis => "redis",
            RevocationBackend::Memory => "memory",
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
