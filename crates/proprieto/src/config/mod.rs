use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Gross minimum wage (RON/month) the CASS thresholds are expressed in.
pub const DEFAULT_MINIMUM_WAGE: Decimal = dec!(4050);
pub const DEFAULT_FISCAL_YEAR: i32 = 2026;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub fiscal: FiscalConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let fiscal = FiscalConfig::from_env()?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                with_target: environment != AppEnvironment::Production,
            },
            fiscal,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub with_target: bool,
}

/// Tax parameters that change with legislation rather than with code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalConfig {
    pub minimum_wage_reference: Decimal,
    pub default_fiscal_year: i32,
}

impl Default for FiscalConfig {
    fn default() -> Self {
        Self {
            minimum_wage_reference: DEFAULT_MINIMUM_WAGE,
            default_fiscal_year: DEFAULT_FISCAL_YEAR,
        }
    }
}

impl FiscalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let minimum_wage_reference = match env::var("APP_MINIMUM_WAGE") {
            Ok(raw) => raw
                .trim()
                .parse::<Decimal>()
                .ok()
                .filter(|wage| *wage > Decimal::ZERO)
                .ok_or(ConfigError::InvalidMinimumWage { value: raw })?,
            Err(_) => DEFAULT_MINIMUM_WAGE,
        };

        let default_fiscal_year = match env::var("APP_FISCAL_YEAR") {
            Ok(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .filter(|year| (2000..=2100).contains(year))
                .ok_or(ConfigError::InvalidFiscalYear { value: raw })?,
            Err(_) => DEFAULT_FISCAL_YEAR,
        };

        Ok(Self {
            minimum_wage_reference,
            default_fiscal_year,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMinimumWage { value: String },
    InvalidFiscalYear { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMinimumWage { value } => {
                write!(f, "APP_MINIMUM_WAGE must be a positive amount, got '{value}'")
            }
            ConfigError::InvalidFiscalYear { value } => {
                write!(f, "APP_FISCAL_YEAR must be a year between 2000 and 2100, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidMinimumWage { .. }
            | ConfigError::InvalidFiscalYear { .. } => None,
        }
    }
}
