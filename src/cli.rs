//! CLI argument parsing, validation, and startup helpers.

use std::time::Duration;

use clap::Parser;
use url::Url;

use crate::GatewayConfig;
use crate::auth::{AuthSettings, ClientIpHeader, CookieAttributes, RoutePolicy, SameSite};
use crate::backend::BackendConfig;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ticketgate",
    about = "Session gateway for the events platform"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "7300")]
    pub port: u16,

    /// Base URL of the identity backend (e.g., "http://backend:8000")
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: String,

    /// Public origin of this site. An https origin turns on Secure cookies
    #[arg(long, env = "PUBLIC_ORIGIN", default_value = "http://localhost:7300")]
    pub public_origin: String,

    /// SameSite attribute for the token cookies
    #[arg(long, default_value = "lax")]
    pub same_site: SameSite,

    /// Login page; anonymous visitors of protected pages are sent here
    #[arg(long, default_value = "/account/login")]
    pub login_path: String,

    /// Page for signed-in users that lack a required role
    #[arg(long, default_value = "/")]
    pub landing_path: String,

    /// Treat tokens as expired this many seconds before their exp claim
    #[arg(long, default_value = "300")]
    pub expiry_buffer_secs: i64,

    /// Timeout for each identity backend request
    #[arg(long, default_value = "10")]
    pub backend_timeout_secs: u64,

    /// Read the client IP from this header (e.g., "X-Forwarded-For") instead of the socket
    #[arg(long)]
    pub ip_header: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Startup configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    InvalidUrl { name: &'static str, reason: String },
    InsecureOrigin(String),
    InvalidPath { name: &'static str, path: String },
    InvalidValue { name: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidUrl { name, reason } => write!(f, "Invalid {}: {}", name, reason),
            ConfigError::InsecureOrigin(origin) => write!(
                f,
                "Public origin must use HTTPS for non-localhost deployments: {}",
                origin
            ),
            ConfigError::InvalidPath { name, path } => {
                write!(f, "{} must be an absolute path: {}", name, path)
            }
            ConfigError::InvalidValue { name, reason } => write!(f, "Invalid {}: {}", name, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

fn parse_http_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: format!("{} ({})", e, value),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn validate_path(name: &'static str, path: &str) -> Result<String, ConfigError> {
    if !path.starts_with('/') || path.starts_with("//") || path.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidPath {
            name,
            path: path.to_string(),
        });
    }
    Ok(path.to_string())
}

/// Validate arguments and build the gateway configuration.
pub fn build_config(args: &Args) -> Result<GatewayConfig, ConfigError> {
    let backend_url = parse_http_url("backend URL", &args.backend_url)?;

    let origin = parse_http_url("public origin", &args.public_origin)?;
    let secure = origin.scheme() == "https";
    if !secure && origin.host_str() != Some("localhost") {
        return Err(ConfigError::InsecureOrigin(args.public_origin.clone()));
    }

    if args.expiry_buffer_secs < 0 {
        return Err(ConfigError::InvalidValue {
            name: "expiry buffer",
            reason: "must not be negative".into(),
        });
    }
    if args.backend_timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            name: "backend timeout",
            reason: "must be at least one second".into(),
        });
    }

    let ip_header = args
        .ip_header
        .as_deref()
        .map(ClientIpHeader::parse)
        .transpose()
        .map_err(|reason| ConfigError::InvalidValue {
            name: "IP header",
            reason,
        })?;

    let settings = AuthSettings {
        cookies: CookieAttributes {
            secure,
            same_site: args.same_site,
        },
        login_path: validate_path("login path", &args.login_path)?,
        landing_path: validate_path("landing path", &args.landing_path)?,
        expiry_buffer_secs: args.expiry_buffer_secs,
        ..AuthSettings::default()
    };
    let policy = RoutePolicy::platform_for(&settings);

    Ok(GatewayConfig {
        backend: BackendConfig::new(backend_url)
            .with_timeout(Duration::from_secs(args.backend_timeout_secs)),
        settings,
        policy,
        ip_header,
    })
}
