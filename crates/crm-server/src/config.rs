use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, anyhow, bail};

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub idempotency_ttl: Duration,
    pub sweep_interval: Duration,
    pub production: bool,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("{key} is required"))
        };
        let duration_or = |key: &str, default: &str| -> anyhow::Result<Duration> {
            let raw = get(key).unwrap_or_else(|| default.to_string());
            parse_duration(&raw).with_context(|| format!("invalid {key}: {raw:?}"))
        };

        let host: IpAddr = get("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse()
            .context("invalid HOST")?;
        let port: u16 = get("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("invalid PORT")?;

        let jwt_secret = required("JWT_SECRET")?;
        let refresh_token_secret = required("REFRESH_TOKEN_SECRET")?;
        if jwt_secret == refresh_token_secret {
            bail!("JWT_SECRET and REFRESH_TOKEN_SECRET must differ");
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_addr: SocketAddr::new(host, port),
            jwt_secret,
            refresh_token_secret,
            access_token_ttl: duration_or("JWT_EXPIRES_IN", "1h")?,
            refresh_token_ttl: duration_or("REFRESH_TOKEN_EXPIRES_IN", "7d")?,
            idempotency_ttl: duration_or("IDEMPOTENCY_TTL", "24h")?,
            sweep_interval: duration_or("SWEEP_INTERVAL", "10m")?,
            production: get("APP_ENV")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("production")),
            run_migrations: get("RUN_MIGRATIONS").is_none_or(|v| is_truthy(&v)),
        })
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Parses `90`, `90s`, `15m`, `1h` or `7d`. Zero is rejected.
pub fn parse_duration(raw: &str) -> anyhow::Result<Duration> {
    let s = raw.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits.parse().context("expected a number")?;
    let secs = match unit {
        "" | "s" => n,
        "m" => n * 60,
        "h" => n * 60 * 60,
        "d" => n * 60 * 60 * 24,
        other => bail!("unknown unit {other:?}"),
    };
    if secs == 0 {
        bail!("duration must be positive");
    }
    Ok(Duration::from_secs(secs))
}
