use chrono_tz::Tz;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_ms: u64,
    #[serde(default = "default_reminder_timezone")]
    pub reminder_timezone: String,
    /// When set, a pass also runs on this interval besides the HTTP trigger.
    pub dispatch_interval_ms: Option<u64>,
    pub sentry_dsn: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_gateway_base_url() -> String {
    "https://api.z-api.io".to_string()
}

fn default_gateway_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_reminder_timezone() -> String {
    "America/Sao_Paulo".to_string()
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        let config = envy::from_env::<Config>()?;

        if config.database_url.is_none() {
            return Err(envy::Error::MissingValue("DATABASE_URL"));
        }
        config.timezone()?;

        Ok(config)
    }

    /// Returns the database URL.
    ///
    /// # Panics
    /// Panics if the database_url is not set. This should only be
    /// called after `load()` which validates it.
    pub fn database_url(&self) -> &str {
        self.database_url
            .as_deref()
            .expect("DATABASE_URL is not set")
    }

    /// The timezone used both to read the current hour and to format
    /// appointment dates in reminder messages.
    pub fn timezone(&self) -> Result<Tz, envy::Error> {
        self.reminder_timezone.parse::<Tz>().map_err(|_| {
            envy::Error::Custom(format!(
                "REMINDER_TIMEZONE '{}' is not a known IANA timezone",
                self.reminder_timezone
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_timezone(tz: &str) -> Config {
        Config {
            database_url: Some("postgres://localhost/test".to_string()),
            bind_address: default_bind_address(),
            port: default_port(),
            db_max_connections: default_db_max_connections(),
            gateway_base_url: default_gateway_base_url(),
            gateway_timeout_ms: default_gateway_timeout(),
            reminder_timezone: tz.to_string(),
            dispatch_interval_ms: None,
            sentry_dsn: None,
        }
    }

    #[test]
    fn parses_default_timezone() {
        let config = config_with_timezone(&default_reminder_timezone());
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::Sao_Paulo);
    }

    #[test]
    fn rejects_unknown_timezone() {
        let config = config_with_timezone("Mars/Olympus_Mons");
        assert!(matches!(config.timezone(), Err(envy::Error::Custom(_))));
    }
}
