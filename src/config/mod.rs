use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_HOME_PAGE: &str = "home-page";
pub const DB_FILE_NAME: &str = "wiki.db";

/// Longest listing-cache lifetime accepted from the environment
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Application configuration and constants
#[derive(Debug, Clone)]
pub struct Config {
    pub content_root: Arc<PathBuf>,
    pub port: u16,
    pub host: String,
    pub home_page_name: String,
    /// Absolute expiry of the cached page listing
    pub cache_ttl: Duration,
    pub pool_size: u32,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            content_root: Arc::new(PathBuf::from(".")),
            port: 5004,
            host: "0.0.0.0".to_string(),
            home_page_name: DEFAULT_HOME_PAGE.to_string(),
            cache_ttl: Duration::from_secs(30 * 60),
            pool_size: 8,
        }
    }

    /// Create configuration with custom values
    pub fn with_custom(
        content_root: PathBuf,
        port: Option<u16>,
        host: Option<String>,
    ) -> Self {
        Self {
            content_root: Arc::new(content_root),
            port: port.unwrap_or(5004),
            host: host.unwrap_or_else(|| "0.0.0.0".to_string()),
            ..Self::new()
        }
    }

    /// Read overrides from `FOLIO_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(root) = std::env::var("FOLIO_CONTENT_ROOT") {
            config.content_root = Arc::new(PathBuf::from(root));
        }
        if let Ok(host) = std::env::var("FOLIO_HOST") {
            config.host = host;
        }
        match std::env::var("FOLIO_PORT").map(|p| p.parse::<u16>()) {
            Ok(Ok(port)) => config.port = port,
            Ok(Err(e)) => log::warn!("Ignoring invalid FOLIO_PORT: {}", e),
            Err(_) => {}
        }
        if let Ok(home) = std::env::var("FOLIO_HOME_PAGE") {
            let home = home.trim().to_lowercase();
            if !home.is_empty() {
                config.home_page_name = home;
            }
        }
        match std::env::var("FOLIO_CACHE_MINUTES").map(|m| m.parse::<u64>()) {
            Ok(Ok(minutes)) => {
                config.cache_ttl = cache_ttl_from_minutes(minutes);
                if minutes.saturating_mul(60) > MAX_CACHE_TTL.as_secs() {
                    log::warn!("FOLIO_CACHE_MINUTES={} capped at {:?}", minutes, MAX_CACHE_TTL);
                }
            }
            Ok(Err(e)) => log::warn!("Ignoring invalid FOLIO_CACHE_MINUTES: {}", e),
            Err(_) => {}
        }

        config
    }

    /// Location of the embedded database inside the content root
    pub fn db_path(&self) -> PathBuf {
        self.content_root.join(DB_FILE_NAME)
    }

    /// Get the socket address for binding
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        let ip = self
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        std::net::SocketAddr::from((ip, self.port))
    }
}

/// Minutes to a cache lifetime, clamped to `MAX_CACHE_TTL`
pub fn cache_ttl_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60)).min(MAX_CACHE_TTL)
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_lives_under_content_root() {
        let config = Config::with_custom(PathBuf::from("/srv/wiki"), Some(8080), None);
        assert_eq!(config.db_path(), PathBuf::from("/srv/wiki/wiki.db"));
        assert_eq!(config.socket_addr().port(), 8080);
        assert_eq!(config.home_page_name, "home-page");
        assert_eq!(config.cache_ttl, Duration::from_secs(1800));
    }

    #[test]
    fn huge_cache_minutes_are_clamped_instead_of_overflowing() {
        assert_eq!(cache_ttl_from_minutes(30), Duration::from_secs(1800));
        assert_eq!(cache_ttl_from_minutes(0), Duration::ZERO);
        assert_eq!(cache_ttl_from_minutes(u64::MAX), MAX_CACHE_TTL);
        assert_eq!(cache_ttl_from_minutes(u64::MAX / 60 + 1), MAX_CACHE_TTL);
    }

    #[test]
    fn unparsable_host_binds_everywhere() {
        let mut config = Config::new();
        config.host = "not-an-ip".into();
        assert_eq!(config.socket_addr().ip().to_string(), "0.0.0.0");
    }
}
