use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "https://appointment-manager-node.onrender.com/api/v1";
pub const DEFAULT_STORAGE_PATH: &str = ".medibook/storage.json";
pub const DEFAULT_DOCTORS_PAGE_SIZE: u32 = 6;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub storage_path: PathBuf,
    pub doctors_page_size: u32,
    pub request_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            doctors_page_size: DEFAULT_DOCTORS_PAGE_SIZE,
            request_timeout: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            api_base_url: env::var("MEDIBOOK_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| {
                    warn!("MEDIBOOK_API_URL not set, using default");
                    DEFAULT_API_URL.to_string()
                }),
            storage_path: env::var("MEDIBOOK_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_PATH)),
            doctors_page_size: parse_var("MEDIBOOK_DOCTORS_PAGE_SIZE")
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_DOCTORS_PAGE_SIZE),
            request_timeout: parse_var::<u64>("MEDIBOOK_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing API base URL");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.is_empty()
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("{} has an invalid value ({:?}), using default", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.doctors_page_size, 6);
        assert!(config.request_timeout.is_none());
        assert!(config.is_configured());
    }

    #[test]
    fn test_empty_base_url_is_not_configured() {
        let config = AppConfig {
            api_base_url: String::new(),
            ..AppConfig::default()
        };
        assert!(!config.is_configured());
    }
}
