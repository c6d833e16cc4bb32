//! Endpoint settings.
//!
//! The only external configuration is the base URL of the portal back-end,
//! read from `EADMS_WS_URL` and defaulting to a local development address.

use eadms_protocol::constants::{
    BASE_URL_ENV, DEFAULT_BASE_URL, RAW_WEBSOCKET_SUFFIX, STOMP_ENDPOINT_PATH,
};

/// Errors from settings validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("endpoint URL is empty")]
    Empty,

    #[error("unsupported URL scheme in {0:?} (expected http, https, ws or wss)")]
    UnsupportedScheme(String),
}

/// Endpoint settings for the real-time connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    base_url: String,
    stomp_url: String,
}

impl Settings {
    /// Validates a base URL such as `https://portal.example.edu`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SettingsError> {
        let raw = base_url.into();
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(SettingsError::Empty);
        }

        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| SettingsError::UnsupportedScheme(raw.clone()))?;
        let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            _ => return Err(SettingsError::UnsupportedScheme(raw.clone())),
        };
        if rest.is_empty() {
            return Err(SettingsError::Empty);
        }

        Ok(Self {
            base_url: trimmed.to_string(),
            stomp_url: format!("{ws_scheme}://{rest}{STOMP_ENDPOINT_PATH}{RAW_WEBSOCKET_SUFFIX}"),
        })
    }

    /// Reads `EADMS_WS_URL`, falling back to the default when unset or blank.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        match lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            Some(url) => Self::new(url),
            None => Ok(Self::default()),
        }
    }

    /// The base URL as configured (without trailing slash).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// WebSocket URL of the broker's STOMP endpoint.
    pub fn stomp_url(&self) -> &str {
        &self.stomp_url
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stomp_url: format!(
                "ws://{}{STOMP_ENDPOINT_PATH}{RAW_WEBSOCKET_SUFFIX}",
                DEFAULT_BASE_URL.trim_start_matches("http://")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_backend() {
        let s = Settings::default();
        assert_eq!(s.base_url(), "http://localhost:8080");
        assert_eq!(s.stomp_url(), "ws://localhost:8080/ws/websocket");
        assert_eq!(s, Settings::new(DEFAULT_BASE_URL).unwrap());
    }

    #[test]
    fn https_maps_to_wss() {
        let s = Settings::new("https://portal.example.edu/").unwrap();
        assert_eq!(s.base_url(), "https://portal.example.edu");
        assert_eq!(s.stomp_url(), "wss://portal.example.edu/ws/websocket");
    }

    #[test]
    fn ws_schemes_are_accepted() {
        let s = Settings::new("ws://10.0.0.5:9000/api").unwrap();
        assert_eq!(s.stomp_url(), "ws://10.0.0.5:9000/api/ws/websocket");
        let s = Settings::new("WSS://host").unwrap();
        assert_eq!(s.stomp_url(), "wss://host/ws/websocket");
    }

    #[test]
    fn rejects_bad_urls() {
        assert_eq!(Settings::new("  "), Err(SettingsError::Empty));
        assert_eq!(Settings::new("http://"), Err(SettingsError::Empty));
        assert!(matches!(
            Settings::new("ftp://host"),
            Err(SettingsError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Settings::new("localhost:8080"),
            Err(SettingsError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn lookup_uses_env_value() {
        let s = Settings::from_lookup(|key| {
            assert_eq!(key, "EADMS_WS_URL");
            Some("https://school.test".into())
        })
        .unwrap();
        assert_eq!(s.stomp_url(), "wss://school.test/ws/websocket");
    }

    #[test]
    fn lookup_falls_back_to_default() {
        assert_eq!(Settings::from_lookup(|_| None).unwrap(), Settings::default());
        assert_eq!(
            Settings::from_lookup(|_| Some("   ".into())).unwrap(),
            Settings::default()
        );
    }
}
