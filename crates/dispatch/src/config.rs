//! Dispatcher configuration.
//!
//! All options are plain setters; embedding applications either build a
//! [`DispatcherConfig`] in code or read it from `GEOMAJAS_*` environment
//! variables with [`DispatcherConfig::from_env`].

use std::time::Duration;

use thiserror::Error;

use geomajas_core::FeatureInclude;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8080/geomajas/geomajasService";

pub const ENV_SERVICE_URL: &str = "GEOMAJAS_SERVICE_URL";
pub const ENV_SHOW_ERROR: &str = "GEOMAJAS_SHOW_ERROR";
pub const ENV_LOCALE: &str = "GEOMAJAS_LOCALE";
pub const ENV_LAZY_LOADING: &str = "GEOMAJAS_LAZY_LOADING";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "GEOMAJAS_REQUEST_TIMEOUT_MS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a boolean, got '{value}'")]
    InvalidBool { name: &'static str, value: String },

    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },
}

/// Include levels used when lazy loading is on.
const LAZY_DEFAULT: FeatureInclude = FeatureInclude::GEOMETRY
    .union(FeatureInclude::STYLE)
    .union(FeatureInclude::LABEL);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    service_url: String,
    show_error: bool,
    locale: Option<String>,
    request_timeout: Option<Duration>,
    use_lazy_loading: bool,
    lazy_feature_includes_default: FeatureInclude,
    lazy_feature_includes_select: FeatureInclude,
    lazy_feature_includes_all: FeatureInclude,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        let mut config = Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            show_error: true,
            locale: None,
            request_timeout: None,
            use_lazy_loading: false,
            lazy_feature_includes_default: FeatureInclude::ALL,
            lazy_feature_includes_select: FeatureInclude::ALL,
            lazy_feature_includes_all: FeatureInclude::ALL,
        };
        config.set_use_lazy_loading(true);
        config
    }
}

impl DispatcherConfig {
    /// Read configuration from `GEOMAJAS_*` environment variables, falling back
    /// to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_SERVICE_URL) {
            let url = url.trim();
            if url.is_empty() {
                return Err(ConfigError::Empty {
                    name: ENV_SERVICE_URL,
                });
            }
            config.service_url = url.to_string();
        }

        if let Some(value) = lookup(ENV_SHOW_ERROR) {
            config.show_error = parse_bool(ENV_SHOW_ERROR, &value)?;
        }

        if let Some(locale) = lookup(ENV_LOCALE) {
            let locale = locale.trim();
            config.locale = (!locale.is_empty()).then(|| locale.to_string());
        }

        if let Some(value) = lookup(ENV_LAZY_LOADING) {
            config.set_use_lazy_loading(parse_bool(ENV_LAZY_LOADING, &value)?);
        }

        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            let ms = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    name: ENV_REQUEST_TIMEOUT_MS,
                    value: value.clone(),
                })?;
            config.request_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        Ok(config)
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn show_error(&self) -> bool {
        self.show_error
    }

    pub fn set_show_error(&mut self, show_error: bool) {
        self.show_error = show_error;
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn set_locale(&mut self, locale: Option<String>) {
        self.locale = locale;
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn set_request_timeout(&mut self, timeout: Option<Duration>) {
        self.request_timeout = timeout;
    }

    pub fn use_lazy_loading(&self) -> bool {
        self.use_lazy_loading
    }

    /// Switch lazy loading on or off.
    ///
    /// Changing the flag resets the three include levels to the matching
    /// preset: lazy means geometry, style and label by default and everything
    /// for selection and "all"; eager means everything everywhere.
    pub fn set_use_lazy_loading(&mut self, use_lazy_loading: bool) {
        if use_lazy_loading != self.use_lazy_loading {
            if use_lazy_loading {
                self.lazy_feature_includes_default = LAZY_DEFAULT;
                self.lazy_feature_includes_select = FeatureInclude::ALL;
                self.lazy_feature_includes_all = FeatureInclude::ALL;
            } else {
                self.lazy_feature_includes_default = FeatureInclude::ALL;
                self.lazy_feature_includes_select = FeatureInclude::ALL;
                self.lazy_feature_includes_all = FeatureInclude::ALL;
            }
        }
        self.use_lazy_loading = use_lazy_loading;
    }

    pub fn lazy_feature_includes_default(&self) -> FeatureInclude {
        self.lazy_feature_includes_default
    }

    pub fn lazy_feature_includes_select(&self) -> FeatureInclude {
        self.lazy_feature_includes_select
    }

    pub fn lazy_feature_includes_all(&self) -> FeatureInclude {
        self.lazy_feature_includes_all
    }

    // The three setters below switch lazy loading off before storing the value.
    // Existing embedders rely on this, so it is kept.

    pub fn set_lazy_feature_includes_default(&mut self, include: FeatureInclude) {
        self.set_use_lazy_loading(false);
        self.lazy_feature_includes_default = include;
    }

    pub fn set_lazy_feature_includes_select(&mut self, include: FeatureInclude) {
        self.set_use_lazy_loading(false);
        self.lazy_feature_includes_select = include;
    }

    pub fn set_lazy_feature_includes_all(&mut self, include: FeatureInclude) {
        self.set_use_lazy_loading(false);
        self.lazy_feature_includes_all = include;
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_enable_lazy_loading_presets() {
        let config = DispatcherConfig::default();
        assert!(config.use_lazy_loading());
        assert!(config.show_error());
        assert_eq!(config.service_url(), DEFAULT_SERVICE_URL);
        assert_eq!(
            config.lazy_feature_includes_default(),
            FeatureInclude::GEOMETRY | FeatureInclude::STYLE | FeatureInclude::LABEL
        );
        assert_eq!(config.lazy_feature_includes_select(), FeatureInclude::ALL);
        assert_eq!(config.lazy_feature_includes_all(), FeatureInclude::ALL);
    }

    #[test]
    fn switching_lazy_loading_applies_presets() {
        let mut config = DispatcherConfig::default();
        config.set_use_lazy_loading(false);
        assert_eq!(config.lazy_feature_includes_default(), FeatureInclude::ALL);

        config.set_use_lazy_loading(true);
        assert_eq!(config.lazy_feature_includes_default(), LAZY_DEFAULT);
        assert_eq!(config.lazy_feature_includes_select(), FeatureInclude::ALL);
        assert_eq!(config.lazy_feature_includes_all(), FeatureInclude::ALL);
    }

    // Intentional: any include-level setter turns lazy loading off.
    #[test]
    fn include_setters_disable_lazy_loading() {
        let mut config = DispatcherConfig::default();
        config.set_lazy_feature_includes_select(FeatureInclude::ATTRIBUTES);
        assert!(!config.use_lazy_loading());
        assert_eq!(config.lazy_feature_includes_select(), FeatureInclude::ATTRIBUTES);
        assert_eq!(config.lazy_feature_includes_default(), FeatureInclude::ALL);

        config.set_use_lazy_loading(true);
        config.set_lazy_feature_includes_default(FeatureInclude::GEOMETRY);
        assert!(!config.use_lazy_loading());
        assert_eq!(config.lazy_feature_includes_default(), FeatureInclude::GEOMETRY);

        config.set_use_lazy_loading(true);
        config.set_lazy_feature_includes_all(FeatureInclude::NONE);
        assert!(!config.use_lazy_loading());
        assert_eq!(config.lazy_feature_includes_all(), FeatureInclude::NONE);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = DispatcherConfig::from_lookup(lookup(&[
            (ENV_SERVICE_URL, "https://maps.example.org/geomajasService"),
            (ENV_SHOW_ERROR, "false"),
            (ENV_LOCALE, "nl_BE"),
            (ENV_LAZY_LOADING, "off"),
            (ENV_REQUEST_TIMEOUT_MS, "2500"),
        ]))
        .unwrap();

        assert_eq!(config.service_url(), "https://maps.example.org/geomajasService");
        assert!(!config.show_error());
        assert_eq!(config.locale(), Some("nl_BE"));
        assert!(!config.use_lazy_loading());
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn malformed_environment_values_are_rejected() {
        let err = DispatcherConfig::from_lookup(lookup(&[(ENV_SHOW_ERROR, "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { name: ENV_SHOW_ERROR, .. }));

        let err =
            DispatcherConfig::from_lookup(lookup(&[(ENV_REQUEST_TIMEOUT_MS, "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = DispatcherConfig::from_lookup(lookup(&[(ENV_SERVICE_URL, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Empty { name: ENV_SERVICE_URL });
    }
}
