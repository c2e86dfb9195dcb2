//! Per-request settings consulted by query processors

use serde::Deserialize;

/// How the query in a request should be run.
///
/// Settings never appear in the generated query directly, but processors
/// may read them to decide how to rewrite it.
pub trait RequestSettings: Send + Sync {
    fn get_turbo(&self) -> bool;
    fn get_consistent(&self) -> bool;
    fn get_debug(&self) -> bool;
    fn get_dry_run(&self) -> bool;
    fn get_referrer(&self) -> &str;
}

/// Settings for queries received through the HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpRequestSettings {
    pub turbo: bool,
    pub consistent: bool,
    pub debug: bool,
    pub dry_run: bool,
    pub referrer: String,
}

impl Default for HttpRequestSettings {
    fn default() -> Self {
        Self {
            turbo: false,
            consistent: false,
            debug: false,
            dry_run: false,
            referrer: "<unknown>".to_string(),
        }
    }
}

impl RequestSettings for HttpRequestSettings {
    fn get_turbo(&self) -> bool {
        self.turbo
    }

    fn get_consistent(&self) -> bool {
        self.consistent
    }

    fn get_debug(&self) -> bool {
        self.debug
    }

    fn get_dry_run(&self) -> bool {
        self.dry_run
    }

    fn get_referrer(&self) -> &str {
        &self.referrer
    }
}

/// Settings for subscription queries: never turbo, always consistent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequestSettings {
    referrer: String,
}

impl SubscriptionRequestSettings {
    pub fn new(referrer: impl Into<String>) -> Self {
        Self {
            referrer: referrer.into(),
        }
    }
}

impl RequestSettings for SubscriptionRequestSettings {
    fn get_turbo(&self) -> bool {
        false
    }

    fn get_consistent(&self) -> bool {
        true
    }

    fn get_debug(&self) -> bool {
        false
    }

    fn get_dry_run(&self) -> bool {
        false
    }

    fn get_referrer(&self) -> &str {
        &self.referrer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_settings_from_partial_json() {
        let settings: HttpRequestSettings =
            serde_json::from_str(r#"{"turbo": true, "referrer": "api"}"#).unwrap();
        assert!(settings.get_turbo());
        assert!(!settings.get_consistent());
        assert_eq!(settings.get_referrer(), "api");
    }

    #[test]
    fn test_subscription_settings_are_fixed() {
        let settings = SubscriptionRequestSettings::new("subscriptions");
        assert!(settings.get_consistent());
        assert!(!settings.get_turbo());
        assert!(!settings.get_dry_run());
    }
}
