use serde::{Deserialize, Serialize};
use std::{env, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Local,
    Dev,
    Test,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_env(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "local" => Self::Local,
            "dev" | "development" => Self::Dev,
            "test" | "testing" => Self::Test,
            "staging" => Self::Staging,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Local => "local",
            Self::Dev => "dev",
            Self::Test => "test",
            Self::Staging => "staging",
            Self::Prod => "prod",
        };
        write!(f, "{}", value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service_name: String,
    pub environment: Environment,
    pub region: Option<String>,
    pub bind_addr: String,
    pub metrics_addr: Option<String>,
    pub log_level: String,
}

impl ServiceConfig {
    pub fn from_env(default_service_name: &str) -> Self {
        Self::from_lookup(default_service_name, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(default_service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service_name: lookup("C2_SERVICE_NAME")
                .unwrap_or_else(|| default_service_name.to_string()),
            environment: Environment::from_env(
                &lookup("C2_ENV").unwrap_or_else(|| "local".to_string()),
            ),
            region: lookup("C2_REGION"),
            bind_addr: lookup("C2_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            metrics_addr: lookup("C2_METRICS_ADDR"),
            log_level: lookup("C2_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}

/// Thresholds for the rule-based situation brief and query limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    pub brief_population_threshold: u64,
    pub brief_agency_threshold: usize,
    pub brief_personnel_threshold: u64,
    pub brief_recent_events: usize,
    pub brief_interval_minutes: u64,
    pub timeline_default_limit: usize,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            brief_population_threshold: 10_000,
            brief_agency_threshold: 3,
            brief_personnel_threshold: 100,
            brief_recent_events: 5,
            brief_interval_minutes: 60,
            timeline_default_limit: 50,
        }
    }
}

impl CoordinationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            brief_population_threshold: parsed(
                &lookup,
                "C2_BRIEF_POPULATION_THRESHOLD",
                defaults.brief_population_threshold,
            ),
            brief_agency_threshold: parsed(
                &lookup,
                "C2_BRIEF_AGENCY_THRESHOLD",
                defaults.brief_agency_threshold,
            ),
            brief_personnel_threshold: parsed(
                &lookup,
                "C2_BRIEF_PERSONNEL_THRESHOLD",
                defaults.brief_personnel_threshold,
            ),
            brief_recent_events: parsed(
                &lookup,
                "C2_BRIEF_RECENT_EVENTS",
                defaults.brief_recent_events,
            ),
            brief_interval_minutes: parsed(
                &lookup,
                "C2_BRIEF_INTERVAL_MINUTES",
                defaults.brief_interval_minutes,
            ),
            timeline_default_limit: parsed(
                &lookup,
                "C2_TIMELINE_DEFAULT_LIMIT",
                defaults.timeline_default_limit,
            ),
        }
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn service_config_defaults() {
        let config = ServiceConfig::from_lookup("c2-api", lookup_from(&[]));
        assert_eq!(config.service_name, "c2-api");
        assert_eq!(config.environment, Environment::Local);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn coordination_config_overrides_and_falls_back() {
        let config = CoordinationConfig::from_lookup(lookup_from(&[
            ("C2_BRIEF_AGENCY_THRESHOLD", "5"),
            ("C2_BRIEF_PERSONNEL_THRESHOLD", "lots"),
        ]));
        assert_eq!(config.brief_agency_threshold, 5);
        assert_eq!(config.brief_personnel_threshold, 100);
        assert_eq!(config.brief_population_threshold, 10_000);
    }
}
