//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and referential
//! sanity. Validation is a pure function returning every error found, not
//! just the first.

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in an otherwise parseable config.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener.bind_address must not be empty")]
    EmptyBindAddress,

    #[error("timeouts.request_ms must be greater than zero")]
    ZeroRequestTimeout,

    #[error("rate limit rule #{index} has an empty key")]
    EmptyRuleKey { index: usize },

    #[error("rate limit rule {key:?}: {field} must be greater than zero")]
    ZeroRuleField { key: String, field: &'static str },

    #[error("rate limit rule {key:?} is declared more than once")]
    DuplicateRule { key: String },

    #[error("auth.secret must not be empty")]
    EmptySecret,

    #[error("auth.issuer must not be empty")]
    EmptyIssuer,

    #[error("auth.expire_secs must be greater than zero")]
    ZeroExpiry,

    #[error("alert.timeout_secs must be greater than zero")]
    ZeroAlertTimeout,
}

/// Validate a parsed config.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let mut seen = HashSet::new();
    for (index, rule) in config.rate_limit.rules.iter().enumerate() {
        if rule.key.is_empty() {
            errors.push(ValidationError::EmptyRuleKey { index });
            continue;
        }
        for (field, value) in [
            ("capacity", rule.capacity),
            ("quantum", rule.quantum),
            ("fill_interval_ms", rule.fill_interval_ms),
        ] {
            if value == 0 {
                errors.push(ValidationError::ZeroRuleField {
                    key: rule.key.clone(),
                    field,
                });
            }
        }
        if !seen.insert(rule.key.as_str()) {
            errors.push(ValidationError::DuplicateRule {
                key: rule.key.clone(),
            });
        }
    }

    if config.auth.secret.is_empty() {
        errors.push(ValidationError::EmptySecret);
    }
    if config.auth.issuer.is_empty() {
        errors.push(ValidationError::EmptyIssuer);
    }
    if config.auth.expire_secs == 0 {
        errors.push(ValidationError::ZeroExpiry);
    }

    if config.alert.timeout_secs == 0 {
        errors.push(ValidationError::ZeroAlertTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LimiterRuleConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.timeouts.request_ms = 0;
        config.auth.secret.clear();
        config.rate_limit.rules.push(LimiterRuleConfig {
            key: "/auth".into(),
            capacity: 0,
            quantum: 1,
            fill_interval_ms: 1000,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroRequestTimeout,
                ValidationError::ZeroRuleField {
                    key: "/auth".into(),
                    field: "capacity"
                },
                ValidationError::DuplicateRule { key: "/auth".into() },
                ValidationError::EmptySecret,
            ]
        );
    }

    #[test]
    fn test_empty_rule_key() {
        let mut config = AppConfig::default();
        config.rate_limit.rules = vec![LimiterRuleConfig {
            key: String::new(),
            capacity: 1,
            quantum: 1,
            fill_interval_ms: 1,
        }];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::EmptyRuleKey { index: 0 }]);
    }
}
