// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: positive limits, ordered pacing tables, probabilities in
//! range, non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::VolleyConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &VolleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.dispatch.daily_limit <= 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.daily_limit must be positive, got {}",
                config.dispatch.daily_limit
            ),
        });
    }

    if config.dispatch.rate_per_minute <= 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "dispatch.rate_per_minute must be positive, got {}",
                config.dispatch.rate_per_minute
            ),
        });
    }

    if config.dispatch.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.max_attempts must be at least 1".to_string(),
        });
    }

    if config.dispatch.workers == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.workers must be at least 1".to_string(),
        });
    }

    // Warm-up phases: non-empty, first from 0, strictly increasing, sane bands.
    if config.pacing.warm_up.is_empty() {
        errors.push(ConfigError::Validation {
            message: "pacing.warm_up must not be empty".to_string(),
        });
    } else {
        if config.pacing.warm_up[0].from != 0 {
            errors.push(ConfigError::Validation {
                message: "pacing.warm_up must start with a phase at from = 0".to_string(),
            });
        }
        for window in config.pacing.warm_up.windows(2) {
            if window[1].from <= window[0].from {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "pacing.warm_up phases must be strictly increasing by `from` \
                         ({} then {})",
                        window[0].from, window[1].from
                    ),
                });
            }
        }
        for band in &config.pacing.warm_up {
            if band.max_secs < band.min_secs {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "pacing.warm_up band at {} has max_secs {} < min_secs {}",
                        band.from, band.max_secs, band.min_secs
                    ),
                });
            }
        }
    }

    for window in config.pacing.strategic_pauses.windows(2) {
        if window[1].at <= window[0].at {
            errors.push(ConfigError::Validation {
                message: format!(
                    "pacing.strategic_pauses must be strictly increasing by `at` \
                     ({} then {})",
                    window[0].at, window[1].at
                ),
            });
        }
    }

    if !(0.0..=1.0).contains(&config.pacing.micro_pause_probability) {
        errors.push(ConfigError::Validation {
            message: format!(
                "pacing.micro_pause_probability must be in [0, 1], got {}",
                config.pacing.micro_pause_probability
            ),
        });
    }

    if config.pacing.micro_pause_max_secs < config.pacing.micro_pause_min_secs {
        errors.push(ConfigError::Validation {
            message: "pacing.micro_pause_max_secs must be >= micro_pause_min_secs"
                .to_string(),
        });
    }

    for window in config.pacing.content_bands.windows(2) {
        if window[1].max_len <= window[0].max_len {
            errors.push(ConfigError::Validation {
                message: "pacing.content_bands must be strictly increasing by max_len"
                    .to_string(),
            });
        }
    }

    if !(0.0..=1.0).contains(&config.cache.hit_rate_warn) {
        errors.push(ConfigError::Validation {
            message: format!(
                "cache.hit_rate_warn must be in [0, 1], got {}",
                config.cache.hit_rate_warn
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
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

    #[test]
    fn default_config_validates() {
        let config = VolleyConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_daily_limit_fails() {
        let mut config = VolleyConfig::default();
        config.dispatch.daily_limit = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("daily_limit"))
        ));
    }

    #[test]
    fn unordered_warm_up_fails() {
        let mut config = VolleyConfig::default();
        config.pacing.warm_up[2].from = config.pacing.warm_up[1].from;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("warm_up"))
        ));
    }

    #[test]
    fn warm_up_must_cover_zero() {
        let mut config = VolleyConfig::default();
        config.pacing.warm_up[0].from = 5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("from = 0"))
        ));
    }

    #[test]
    fn out_of_range_probability_fails() {
        let mut config = VolleyConfig::default();
        config.pacing.micro_pause_probability = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(
            e,
            ConfigError::Validation { message } if message.contains("micro_pause_probability")
        )));
    }

    #[test]
    fn empty_database_path_fails() {
        let mut config = VolleyConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))
        ));
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut config = VolleyConfig::default();
        config.dispatch.daily_limit = -1;
        config.dispatch.rate_per_minute = 0;
        config.dispatch.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
