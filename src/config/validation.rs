//! Configuration validation.
//!
//! Returns all validation errors, not just the first. Validation is a pure
//! function over the raw arguments and runs before any config is accepted.

use thiserror::Error;
use url::Url;

use crate::config::loader::ConfigArgs;

/// A single semantic problem with the supplied configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{field} is not a valid URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("{field} is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Check the raw arguments for missing or malformed values.
pub fn validate_args(args: &ConfigArgs) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url("GHOST_URL", &args.origin_url, &mut errors);
    check_url("BUNNYCDN_API_URL", &args.bunny_api_url, &mut errors);
    check_url("BUNNYCDN_STORAGE_URL", &args.bunny_storage_url, &mut errors);
    if let Some(public_url) = &args.public_url {
        check_url("PUBLIC_URL", public_url, &mut errors);
    }

    require("BUNNYCDN_API_KEY", args.bunny_api_key.as_deref(), &mut errors);
    require("BUNNYCDN_PULL_ZONE_ID", args.bunny_pull_zone_id.as_deref(), &mut errors);

    if args.purge_old_cache {
        require(
            "BUNNYCDN_STORAGE_ZONE_NAME",
            args.storage_zone_name.as_deref(),
            &mut errors,
        );
        require(
            "BUNNYCDN_STORAGE_ZONE_PASSWORD",
            args.storage_zone_password.as_deref(),
            &mut errors,
        );
    }

    if args.port == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "PORT",
            reason: "must be between 1 and 65535".to_string(),
        });
    }
    if args.purge_concurrency == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "PURGE_CONCURRENCY",
            reason: "must be at least 1".to_string(),
        });
    }
    if args.retry_max_attempts == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "RETRY_MAX_ATTEMPTS",
            reason: "must be at least 1".to_string(),
        });
    }
    if args.retry_base_delay_ms > args.retry_max_delay_ms {
        errors.push(ValidationError::InvalidValue {
            field: "RETRY_BASE_DELAY_MS",
            reason: "must not exceed RETRY_MAX_DELAY_MS".to_string(),
        });
    }
    if args.upstream_timeout_secs == 0 {
        errors.push(ValidationError::InvalidValue {
            field: "UPSTREAM_TIMEOUT_SECS",
            reason: "must be greater than zero".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn require(field: &'static str, value: Option<&str>, errors: &mut Vec<ValidationError>) {
    if value.map(str::trim).unwrap_or_default().is_empty() {
        errors.push(ValidationError::Missing(field));
    }
}

fn check_url(field: &'static str, value: &str, errors: &mut Vec<ValidationError>) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::InvalidUrl {
            field,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidUrl {
            field,
            reason: e.to_string(),
        }),
    }
}
