//! Validation functions for configuration values.
//!
//! Used by the `validator` derives on the config types and again by the
//! scheduler when definitions are registered.

use chrono::Utc;
use sanitize_filename::{is_sanitized, sanitize};
use validator::ValidationError;

use std::path::Path;

/// Number of fields in a crontab expression: minute, hour, day of month, month, day of week.
pub const CRON_FIELD_COUNT: usize = 5;

/// Job names end up as archive file name prefixes, so they have to be valid file names.
pub fn validate_job_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    let name = name.as_ref();
    if name.trim().is_empty() {
        return Err(ValidationError::new("InvalidJobName")
            .with_message("backup name must not be empty".into()));
    }

    if !is_sanitized(name) {
        return Err(ValidationError::new("InvalidJobName").with_message(
            format!(
                "Invalid backup name {:?}, try sanitizing like {:?}",
                name,
                sanitize(name)
            )
            .into(),
        ));
    }

    Ok(())
}

pub fn validate_cron_str<S: AsRef<str>>(cron: S) -> Result<(), ValidationError> {
    let cron = cron.as_ref();
    let field_count = cron.split_whitespace().count();
    if field_count != CRON_FIELD_COUNT {
        return Err(ValidationError::new("InvalidCron").with_message(
            format!(
                "Invalid cron string {cron:?}: expected {CRON_FIELD_COUNT} fields, found {field_count}"
            )
            .into(),
        ));
    }

    if let Err(e) = cron_parser::parse(cron, &Utc::now()) {
        return Err(ValidationError::new("InvalidCron")
            .with_message(format!("Invalid cron string {cron:?}: {e:?}").into()));
    }

    Ok(())
}

pub fn validate_not_blank<S: AsRef<str>>(value: S) -> Result<(), ValidationError> {
    if value.as_ref().trim().is_empty() {
        return Err(ValidationError::new("Blank").with_message("must not be blank".into()));
    }

    Ok(())
}

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access staging_dir path {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}
