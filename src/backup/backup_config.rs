use crate::backup::compress::CompressorConfig;
use crate::backup::destination::DestinationConfig;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::validate::{validate_cron_str, validate_dir_exist_or_created, validate_job_name};
use bon::Builder;
use getset::Getters;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

/// The whole configuration file.
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    /// Where archives are written before upload.
    #[serde(default = "default_staging_dir")]
    #[builder(default = default_staging_dir(), into)]
    #[validate(custom(function = validate_dir_exist_or_created))]
    staging_dir: PathBuf,
    #[serde(default)]
    #[builder(default)]
    #[validate(nested)]
    compressor: CompressorConfig,
    #[validate(nested)]
    #[builder(into)]
    backups: Vec<BackupDefinition>,
}

/// One directory, its schedule and where it goes.
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize, Debug, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupDefinition {
    #[validate(custom(function = validate_job_name))]
    #[builder(into)]
    name: Arc<str>,
    #[validate(custom(function = validate_cron_str))]
    #[builder(into)]
    cron: Arc<str>,
    #[builder(into)]
    source_dir: PathBuf,
    #[validate(nested)]
    s3: DestinationConfig,
}

impl BackupConfig {
    /// Reads, parses and validates a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<BackupConfig> {
        let path = path.as_ref();
        let config = File::open(path)
            .map_err(Error::from)
            .add_msg(format!("Open config failed: {:?}", path))
            .and_then(|f| {
                serde_yml::from_reader::<_, BackupConfig>(f)
                    .map_err(Error::from)
                    .add_msg(format!("Parse YAML config failed: {:?}", path))
            })?;
        config
            .check()
            .add_msg(format!("Config validation failed: {:?}", path))?;
        Ok(config)
    }

    /// Field validation plus the checks spanning several definitions.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.backups.is_empty() {
            return Err(Error::config("no backups configured"));
        }
        check_unique_names(&self.backups)
    }

    pub fn into_definitions(self) -> Vec<BackupDefinition> {
        self.backups
    }
}

pub fn check_unique_names(definitions: &[BackupDefinition]) -> Result<()> {
    let duplicates = definitions
        .iter()
        .map(|d| d.name.as_ref())
        .duplicates()
        .collect_vec();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(Error::config(format!(
            "duplicate backup names: {}",
            duplicates.iter().map(|n| format!("{n:?}")).join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn config_yaml(staging: &Path, backups: &str) -> String {
        format!("staging_dir: {}\nbackups:\n{backups}", staging.display())
    }

    fn backup_yaml(name: &str, cron: &str) -> String {
        format!(
            "  - name: {name}\n    cron: \"{cron}\"\n    source_dir: /data\n    s3:\n      bucket: backups\n      access_key: AKIAEXAMPLE\n      secret_key: s3cr3t\n      region: eu-west-1\n      sender_email: backup@example.com\n      recipient_emails:\n        - ops@example.com\n"
        )
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join("tmp");
        let file = write_config(&config_yaml(&staging, &backup_yaml("daily-db", "0 2 * * *")));

        let config = BackupConfig::load(file.path()).unwrap();

        assert!(staging.is_dir());
        assert!(matches!(config.compressor(), CompressorConfig::Gzip(_)));
        let definitions = config.into_definitions();
        assert_eq!(definitions.len(), 1);
        let definition = &definitions[0];
        assert_eq!(definition.name().as_ref(), "daily-db");
        assert_eq!(definition.cron().as_ref(), "0 2 * * *");
        assert_eq!(definition.source_dir(), Path::new("/data"));
        assert_eq!(definition.s3().region(), "eu-west-1");
        assert!(definition.s3().notification_addresses().is_some());
    }

    #[test]
    fn test_default_staging_dir() {
        let config: BackupConfig =
            serde_yml::from_str(&format!("backups:\n{}", backup_yaml("a", "* * * * *"))).unwrap();
        assert_eq!(config.staging_dir(), Path::new("./tmp"));
    }

    #[test]
    fn test_three_field_cron_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_config(&config_yaml(temp_dir.path(), &backup_yaml("daily-db", "* * *")));

        let err = BackupConfig::load(file.path()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Config validation failed"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let backups = format!(
            "{}{}",
            backup_yaml("daily-db", "0 2 * * *"),
            backup_yaml("daily-db", "0 3 * * *")
        );
        let file = write_config(&config_yaml(temp_dir.path(), &backups));

        let err = BackupConfig::load(file.path()).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("duplicate backup names: \"daily-db\""));
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let backups = "  - name: daily-db\n    cron: \"0 2 * * *\"\n    source_dir: /data\n";
        let file = write_config(&config_yaml(temp_dir.path(), backups));

        let err = BackupConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Parse YAML config failed"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let content = format!(
            "{}retention: 7d\n",
            config_yaml(temp_dir.path(), &backup_yaml("daily-db", "0 2 * * *"))
        );
        let file = write_config(&content);

        assert!(BackupConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_empty_backups_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_config(&format!(
            "staging_dir: {}\nbackups: []\n",
            temp_dir.path().display()
        ));

        let err = BackupConfig::load(file.path()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_missing_file() {
        let err = BackupConfig::load("/nonexistent/config.yaml").unwrap_err();
        assert!(err.to_string().contains("Open config failed"));
    }

    #[test]
    fn test_source_dir_not_checked_at_load() {
        let temp_dir = TempDir::new().unwrap();
        let backups = backup_yaml("daily-db", "0 2 * * *").replace("/data", "/does/not/exist");
        let file = write_config(&config_yaml(temp_dir.path(), &backups));

        assert!(BackupConfig::load(file.path()).is_ok());
    }
}
