use crate::backup::notifications::smtp::SmtpNotificationConfig;
use crate::backup::redacted::RedactedString;
use crate::backup::validate::validate_not_blank;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::config::Credentials;
use bon::Builder;
use getset::Getters;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::time::Duration;
use validator::Validate;

static CREDENTIALS_PROVIDER_NAME: &str = "s3_backup_config";

/// Where an archive goes and who hears about it.
///
/// The bucket credentials double as SES credentials unless an `smtp` block is present.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct DestinationConfig {
    #[validate(custom(function = validate_not_blank))]
    #[builder(into)]
    bucket: String,
    #[validate(custom(function = validate_not_blank))]
    #[builder(into)]
    access_key: String,
    #[validate(nested)]
    #[builder(into)]
    secret_key: RedactedString,
    #[validate(custom(function = validate_not_blank))]
    #[builder(into)]
    region: String,
    /// Custom S3-compatible endpoint, e.g. MinIO. Switches to path-style addressing.
    #[builder(into)]
    endpoint_url: Option<String>,
    #[serde(default, with = "humantime_serde")]
    upload_timeout: Option<Duration>,
    #[builder(into)]
    sender_email: Option<Mailbox>,
    #[serde(default)]
    #[builder(default, into)]
    recipient_emails: Vec<Mailbox>,
    #[validate(nested)]
    smtp: Option<SmtpNotificationConfig>,
}

impl DestinationConfig {
    /// Sender and recipients, or `None` when notification is not configured.
    pub fn notification_addresses(&self) -> Option<(&Mailbox, &[Mailbox])> {
        match &self.sender_email {
            Some(sender) if !self.recipient_emails.is_empty() => {
                Some((sender, self.recipient_emails.as_slice()))
            }
            _ => None,
        }
    }

    /// AWS SDK configuration built from the static credentials in this destination.
    pub async fn sdk_config(&self) -> SdkConfig {
        let credentials = Credentials::new(
            self.access_key.clone(),
            self.secret_key.inner().to_owned(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        loader.load().await
    }
}
