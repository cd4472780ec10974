pub mod ses;
pub mod smtp;

use crate::backup::backup_config::BackupDefinition;
use crate::backup::function_path;
use crate::backup::notifications::ses::SesNotification;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use crate::backup::runner::ArchiveResult;
use function_name::named;
use lettre::message::Mailbox;
use std::time::Duration;
use tokio::runtime::Handle;

/// A mail transport able to deliver one message.
pub trait Notification {
    fn send(&self, email: &Email) -> Result<()>;
}

/// Reports the outcome of a run to the people configured on the definition.
pub trait Notifier: Send + Sync {
    /// `Ok(())` without sending anything when notification is not configured.
    /// Fails with [`Error::Notify`].
    fn notify(&self, result: &ArchiveResult, definition: &BackupDefinition) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Email {
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
    pub subject: String,
    pub html_body: String,
}

impl Email {
    /// Report for one run, or `None` if the definition has no sender or no recipients.
    pub fn for_result(result: &ArchiveResult, definition: &BackupDefinition) -> Option<Email> {
        let (from, to) = definition.s3().notification_addresses()?;
        let name = escape_html(definition.name());

        let (subject, status) = match result.upload_error() {
            None => (
                format!("Backup {} uploaded successfully", definition.name()),
                "uploaded successfully",
            ),
            Some(_) => (
                format!("Backup {} upload failed", definition.name()),
                "failed to upload",
            ),
        };

        let mut html_body = format!(
            "<p>Backup {name} {status}.</p>\n\
             <p><strong>File: {}</strong></p>\n\
             <p><strong>Size: {}</strong></p>\n\
             <p><strong>Compress Duration: {}</strong></p>\n\
             <p><strong>Upload Duration: {}</strong></p>\n\
             <p><strong>Total Duration: {}</strong></p>\n",
            escape_html(&result.archive_path().display().to_string()),
            result
                .size()
                .map(|size| format!("{size} bytes"))
                .unwrap_or_else(|| "unknown".to_owned()),
            format_seconds(result.compress_duration()),
            format_seconds(result.upload_duration()),
            format_seconds(result.total_duration()),
        );
        if let Some(upload_error) = result.upload_error() {
            html_body.push_str(&format!(
                "<p><strong>Upload Error:</strong></p>\n<pre>{}</pre>\n",
                escape_html(upload_error)
            ));
        }

        Some(Email {
            from: from.clone(),
            to: to.to_vec(),
            subject,
            html_body,
        })
    }
}

fn format_seconds(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Sends reports over SMTP when the destination has an `smtp` block, over SES otherwise.
#[derive(Clone)]
pub struct EmailNotifier {
    runtime: Handle,
}

impl EmailNotifier {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl Notifier for EmailNotifier {
    #[named]
    fn notify(&self, result: &ArchiveResult, definition: &BackupDefinition) -> Result<()> {
        let Some(email) = Email::for_result(result, definition) else {
            tracing::debug!(
                "Notification not configured for {}, skipping",
                definition.name()
            );
            return Ok(());
        };

        match definition.s3().smtp() {
            Some(smtp) => smtp.send(&email),
            None => SesNotification::new(definition.s3(), &self.runtime).send(&email),
        }
        .add_fn_name(function_path!())
        .map_err(Error::notify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn definition(notification: &str) -> BackupDefinition {
        serde_yml::from_str(&format!(
            "name: daily-db\ncron: \"0 2 * * *\"\nsource_dir: /data\ns3:\n  bucket: backups\n  access_key: AKIAEXAMPLE\n  secret_key: s3cr3t\n  region: eu-west-1\n{notification}"
        ))
        .unwrap()
    }

    fn result(upload_error: Option<&str>) -> ArchiveResult {
        ArchiveResult::builder()
            .archive_path(PathBuf::from("./tmp/daily-db_20261018T020000.000001Z.tar.gz"))
            .size(2048)
            .compress_duration(Duration::from_millis(1500))
            .upload_duration(Duration::from_millis(250))
            .total_duration(Duration::from_millis(300))
            .maybe_upload_error(upload_error.map(str::to_owned))
            .build()
    }

    #[test]
    fn test_skipped_without_sender() {
        let definition = definition("  recipient_emails: [ops@example.com]\n");
        assert!(Email::for_result(&result(None), &definition).is_none());
    }

    #[test]
    fn test_skipped_without_recipients() {
        let definition = definition("  sender_email: backup@example.com\n");
        assert!(Email::for_result(&result(None), &definition).is_none());
    }

    #[test]
    fn test_success_report() {
        let definition = definition(
            "  sender_email: backup@example.com\n  recipient_emails: [ops@example.com, dba@example.com]\n",
        );
        let email = Email::for_result(&result(None), &definition).unwrap();

        assert_eq!(email.subject, "Backup daily-db uploaded successfully");
        assert_eq!(email.to.len(), 2);
        assert_eq!(email.from.email.to_string(), "backup@example.com");
        assert!(email.html_body.contains("daily-db_20261018T020000.000001Z.tar.gz"));
        assert!(email.html_body.contains("Size: 2048 bytes"));
        assert!(email.html_body.contains("Compress Duration: 1.500s"));
        assert!(email.html_body.contains("Upload Duration: 0.250s"));
        assert!(email.html_body.contains("Total Duration: 0.300s"));
        assert!(!email.html_body.contains("Upload Error"));
    }

    #[test]
    fn test_failure_report_still_sent() {
        let definition = definition(
            "  sender_email: backup@example.com\n  recipient_emails: [ops@example.com]\n",
        );
        let email =
            Email::for_result(&result(Some("NoSuchBucket <backups>")), &definition).unwrap();

        assert_eq!(email.subject, "Backup daily-db upload failed");
        assert!(email.html_body.contains("failed to upload"));
        assert!(email.html_body.contains("NoSuchBucket &lt;backups&gt;"));
    }

    #[test]
    fn test_unknown_size() {
        let definition = definition(
            "  sender_email: backup@example.com\n  recipient_emails: [ops@example.com]\n",
        );
        let result = ArchiveResult::builder()
            .archive_path(PathBuf::from("a.tar.gz"))
            .compress_duration(Duration::ZERO)
            .upload_duration(Duration::ZERO)
            .total_duration(Duration::ZERO)
            .build();
        let email = Email::for_result(&result, &definition).unwrap();
        assert!(email.html_body.contains("Size: unknown"));
    }

    #[test]
    fn test_notifier_skip_is_ok() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let notifier = EmailNotifier::new(runtime.handle().clone());
        assert!(notifier.notify(&result(None), &definition("")).is_ok());
    }

    #[test]
    fn test_notifier_smtp_failure_is_notify_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let notifier = EmailNotifier::new(runtime.handle().clone());
        let definition = definition(
            "  sender_email: backup@example.com\n  recipient_emails: [ops@example.com]\n  smtp:\n    host: 127.0.0.1\n    port: 1\n    smtp_mode: Unsecured\n    username: u\n    password: p\n",
        );

        let err = notifier.notify(&result(None), &definition).unwrap_err();
        assert!(matches!(err, Error::Notify { .. }));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
