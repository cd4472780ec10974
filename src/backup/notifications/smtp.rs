use crate::backup::function_path;
use crate::backup::notifications::{Email, Notification};
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::validate::validate_not_blank;
use bon::Builder;
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::Response;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use validator::Validate;

/// SMTP delivery for backup reports, used instead of SES when configured.
///
/// Sender and recipients come from the destination; this block only says how to reach
/// the mail server.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct SmtpNotificationConfig {
    #[validate(custom(function = validate_not_blank))]
    #[builder(into)]
    host: String,
    port: Option<u16>,
    #[builder(into)]
    smtp_mode: SmtpMode,
    #[builder(into)]
    username: String,
    #[validate(nested)]
    #[builder(into)]
    password: RedactedString,
}

/// SMTP connection security modes
///
/// - `Unsecured`: Plain text connection (not recommended for production)
/// - `Ssl`: SSL/TLS encrypted connection from start
/// - `StartTls`: Start with plain text, then upgrade to TLS
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum SmtpMode {
    Unsecured,
    Ssl,
    StartTls,
}

impl Notification for SmtpNotificationConfig {
    #[named]
    fn send(&self, email: &Email) -> Result<()> {
        tracing::info!(
            "Started smtp email notification from {} to {:?}",
            email.from,
            email.to.iter().map(ToString::to_string).collect_vec()
        );
        let message = email
            .to
            .iter()
            .fold(Message::builder(), |message, send_to| {
                message.to(send_to.clone())
            })
            .from(email.from.clone())
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(Error::from)
            .add_msg(format!("Fail to build notification email from {}", email.from))
            .add_fn_name(function_path!())?;

        let creds = Credentials::new(self.username.clone(), self.password.inner().to_owned());

        let mut builder = match self.smtp_mode {
            SmtpMode::Unsecured => Ok(SmtpTransport::builder_dangerous(self.host.as_str())),
            SmtpMode::Ssl => SmtpTransport::relay(self.host.as_str()),
            SmtpMode::StartTls => SmtpTransport::starttls_relay(self.host.as_str()),
        }
        .map_err(Error::from)
        .add_msg(format!(
            "Failed to build smtp client for host: {:?} with mode {:?}",
            self.host, self.smtp_mode
        ))
        .add_fn_name(function_path!())?
        .credentials(creds);
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        let mailer = builder.build();

        tracing::info!("Sending email...");
        let response = mailer
            .send(&message)
            .map_err(Error::from)
            .add_fn_name(function_path!())?;
        if response.is_positive() {
            Ok(())
        } else {
            Err(negative_reply_error(&response))
        }
    }
}

/// One error per reply line, or the bare reply code when the server sent no text.
fn negative_reply_error(response: &Response) -> Error {
    let mut errors = response
        .message()
        .map(|m| Error::smtp_send_error(m.to_owned()))
        .collect_vec();
    match errors.len() {
        0 => Error::smtp_send_error(format!("negative reply {}", response.code())),
        1 => errors.remove(0),
        _ => Error::lots_of_error(errors),
    }
}
