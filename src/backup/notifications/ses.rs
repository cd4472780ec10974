use crate::backup::destination::DestinationConfig;
use crate::backup::function_path;
use crate::backup::notifications::{Email, Notification};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use aws_sdk_sesv2::error::DisplayErrorContext;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};
use function_name::named;
use itertools::Itertools;
use tokio::runtime::Handle;

static CHARSET: &str = "UTF-8";

/// Amazon SES delivery using the destination's credentials and region.
pub struct SesNotification<'a> {
    destination: &'a DestinationConfig,
    runtime: &'a Handle,
}

impl<'a> SesNotification<'a> {
    pub fn new(destination: &'a DestinationConfig, runtime: &'a Handle) -> Self {
        Self {
            destination,
            runtime,
        }
    }
}

impl Notification for SesNotification<'_> {
    #[named]
    fn send(&self, email: &Email) -> Result<()> {
        let to_addresses = email.to.iter().map(ToString::to_string).collect_vec();
        tracing::info!(
            "Started ses email notification from {} to {:?} in {}",
            email.from,
            to_addresses,
            self.destination.region()
        );

        let subject = Content::builder()
            .data(email.subject.as_str())
            .charset(CHARSET)
            .build()?;
        let html = Content::builder()
            .data(email.html_body.as_str())
            .charset(CHARSET)
            .build()?;
        let message = Message::builder()
            .subject(subject)
            .body(Body::builder().html(html).build())
            .build();
        let content = EmailContent::builder().simple(message).build();
        let destination = Destination::builder()
            .set_to_addresses(Some(to_addresses))
            .build();

        let output = self
            .runtime
            .block_on(async {
                let sdk_config = self.destination.sdk_config().await;
                aws_sdk_sesv2::Client::new(&sdk_config)
                    .send_email()
                    .from_email_address(email.from.to_string())
                    .destination(destination)
                    .content(content)
                    .send()
                    .await
            })
            .map_err(|e| Error::aws(DisplayErrorContext(&e).to_string()))
            .add_fn_name(function_path!())?;

        tracing::info!(
            "SES accepted message {}",
            output.message_id().unwrap_or("<no id>")
        );
        Ok(())
    }
}
