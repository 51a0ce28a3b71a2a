use async_trait::async_trait;
use tracing::info;

use super::email_argument;
use crate::format::ResultValue;
use crate::tools::{InputSchema, ParamSpec, ParamType, Tool, ToolError, ValidatedArguments};

/// Records an outgoing e-mail in the log instead of delivering it.
pub struct SendEmail;

#[async_trait]
impl Tool for SendEmail {
    fn name(&self) -> &'static str {
        "send_email"
    }

    fn description(&self) -> &'static str {
        "Simulate sending an email."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::new(vec![
            ParamSpec::required("to_email", ParamType::String, "Recipient email address."),
            ParamSpec::required("subject", ParamType::String, "Subject line."),
            ParamSpec::required("body", ParamType::String, "Message body."),
        ])
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let to_email = email_argument(&arguments, "to_email")?;
        let subject = arguments.require_text("subject")?;
        let body_chars = arguments.require_text("body")?.chars().count();

        info!(
            event_name = "operation.send_email.simulated",
            to = %to_email,
            subject,
            body_chars,
            "simulated outbound email"
        );

        Ok(ResultValue::status(format!(
            "Simulated sending email to {to_email} with subject '{subject}'. \
             Body length: {body_chars} characters."
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SendEmail;
    use crate::format::ResultValue;
    use crate::tools::{Tool, ToolError};

    #[tokio::test]
    async fn send_email_reports_subject_and_body_length() {
        let arguments = json!({"to_email": "ada@opsdesk.test", "subject": "Hi", "body": "héllo"});
        let validated = SendEmail
            .schema()
            .validate(arguments.as_object().expect("object"))
            .expect("valid arguments");

        assert_eq!(
            SendEmail.execute(validated).await,
            Ok(ResultValue::status(
                "Simulated sending email to ada@opsdesk.test with subject 'Hi'. \
                 Body length: 5 characters."
            ))
        );
    }

    #[tokio::test]
    async fn invalid_recipient_is_rejected() {
        let arguments = json!({"to_email": "nobody", "subject": "Hi", "body": ""});
        let validated = SendEmail
            .schema()
            .validate(arguments.as_object().expect("object"))
            .expect("valid arguments");

        assert!(matches!(SendEmail.execute(validated).await, Err(ToolError::InvalidInput(_))));
    }
}
