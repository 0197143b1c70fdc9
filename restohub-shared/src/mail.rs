/// Outgoing mail
///
/// Only one-time codes are ever mailed. Delivery goes through the
/// [`Mailer`] trait; [`ConsoleMailer`] writes the message to the log,
/// which is what development and test deployments use.

use async_trait::async_trait;

/// Subject line of every code mail
pub const OTP_SUBJECT: &str = "Your OTP Code";

/// Error type for mail delivery
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Failed to deliver mail to {to}: {reason}")]
    Delivery { to: String, reason: String },
}

/// Why a code is being sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Verification,
    PasswordReset,
}

impl OtpPurpose {
    fn describe(&self) -> &'static str {
        match self {
            OtpPurpose::Verification => "account verification",
            OtpPurpose::PasswordReset => "password reset",
        }
    }
}

/// Plain-text body of a code mail
pub fn otp_body(code: &str, purpose: OtpPurpose) -> String {
    format!(
        "Your OTP is {}. Use it for {} within 10 minutes.",
        code,
        purpose.describe()
    )
}

/// Sends one-time codes
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), MailError>;
}

/// Mailer that logs instead of sending
#[derive(Debug, Clone, Default)]
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), MailError> {
        tracing::info!(
            to = %to,
            subject = OTP_SUBJECT,
            body = %otp_body(code, purpose),
            "Mail written to console"
        );
        Ok(())
    }
}
