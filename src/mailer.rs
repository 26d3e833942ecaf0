use crate::config::AppConfig;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{info, warn};
use std::error::Error as StdError;

const RESET_SUBJECT: &str = "UEP Learning Hub - Password Reset Request";

pub fn reset_link(base: &str, token: &str, role: &str) -> String {
    format!("{}/reset-password.html?token={}&role={}", base, token, role)
}

fn build_reset_email_html(username: &str, link: &str) -> String {
    format!(
        "<html><body>\
         <h2>UEP Learning Hub</h2>\
         <p>Hi {},</p>\
         <p>We received a request to reset your password. Click the link below \
         to choose a new one:</p>\
         <p><a href=\"{}\">Reset your password</a></p>\
         <p>If you did not request this, you can ignore this email.</p>\
         </body></html>",
        username, link
    )
}

/// Outbound mail is a best-effort side channel. With no SMTP transport
/// configured, or on any send failure, the message is written to the
/// operational log instead and the caller never sees an error.
#[derive(Clone)]
pub struct EmailService {
    transport: Option<SmtpTransport>,
    from: String,
    link_base: String,
}

impl EmailService {
    pub fn from_config(config: &AppConfig) -> Self {
        let transport = match &config.smtp_host {
            Some(host) => match SmtpTransport::starttls_relay(host) {
                Ok(builder) => {
                    let mut builder = builder.port(config.smtp_port);
                    if let (Some(user), Some(pass)) =
                        (&config.smtp_username, &config.smtp_password)
                    {
                        builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                    }
                    Some(builder.build())
                }
                Err(e) => {
                    warn!("Invalid SMTP relay {}: {}. Falling back to log output.", host, e);
                    None
                }
            },
            None => None,
        };

        Self {
            transport,
            from: config.smtp_from.clone(),
            link_base: config.reset_link_base.clone(),
        }
    }

    pub fn unconfigured(link_base: &str) -> Self {
        Self {
            transport: None,
            from: "UEP Learning Hub <no-reply@uep.edu.ph>".to_string(),
            link_base: link_base.to_string(),
        }
    }

    pub fn send_password_reset_email(&self, to_email: &str, token: &str, username: &str, role: &str) {
        let link = reset_link(&self.link_base, token, role);

        let Some(mailer) = &self.transport else {
            self.log_simulation(to_email, token, username, role, &link);
            return;
        };

        match self.compose(to_email, username, &link) {
            Ok(message) => match mailer.send(&message) {
                Ok(_) => info!("Password reset email sent to: {}", to_email),
                Err(e) => {
                    warn!("Failed to send email: {}", e);
                    self.log_simulation(to_email, token, username, role, &link);
                }
            },
            Err(e) => {
                warn!("Failed to compose email: {}", e);
                self.log_simulation(to_email, token, username, role, &link);
            }
        }
    }

    fn compose(
        &self,
        to_email: &str,
        username: &str,
        link: &str,
    ) -> Result<Message, Box<dyn StdError>> {
        let message = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .to(to_email.parse::<Mailbox>()?)
            .subject(RESET_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(build_reset_email_html(username, link))?;
        Ok(message)
    }

    fn log_simulation(&self, to_email: &str, token: &str, username: &str, role: &str, link: &str) {
        info!("=== EMAIL SIMULATION (No mail server configured) ===");
        info!("To: {}", to_email);
        info!("Token: {}", token);
        info!("Username: {}", username);
        info!("Role: {}", role);
        info!("Reset Link: {}", link);
        info!("===================================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_embeds_token_and_role() {
        let link = reset_link("http://localhost:8080", "abc-123", "student");
        assert_eq!(
            link,
            "http://localhost:8080/reset-password.html?token=abc-123&role=student"
        );
    }

    #[test]
    fn unconfigured_service_degrades_to_logging() {
        let service = EmailService::unconfigured("http://localhost:8080");
        // Must not panic or error; the fallback path is the contract.
        service.send_password_reset_email("someone@example.com", "tok", "stud1", "student");
    }

    #[test]
    fn reset_email_html_carries_the_link() {
        let html = build_reset_email_html("stud1", "http://x/reset-password.html?token=t&role=r");
        assert!(html.contains("stud1"));
        assert!(html.contains("token=t&role=r"));
    }
}
