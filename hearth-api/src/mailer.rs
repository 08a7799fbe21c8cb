use async_trait::async_trait;
use chrono::NaiveDate;

/// A rendered, ready-to-send email.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail transport. SMTP delivery sits behind this seam; the
/// default transport records the rendered message in the log.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        message: EmailMessage,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        message: EmailMessage,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "outbound email:\n{}",
            message.body
        );
        Ok(())
    }
}

/// Typed message templates. Rendering is pure so it can be unit-tested
/// without a transport.
pub mod templates {
    use super::*;

    fn dollars(cents: i64) -> String {
        format!("${}.{:02}", cents / 100, (cents % 100).abs())
    }

    pub fn welcome(to: &str, name: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Welcome to Hearth".into(),
            body: format!(
                "Hi {name},\n\n\
                 Your account is ready. Browse stays, save favorites and book\n\
                 when you find the right place.\n\n\
                 — The Hearth team\n"
            ),
        }
    }

    pub fn reservation_confirmation(
        to: &str,
        name: &str,
        property_title: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
        total_cents: i64,
    ) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: format!("Reservation request received — {property_title}"),
            body: format!(
                "Hi {name},\n\n\
                 We are holding {property_title} for you from {check_in} to {check_out}.\n\
                 Total: {}. Complete payment to confirm the booking; unpaid\n\
                 requests are released automatically.\n\n\
                 — The Hearth team\n",
                dollars(total_cents)
            ),
        }
    }

    pub fn payment_receipt(
        to: &str,
        name: &str,
        amount_cents: i64,
        card_last_four: &str,
    ) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Payment received".into(),
            body: format!(
                "Hi {name},\n\n\
                 We charged {} to the card ending in {card_last_four}.\n\
                 Your reservation is confirmed.\n\n\
                 — The Hearth team\n",
                dollars(amount_cents)
            ),
        }
    }

    pub fn booking_cancellation(
        to: &str,
        name: &str,
        property_title: &str,
        refund_cents: i64,
    ) -> EmailMessage {
        let refund_line = if refund_cents > 0 {
            format!("A refund of {} is on its way.", dollars(refund_cents))
        } else {
            "No payment had been captured, so there is nothing to refund.".to_string()
        };
        EmailMessage {
            to: to.to_string(),
            subject: format!("Reservation cancelled — {property_title}"),
            body: format!(
                "Hi {name},\n\n\
                 Your reservation at {property_title} has been cancelled.\n\
                 {refund_line}\n\n\
                 — The Hearth team\n"
            ),
        }
    }

    pub fn property_approval(to: &str, name: &str, property_title: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: format!("Listing approved — {property_title}"),
            body: format!(
                "Hi {name},\n\n\
                 {property_title} is now live and can take bookings.\n\n\
                 — The Hearth team\n"
            ),
        }
    }

}
