//! Fulfilment emails.
//!
//! Once an order is paid, the buyer is emailed their codes. Sending happens in an `on_order_paid` event hook, so it
//! runs after the payment has committed and a failed send can never undo or delay a payment. The order's
//! `email_sent` flag guards against sending twice.
//!
//! If no mail API key is configured, the rendered message is written to the log instead.
use std::{fmt::Write, sync::Arc, time::Duration};

use faka_engine::{
    db_types::{DeliveryFormat, License, Order, OrderStatusType, Product},
    events::{EventHandlers, EventHooks, OrderPaidEvent},
    traits::StorefrontDatabase,
    SqliteDatabase,
};
use log::*;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::MailConfig;

pub const MAIL_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Debug, Clone, Error)]
pub enum MailError {
    #[error("Could not initialize the mail client: {0}")]
    Initialization(String),
    #[error("Could not send the email: {0}")]
    SendFailed(String),
    #[error("The mail API rejected the message. Error {status}. {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

//--------------------------------------        Mailer         ---------------------------------------------------------
#[derive(Clone)]
pub enum Mailer {
    /// Writes messages to the log. Used when no mail API is configured.
    Log,
    Http(HttpMailer),
}

impl Mailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        if config.is_configured() {
            Ok(Self::Http(HttpMailer::new(config)?))
        } else {
            Ok(Self::Log)
        }
    }

    pub async fn send(&self, email: &Email) -> Result<(), MailError> {
        match self {
            Mailer::Log => {
                let to = email.to.join(", ");
                info!("📧️ Mail delivery is not configured. Message for {to}:\n{}\n{}", email.subject, email.text);
                Ok(())
            },
            Mailer::Http(mailer) => mailer.send(email).await,
        }
    }
}

/// Sends mail through an HTTP mail API that takes a JSON message and a bearer token.
#[derive(Clone)]
pub struct HttpMailer {
    api_url: String,
    api_key: String,
    client: Arc<Client>,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| MailError::Initialization(e.to_string()))?;
        Ok(Self { api_url: config.api_url.clone(), api_key: config.api_key.reveal().clone(), client: Arc::new(client) })
    }

    pub async fn send(&self, email: &Email) -> Result<(), MailError> {
        trace!("📧️ Posting message to {}", self.api_url);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(MailError::Rejected { status, message })
        }
    }
}

//--------------------------------------       Rendering       ---------------------------------------------------------
/// The contact looks like something we can mail. Buyers may leave a phone number or chat handle instead.
pub fn is_email_address(contact: &str) -> bool {
    let contact = contact.trim();
    match contact.split_once('@') {
        Some((user, domain)) => !user.is_empty() && domain.contains('.') && !contact.contains(char::is_whitespace),
        None => false,
    }
}

fn format_license(out: &mut String, index: usize, code: &str, format: DeliveryFormat) {
    let _ = writeln!(out, "\n[Item #{}]", index + 1);
    for (label, value) in format.fields(code) {
        let value = if value.is_empty() { "-" } else { value };
        let _ = writeln!(out, "{label}: {value}");
    }
}

pub fn render_fulfilment_email(
    config: &MailConfig,
    public_url: &str,
    order: &Order,
    product: &Product,
    licenses: &[License],
) -> Email {
    let mut items = String::new();
    licenses.iter().enumerate().for_each(|(i, l)| format_license(&mut items, i, &l.code, product.delivery_format));
    let subject = format!("[{}] Your order has been delivered - {}", config.site_title, product.name);
    let text = format!(
        "Dear customer,\n\nPayment for order {order_no} was successful. Thank you for your purchase!\n\nProduct: \
         {name}\nQuantity: {quantity}\nAmount paid: {total}\n\nYour items:\n--------------------------{items}\
         --------------------------\n\nYou can view your order at any time here:\n{base}/orders/{order_no}\n",
        order_no = order.order_no,
        name = product.name,
        quantity = order.quantity,
        total = order.total_amount,
        base = public_url.trim_end_matches('/'),
    );
    Email { from: config.from.clone(), to: vec![order.contact.trim().to_string()], subject, text }
}

/// Sends the fulfilment email for a freshly paid order and records that it was sent.
///
/// Returns `true` if a message was sent. Orders that are not paid, already notified, have no codes attached, or have
/// no email contact are skipped.
pub async fn send_fulfilment_email(
    db: &SqliteDatabase,
    mailer: &Mailer,
    config: &MailConfig,
    public_url: &str,
    event: OrderPaidEvent,
) -> bool {
    let OrderPaidEvent { order, product, licenses } = event;
    if order.status != OrderStatusType::Paid || order.email_sent {
        debug!(
            "📧️ Skipping email for order [{}]. Status {}, already sent: {}",
            order.order_no, order.status, order.email_sent
        );
        return false;
    }
    if licenses.is_empty() {
        warn!("📧️ Skipping email for order [{}]. No codes are attached to it.", order.order_no);
        return false;
    }
    if !is_email_address(&order.contact) {
        debug!("📧️ Skipping email for order [{}]. The buyer did not leave an email address.", order.order_no);
        return false;
    }
    let email = render_fulfilment_email(config, public_url, &order, &product, &licenses);
    if let Err(e) = mailer.send(&email).await {
        error!("📧️ Failed to send the fulfilment email for order [{}]. {e}", order.order_no);
        return false;
    }
    match db.mark_email_sent(&order.order_no).await {
        Ok(true) => info!("📧️ Fulfilment email for order [{}] sent", order.order_no),
        Ok(false) => warn!("📧️ Order [{}] was already marked as notified. A duplicate email went out.", order.order_no),
        Err(e) => error!("📧️ Email for order [{}] was sent, but could not be recorded. {e}", order.order_no),
    }
    true
}

/// Builds the event handlers that email buyers once their order is paid.
pub fn create_mail_event_handlers(
    db: SqliteDatabase,
    config: MailConfig,
    public_url: String,
) -> Result<EventHandlers, MailError> {
    let mailer = Mailer::from_config(&config)?;
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(move |ev| {
        let db = db.clone();
        let mailer = mailer.clone();
        let config = config.clone();
        let public_url = public_url.clone();
        Box::pin(async move {
            send_fulfilment_email(&db, &mailer, &config, &public_url, ev).await;
        })
    });
    Ok(EventHandlers::new(MAIL_EVENT_BUFFER_SIZE, hooks))
}
