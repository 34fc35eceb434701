//! Notification and email gateway adapters.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tera::{Context, Tera};
use tokio::sync::Mutex;
use tracing::info;

use tender_core::config::EmailConfig;
use tender_core::errors::ApplicationError;
use tender_core::notify::{
    EmailGateway, EmailMessage, GatewayError, InvitationEmails, Notification, NotificationGateway,
    WinnerEmails,
};
use tender_db::repositories::NotificationRepository;

const INVITATION_SUBJECT: &str = "Quotation requested: {{ title }}";
const INVITATION_BODY: &str = "You are invited to quote on \"{{ title }}\" \
(request {{ request_id }}). Please respond before {{ due_date }}.";
const INVITATION_REQUESTER_BODY: &str = "Invitations for \"{{ title }}\" were sent to \
{{ supplier_count }} supplier{% if supplier_count != 1 %}s{% endif %}. \
Responses are due by {{ due_date }}.";
const WINNER_SUBJECT: &str = "Supplier selected: {{ title }}";
const WINNER_SUPPLIER_BODY: &str = "Your quotation for \"{{ title }}\" was selected \
at {{ amount }} {{ currency }}.";
const WINNER_REQUESTER_BODY: &str = "Supplier {{ winner }} was selected for \"{{ title }}\" \
at {{ amount }} {{ currency }}.";

/// Writes notifications to the log only.
#[derive(Clone, Debug, Default)]
pub struct LogNotificationGateway;

#[async_trait]
impl NotificationGateway for LogNotificationGateway {
    async fn create(&self, notification: &Notification) -> Result<(), GatewayError> {
        info!(
            event_name = "rfq.notify.logged",
            user_id = %notification.user_id,
            kind = notification.kind.as_str(),
            related_id = %notification.related_id,
            related_type = notification.related_type.as_str(),
            "{}",
            notification.title
        );
        Ok(())
    }
}

/// Persists notifications to the `notification` table for in-app inboxes.
pub struct SqlNotificationGateway {
    repository: Arc<dyn NotificationRepository>,
}

impl SqlNotificationGateway {
    pub fn new(repository: Arc<dyn NotificationRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl NotificationGateway for SqlNotificationGateway {
    async fn create(&self, notification: &Notification) -> Result<(), GatewayError> {
        self.repository
            .append(notification)
            .await
            .map_err(|error| GatewayError::Transport(error.to_string()))
    }
}

/// Used when no email endpoint is configured.
#[derive(Clone, Debug, Default)]
pub struct LogEmailGateway;

#[async_trait]
impl EmailGateway for LogEmailGateway {
    async fn send_invitation_emails(&self, emails: &InvitationEmails) -> Result<(), GatewayError> {
        info!(
            event_name = "rfq.email.logged",
            request_id = %emails.request_id.0,
            kind = "invitations",
            suppliers = emails.supplier_ids.len(),
            requester_copy = emails.requester_email.is_some(),
            "invitation emails not sent: no email endpoint configured"
        );
        Ok(())
    }

    async fn send_winner_emails(&self, emails: &WinnerEmails) -> Result<(), GatewayError> {
        info!(
            event_name = "rfq.email.logged",
            request_id = %emails.request_id.0,
            kind = "winner",
            supplier_id = %emails.winner_supplier_id,
            requester_copy = emails.requester_email.is_some(),
            "winner emails not sent: no email endpoint configured"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedEmail {
    /// Either `supplier:<id>` for directory lookup downstream or a literal
    /// address.
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub struct EmailTemplates {
    tera: Tera,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("invitation_subject", INVITATION_SUBJECT),
            ("invitation_body", INVITATION_BODY),
            ("invitation_requester_body", INVITATION_REQUESTER_BODY),
            ("winner_subject", WINNER_SUBJECT),
            ("winner_supplier_body", WINNER_SUPPLIER_BODY),
            ("winner_requester_body", WINNER_REQUESTER_BODY),
        ])?;
        Ok(Self { tera })
    }

    fn render(&self, name: &str, context: &Context) -> Result<String, GatewayError> {
        self.tera
            .render(name, context)
            .map_err(|error| GatewayError::Rejected(format!("template `{name}`: {error}")))
    }

    pub fn render_invitations(
        &self,
        emails: &InvitationEmails,
    ) -> Result<Vec<RenderedEmail>, GatewayError> {
        let mut context = Context::new();
        context.insert("title", &emails.request.title);
        context.insert("request_id", &emails.request_id.0);
        context.insert("due_date", &emails.due_date.format("%Y-%m-%d").to_string());
        context.insert("supplier_count", &emails.supplier_ids.len());

        let subject = self.render("invitation_subject", &context)?;
        let body = self.render("invitation_body", &context)?;
        let mut rendered: Vec<RenderedEmail> = emails
            .supplier_ids
            .iter()
            .map(|supplier| RenderedEmail {
                to: format!("supplier:{supplier}"),
                subject: subject.clone(),
                body: body.clone(),
            })
            .collect();

        if let Some(requester) = &emails.requester_email {
            rendered.push(RenderedEmail {
                to: requester.clone(),
                subject,
                body: self.render("invitation_requester_body", &context)?,
            });
        }
        Ok(rendered)
    }

    pub fn render_winner(&self, emails: &WinnerEmails) -> Result<Vec<RenderedEmail>, GatewayError> {
        let mut context = Context::new();
        context.insert("title", &emails.request.title);
        context.insert("winner", &emails.winner_supplier_id.0);
        context.insert("amount", &emails.amount.to_string());
        context.insert("currency", emails.currency.as_str());

        let subject = self.render("winner_subject", &context)?;
        let mut rendered = vec![RenderedEmail {
            to: format!("supplier:{}", emails.winner_supplier_id),
            subject: subject.clone(),
            body: self.render("winner_supplier_body", &context)?,
        }];
        if let Some(requester) = &emails.requester_email {
            rendered.push(RenderedEmail {
                to: requester.clone(),
                subject,
                body: self.render("winner_requester_body", &context)?,
            });
        }
        Ok(rendered)
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    request_id: &'a str,
    message: &'a EmailMessage,
    emails: Vec<RenderedEmail>,
}

/// Posts rendered emails as JSON to a delivery webhook.
pub struct WebhookEmailGateway {
    client: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    templates: EmailTemplates,
}

impl WebhookEmailGateway {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        let templates = EmailTemplates::new()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Self { client, endpoint: endpoint.into(), api_key, templates })
    }

    async fn post(
        &self,
        message: EmailMessage,
        emails: Vec<RenderedEmail>,
    ) -> Result<(), GatewayError> {
        let payload =
            WebhookPayload { request_id: &message.request_id().0, message: &message, emails };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response =
            request.send().await.map_err(|error| GatewayError::Transport(error.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::Transport(format!("email webhook returned {status}")));
        }
        Err(GatewayError::Rejected(format!("email webhook returned {status}")))
    }
}

#[async_trait]
impl EmailGateway for WebhookEmailGateway {
    async fn send_invitation_emails(&self, emails: &InvitationEmails) -> Result<(), GatewayError> {
        let rendered = self.templates.render_invitations(emails)?;
        self.post(EmailMessage::Invitations(emails.clone()), rendered).await
    }

    async fn send_winner_emails(&self, emails: &WinnerEmails) -> Result<(), GatewayError> {
        let rendered = self.templates.render_winner(emails)?;
        self.post(EmailMessage::Winner(emails.clone()), rendered).await
    }
}

/// Picks the webhook gateway when an endpoint is configured, logging otherwise.
pub fn email_gateway_from_config(
    config: &EmailConfig,
) -> Result<Arc<dyn EmailGateway>, ApplicationError> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(WebhookEmailGateway::new(
            endpoint.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        None => Ok(Arc::new(LogEmailGateway)),
    }
}

/// In-process gateway that records deliveries. Can be told to fail a number
/// of times first, or always.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    notifications: Mutex<Vec<Notification>>,
    emails: Mutex<Vec<EmailMessage>>,
    attempts: AtomicU32,
    failures_left: AtomicU32,
    always_fail: bool,
}

impl RecordingGateway {
    pub fn failing_times(failures: u32) -> Self {
        Self { failures_left: AtomicU32::new(failures), ..Self::default() }
    }

    pub fn always_failing() -> Self {
        Self { always_fail: true, ..Self::default() }
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().await.clone()
    }

    pub async fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().await.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), GatewayError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.always_fail {
            return Err(GatewayError::Transport("recording gateway set to fail".to_string()));
        }
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(GatewayError::Transport("recording gateway transient failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn create(&self, notification: &Notification) -> Result<(), GatewayError> {
        self.check()?;
        self.notifications.lock().await.push(notification.clone());
        Ok(())
    }
}

#[async_trait]
impl EmailGateway for RecordingGateway {
    async fn send_invitation_emails(&self, emails: &InvitationEmails) -> Result<(), GatewayError> {
        self.check()?;
        self.emails.lock().await.push(EmailMessage::Invitations(emails.clone()));
        Ok(())
    }

    async fn send_winner_emails(&self, emails: &WinnerEmails) -> Result<(), GatewayError> {
        self.check()?;
        self.emails.lock().await.push(EmailMessage::Winner(emails.clone()));
        Ok(())
    }
}
