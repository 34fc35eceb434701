//! Detached delivery of notifications and emails.
//!
//! Services enqueue outbound work only after their state change has
//! committed. A single worker drains the queue in order and retries failed
//! deliveries with exponential backoff. Nothing here reports back to the
//! service that enqueued the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use tender_core::config::DispatchConfig;
use tender_core::notify::{
    EmailGateway, EmailMessage, GatewayError, Notification, NotificationGateway,
};

const MAX_BACKOFF_MS: u64 = 30_000;

#[derive(Debug)]
pub enum OutboundTask {
    Notify(Notification),
    Email(EmailMessage),
    /// Acknowledged once every task queued before it has been handled.
    Flush(oneshot::Sender<()>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay_ms: 200, max_delay_ms: MAX_BACKOFF_MS }
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay_ms = self.base_delay_ms.saturating_mul(1_u64 << exponent).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Handle services use to queue outbound work. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Outbox {
    sender: mpsc::Sender<OutboundTask>,
}

impl Outbox {
    pub fn notify(&self, notification: Notification) {
        self.enqueue(OutboundTask::Notify(notification));
    }

    pub fn email(&self, message: EmailMessage) {
        self.enqueue(OutboundTask::Email(message));
    }

    fn enqueue(&self, task: OutboundTask) {
        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                warn!(
                    event_name = "rfq.dispatch.queue_full",
                    task = task_label(&task),
                    "outbound queue is full; dropping task"
                );
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                warn!(
                    event_name = "rfq.dispatch.queue_closed",
                    task = task_label(&task),
                    "outbound worker has stopped; dropping task"
                );
            }
        }
    }

    /// Waits until everything enqueued before this call has been delivered or
    /// given up on. Returns immediately if the worker is gone.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(OutboundTask::Flush(ack)).await.is_err() {
            return;
        }
        let _ = done.await;
    }
}

fn task_label(task: &OutboundTask) -> &'static str {
    match task {
        OutboundTask::Notify(_) => "notification",
        OutboundTask::Email(EmailMessage::Invitations(_)) => "invitation_emails",
        OutboundTask::Email(EmailMessage::Winner(_)) => "winner_emails",
        OutboundTask::Flush(_) => "flush",
    }
}

pub struct Dispatcher {
    notifications: Arc<dyn NotificationGateway>,
    email: Arc<dyn EmailGateway>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationGateway>,
        email: Arc<dyn EmailGateway>,
        policy: RetryPolicy,
    ) -> Self {
        Self { notifications, email, policy }
    }

    /// Starts the worker. It stops once every [`Outbox`] clone is dropped and
    /// the queue is drained.
    pub fn spawn(self, queue_capacity: usize) -> (Outbox, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let handle = tokio::spawn(self.run(receiver));
        (Outbox { sender }, handle)
    }

    async fn run(self, mut receiver: mpsc::Receiver<OutboundTask>) {
        while let Some(task) = receiver.recv().await {
            match task {
                OutboundTask::Flush(ack) => {
                    let _ = ack.send(());
                }
                task => self.deliver(task).await,
            }
        }
        debug!(event_name = "rfq.dispatch.stopped", "outbound worker stopped");
    }

    async fn deliver(&self, task: OutboundTask) {
        let label = task_label(&task);
        let related = match &task {
            OutboundTask::Notify(notification) => notification.related_id.clone(),
            OutboundTask::Email(message) => message.request_id().0.clone(),
            OutboundTask::Flush(_) => return,
        };

        let mut attempt = 1;
        loop {
            let error = match self.attempt(&task).await {
                Ok(()) => return,
                Err(error) => error,
            };

            let retryable = matches!(error, GatewayError::Transport(_));
            if !retryable || attempt >= self.policy.max_attempts {
                error!(
                    event_name = "rfq.dispatch.failed",
                    task = label,
                    related_id = %related,
                    attempt,
                    error = %error,
                    "giving up on outbound delivery"
                );
                return;
            }

            warn!(
                event_name = "rfq.dispatch.retry",
                task = label,
                related_id = %related,
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %error,
                "outbound delivery failed; retrying"
            );
            let delay = self.policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn attempt(&self, task: &OutboundTask) -> Result<(), GatewayError> {
        match task {
            OutboundTask::Notify(notification) => self.notifications.create(notification).await,
            OutboundTask::Email(EmailMessage::Invitations(emails)) => {
                self.email.send_invitation_emails(emails).await
            }
            OutboundTask::Email(EmailMessage::Winner(emails)) => {
                self.email.send_winner_emails(emails).await
            }
            OutboundTask::Flush(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tender_core::notify::{Notification, NotificationType, RelatedType};

    use super::{Dispatcher, RetryPolicy};
    use crate::gateways::RecordingGateway;

    fn notification(user_id: &str) -> Notification {
        Notification {
            user_id: user_id.to_string(),
            kind: NotificationType::QuotationWinner,
            title: "Your quotation was selected".to_string(),
            message: "Selected".to_string(),
            related_id: "QTN-1".to_string(),
            related_type: RelatedType::Quotation,
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, base_delay_ms: 1, max_delay_ms: 5 }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy { max_attempts: 5, base_delay_ms: 100, max_delay_ms: 350 };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_delivered() {
        let gateway = Arc::new(RecordingGateway::failing_times(2));
        let (outbox, _worker) =
            Dispatcher::new(gateway.clone(), gateway.clone(), fast_policy(3)).spawn(8);

        outbox.notify(notification("SUP-1"));
        outbox.flush().await;

        assert_eq!(gateway.notifications().await, vec![notification("SUP-1")]);
        assert_eq!(gateway.attempts(), 3);
    }

    #[tokio::test]
    async fn delivery_gives_up_after_max_attempts() {
        let gateway = Arc::new(RecordingGateway::always_failing());
        let (outbox, _worker) =
            Dispatcher::new(gateway.clone(), gateway.clone(), fast_policy(2)).spawn(8);

        outbox.notify(notification("SUP-1"));
        outbox.notify(notification("SUP-2"));
        outbox.flush().await;

        assert!(gateway.notifications().await.is_empty());
        assert_eq!(gateway.attempts(), 4);
    }

    #[tokio::test]
    async fn worker_stops_when_every_outbox_is_dropped() {
        let gateway = Arc::new(RecordingGateway::default());
        let (outbox, worker) =
            Dispatcher::new(gateway.clone(), gateway.clone(), fast_policy(1)).spawn(8);

        outbox.notify(notification("SUP-1"));
        drop(outbox);

        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker finished")
            .expect("worker did not panic");
        assert_eq!(gateway.notifications().await.len(), 1);
    }
}
