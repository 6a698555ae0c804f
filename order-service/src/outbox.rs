use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::notifications::{Dispatcher, NotificationJob};

/// Hands notification jobs to the background worker without waiting for
/// delivery.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<NotificationJob>,
}

impl NotificationQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn enqueue(&self, job: NotificationJob) {
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            error!(order_id = %job.order.id, "Notification worker has stopped, dropping job");
        }
    }
}

pub struct NotificationWorker {
    dispatcher: Dispatcher,
}

impl NotificationWorker {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Runs until every queue handle is dropped. Each job gets its own task.
    pub async fn run(&self, mut jobs: mpsc::UnboundedReceiver<NotificationJob>) {
        while let Some(job) = jobs.recv().await {
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                process_job(&dispatcher, job).await;
            });
        }
        info!("Notification queue closed, worker exiting");
    }
}

async fn process_job(dispatcher: &Dispatcher, job: NotificationJob) -> usize {
    let deliveries = dispatcher.dispatch(&job).await;
    let failed = deliveries.iter().filter(|d| !d.outcome.success()).count();
    if failed > 0 {
        warn!(
            order_id = %job.order.id,
            attempted = deliveries.len(),
            failed,
            "Some notifications were not delivered"
        );
    }
    deliveries.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusinessConfig;
    use crate::notifications::ChannelFlags;
    use crate::test_support::{sample_order, RecordingEmail, RecordingSms};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn enqueue_does_not_wait_for_delivery() {
        let (queue, mut jobs) = NotificationQueue::channel();
        queue.enqueue(NotificationJob::reminder(sample_order("ORD-1")));
        queue.enqueue(NotificationJob::reminder(sample_order("ORD-2")));

        assert_eq!(jobs.recv().await.map(|j| j.order.id), Some("ORD-1".to_string()));
        assert_eq!(jobs.recv().await.map(|j| j.order.id), Some("ORD-2".to_string()));
    }

    #[tokio::test]
    async fn enqueue_after_worker_stops_is_harmless() {
        let (queue, jobs) = NotificationQueue::channel();
        drop(jobs);
        queue.enqueue(NotificationJob::reminder(sample_order("ORD-1")));
    }

    #[tokio::test]
    async fn worker_delivers_queued_jobs() {
        let email = Arc::new(RecordingEmail::default());
        let sms = Arc::new(RecordingSms::default());
        let dispatcher = Dispatcher::new(
            email.clone(),
            sms.clone(),
            ChannelFlags { email: true, sms: false },
            BusinessConfig::sample(),
        );
        let (queue, jobs) = NotificationQueue::channel();
        queue.enqueue(NotificationJob::reminder(sample_order("ORD-1")));
        drop(queue);

        NotificationWorker::new(dispatcher).run(jobs).await;

        for _ in 0..50 {
            if !email.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(email.sent().len(), 1);
        assert!(sms.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_sends_are_counted_not_raised() {
        let dispatcher = Dispatcher::new(
            Arc::new(RecordingEmail::failing("boom")),
            Arc::new(RecordingSms::default()),
            ChannelFlags { email: true, sms: true },
            BusinessConfig::sample(),
        );
        let mut order = sample_order("ORD-1");
        order.notification_preference = shared::NotificationPreference::Both;

        let attempted = process_job(&dispatcher, NotificationJob::reminder(order)).await;
        assert_eq!(attempted, 2);
    }
}
