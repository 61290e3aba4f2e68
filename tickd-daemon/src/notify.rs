//! Notification dispatch
//!
//! Fans a completed run out to the job's configured channels. Channels
//! are independent and delivered concurrently; the dispatcher waits for
//! every delivery attempt before returning so completion logging reflects
//! them. Delivery errors are logged and otherwise ignored; they never
//! alter the run record or block other jobs.

use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use tickd_core::{ChatTarget, JobDefinition, NotifyMode, RunRecord, WebhookTarget};

/// Dispatches completion notifications over a shared HTTP client
pub struct Notifier {
    client: Client,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Delivers a summary of `record` to every channel configured on the
    /// job, honoring its notify mode. Returns once all attempts finish.
    pub async fn notify(&self, job: &JobDefinition, record: &RunRecord) {
        let Some(settings) = &job.notify else { return };

        if settings.mode == NotifyMode::Error && record.success {
            return;
        }

        let message = summary(job, record);
        info!("[{}] sending notifications", job.name);

        let mut deliveries = Vec::new();

        if let Some(webhook) = &settings.webhook {
            deliveries.push(tokio::spawn(post_webhook(
                self.client.clone(),
                webhook.clone(),
                job.name.clone(),
                record.clone(),
                message.clone(),
            )));
        }

        if let Some(chat) = &settings.chat {
            deliveries.push(tokio::spawn(post_chat(
                self.client.clone(),
                chat.clone(),
                job.name.clone(),
                message.clone(),
            )));
        }

        for delivery in deliveries {
            let _ = delivery.await;
        }

        info!("[{}] done sending notifications", job.name);
    }
}

/// Human-readable completion summary
fn summary(job: &JobDefinition, record: &RunRecord) -> String {
    if record.success {
        format!(
            "Job {:?} has finished. Duration: {:?}",
            job.name, record.duration
        )
    } else {
        format!(
            "Job {:?} has failed with status code: {}. Duration: {:?}",
            job.name, record.exit_status, record.duration
        )
    }
}

/// Posts a form-encoded payload to a webhook target
async fn post_webhook(
    client: Client,
    target: WebhookTarget,
    job_name: String,
    record: RunRecord,
    message: String,
) {
    let form = [
        ("job_name", job_name.clone()),
        ("duration", format!("{:?}", record.duration)),
        ("started_at", record.started_at.to_rfc3339()),
        ("success", record.success.to_string()),
        ("exit_status", record.exit_status.to_string()),
        ("message", message),
    ];

    match client.post(&target.url).form(&form).send().await {
        Ok(response) if response.status().is_success() => {
            info!("[{}] sent notification to webhook {}", job_name, target.url);
        }
        Ok(response) => warn!(
            "[{}] webhook {} answered {}",
            job_name,
            target.url,
            response.status()
        ),
        Err(err) => warn!("[{}] failed to send webhook: {}", job_name, err),
    }
}

/// Posts a JSON chat message to a chat target
async fn post_chat(client: Client, target: ChatTarget, job_name: String, message: String) {
    let payload = json!({
        "text": message,
        "username": target.username,
        "channel": target.channel,
    });

    match client.post(&target.url).json(&payload).send().await {
        Ok(response) if response.status().is_success() => {
            info!(
                "[{}] sent notification to chat channel {}",
                job_name, target.channel
            );
        }
        Ok(response) => warn!(
            "[{}] chat endpoint {} answered {}",
            job_name,
            target.url,
            response.status()
        ),
        Err(err) => warn!("[{}] failed to send chat notification: {}", job_name, err),
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
