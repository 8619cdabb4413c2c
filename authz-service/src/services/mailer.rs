use async_trait::async_trait;
use chrono::Utc;
use redis::{aio::ConnectionManager, Client};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::config::RedisConfig;

/// Task type understood by the mail worker.
pub const EMAIL_TASK_TYPE: &str = "email:delayed";

/// Seconds the worker waits before processing an enqueued mail.
const PROCESS_DELAY_SECS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmailTemplate {
    #[serde(rename = "invitation-message.html")]
    Invitation,
}

impl EmailTemplate {
    pub fn file_name(&self) -> &'static str {
        match self {
            EmailTemplate::Invitation => "invitation-message.html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub template: EmailTemplate,
    pub to: String,
    pub subject: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct EmailTask<'a> {
    #[serde(rename = "type")]
    task_type: &'static str,
    process_at: i64,
    payload: &'a EmailPayload,
}

/// Outbound notification port. Delivery itself happens elsewhere.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn create_payload(
        &self,
        template: EmailTemplate,
        to: &str,
        subject: &str,
        data: serde_json::Value,
    ) -> EmailPayload {
        EmailPayload {
            template,
            to: to.to_string(),
            subject: subject.to_string(),
            data,
        }
    }

    async fn send(&self, payload: &EmailPayload) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Pushes mail tasks onto a Redis list consumed by the mail worker.
#[derive(Clone)]
pub struct RedisMailQueue {
    manager: ConnectionManager,
    queue: String,
}

impl RedisMailQueue {
    pub async fn new(config: &RedisConfig) -> Result<Self, AppError> {
        tracing::info!(url = %config.url, queue = %config.mail_queue, "Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        // ConnectionManager reconnects on its own
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            AppError::RedisError(e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            manager,
            queue: config.mail_queue.clone(),
        })
    }
}

#[async_trait]
impl Mailer for RedisMailQueue {
    async fn send(&self, payload: &EmailPayload) -> Result<(), AppError> {
        let task = EmailTask {
            task_type: EMAIL_TASK_TYPE,
            process_at: Utc::now().timestamp() + PROCESS_DELAY_SECS,
            payload,
        };
        let body = serde_json::to_string(&task).map_err(|e| {
            AppError::NotificationError(format!("Failed to serialize email task: {}", e))
        })?;

        let mut conn = self.manager.clone();
        redis::cmd("LPUSH")
            .arg(&self.queue)
            .arg(body)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, to = %payload.to, "Failed to enqueue email task");
                AppError::NotificationError(format!("Failed to enqueue email task: {}", e))
            })?;

        tracing::info!(
            to = %payload.to,
            template = payload.template.file_name(),
            "Email task enqueued"
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(AppError::RedisError)
    }
}

/// Records payloads instead of sending them.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<EmailPayload>>,
    fail: AtomicBool,
    block: AtomicBool,
    blocked: Notify,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `send` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make every following `send` hang until its caller is cancelled.
    pub fn block_sends(&self, block: bool) {
        self.block.store(block, Ordering::SeqCst);
    }

    /// Resolves once a `send` is hanging.
    pub async fn wait_until_blocked(&self) {
        self.blocked.notified().await;
    }

    pub fn sent(&self) -> Vec<EmailPayload> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, payload: &EmailPayload) -> Result<(), AppError> {
        if self.block.load(Ordering::SeqCst) {
            self.blocked.notify_one();
            std::future::pending::<()>().await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::NotificationError(
                "mail queue unavailable".to_string(),
            ));
        }

        self.sent
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?
            .push(payload.clone());
        Ok(())
    }
}
