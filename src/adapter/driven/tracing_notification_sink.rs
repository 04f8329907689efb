use crate::domain::port::{Notification, NotificationError, NotificationSink};
use async_trait::async_trait;
use tracing::info;

/// ログ出力による通知送信
/// メール送信などの外部配信を持たない環境で、通知内容を構造化ログとして残す
pub struct TracingNotificationSink;

impl TracingNotificationSink {
    /// 新しいログ通知送信を作成
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingNotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            target: "notification",
            tenant = %notification.tenant_id,
            category = %notification.category,
            reference = %notification.reference_id,
            subject = %notification.subject,
            body = %notification.body,
            "Notification dispatched"
        );
        Ok(())
    }
}
