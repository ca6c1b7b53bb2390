use async_trait::async_trait;

use super::{MessageArg, SmsError, SmsSender};

/// Development sender: logs messages instead of delivering them.
#[derive(Debug, Default, Clone)]
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send(
        &self,
        recipient: &str,
        template_id: &str,
        args: &[MessageArg],
    ) -> Result<(), SmsError> {
        let args: Vec<String> = args
            .iter()
            .map(|arg| format!("{}={}", arg.name, arg.value))
            .collect();
        tracing::info!(recipient, template_id, args = ?args, "sms not delivered (log sender)");
        Ok(())
    }
}
