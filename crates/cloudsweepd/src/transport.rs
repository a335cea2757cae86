//! Log-backed notification transport
//!
//! Stands in until a mail relay binding exists: digests land in the log
//! stream, where the operator's log pipeline can pick them up.

use async_trait::async_trait;

use cloudsweep_engine::{NotifyError, NotifyTransport};

pub struct LogTransport;

#[async_trait]
impl NotifyTransport for LogTransport {
    async fn send(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        tracing::warn!(
            subject,
            to = %recipients.join(", "),
            "Operator notification:\n{body}"
        );
        Ok(())
    }
}
