use std::sync::Mutex;

use async_trait::async_trait;

use cloudsweep_engine::{NotifyError, NotifyTransport};

/// Captures outbound digests instead of delivering them.
#[derive(Default)]
pub struct MailSpool {
    messages: Mutex<Vec<(String, String)>>,
}

impl MailSpool {
    pub fn subjects(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(subject, _)| subject.clone())
            .collect()
    }

    #[allow(dead_code)]
    pub fn bodies(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl NotifyTransport for MailSpool {
    async fn send(
        &self,
        subject: &str,
        body: &str,
        _recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}
