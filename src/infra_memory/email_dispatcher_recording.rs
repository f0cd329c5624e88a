use crate::domain_port::*;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub address: String,
    pub token: String,
}

/// Keeps every verification email in memory instead of sending it.
#[derive(Default)]
pub struct RecordingEmailDispatcher {
    sent: Mutex<Vec<SentEmail>>,
    failing: bool,
}

impl RecordingEmailDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher whose every send fails.
    pub fn failing() -> Self {
        RecordingEmailDispatcher {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn last_token_for(&self, address: &str) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|mail| mail.address == address)
            .map(|mail| mail.token.clone())
    }
}

#[async_trait::async_trait]
impl EmailDispatcher for RecordingEmailDispatcher {
    async fn send_verification(&self, address: &str, token: &str) -> Result<(), EmailError> {
        if self.failing {
            return Err(EmailError::Delivery("dispatcher configured to fail".into()));
        }
        self.sent.lock().await.push(SentEmail {
            address: address.to_string(),
            token: token.to_string(),
        });
        Ok(())
    }
}
