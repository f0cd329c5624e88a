#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

#[async_trait::async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send_verification(&self, address: &str, token: &str) -> Result<(), EmailError>;
}
