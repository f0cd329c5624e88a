use crate::domain_port::*;
use crate::logger::*;

/// Development delivery: the verification link is written to the log.
pub struct ConsoleEmailDispatcher {
    base_url: String,
    enabled: bool,
}

impl ConsoleEmailDispatcher {
    pub fn new(base_url: impl Into<String>, enabled: bool) -> Self {
        ConsoleEmailDispatcher {
            base_url: base_url.into(),
            enabled,
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={}",
            self.base_url.trim_end_matches('/'),
            token
        )
    }
}

#[async_trait::async_trait]
impl EmailDispatcher for ConsoleEmailDispatcher {
    async fn send_verification(&self, address: &str, token: &str) -> Result<(), EmailError> {
        if !self.enabled {
            debug!(%address, "email delivery disabled, verification email dropped");
            return Ok(());
        }
        info!(
            %address,
            link = %self.verification_link(token),
            "verification email"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_joins_base_url_and_token() {
        let dispatcher = ConsoleEmailDispatcher::new("https://app.example.com/", true);
        assert_eq!(
            dispatcher.verification_link("abc"),
            "https://app.example.com/verify-email?token=abc"
        );
    }
}
