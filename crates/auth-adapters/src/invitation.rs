use async_trait::async_trait;
use domains::{InvitationNotice, InvitationNotifier, Result};
use tracing::info;

/// Delivers activation links to the log instead of a mail provider.
///
/// Suitable for development and single-tenant installs where an operator
/// forwards the link by hand.
pub struct LogInvitationNotifier {
    frontend_url: String,
}

impl LogInvitationNotifier {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn activation_url(&self, token: &str) -> String {
        format!("{}/confirm/{}", self.frontend_url, token)
    }
}

#[async_trait]
impl InvitationNotifier for LogInvitationNotifier {
    async fn notify(&self, notice: &InvitationNotice) -> Result<()> {
        info!(
            account_id = notice.account_id,
            username = %notice.username,
            email = %notice.email,
            activation_url = %self.activation_url(&notice.token),
            "invitation issued"
        );
        Ok(())
    }
}
