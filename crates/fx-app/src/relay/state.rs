use crate::relay::error::{ServerError, ServerResult};
use std::time::Duration;

pub struct RelayState {
    pub(crate) client: reqwest::Client,
    upstream_base: String,
}

impl RelayState {
    pub fn new(upstream_base: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            upstream_base: upstream_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// The relay only forwards to URLs under the configured upstream base.
    pub fn check_target(&self, url: &str) -> ServerResult<()> {
        let allowed = url
            .strip_prefix(&self.upstream_base)
            .is_some_and(|rest| rest.starts_with('/'));
        if allowed {
            Ok(())
        } else {
            Err(ServerError::BadRequest(format!(
                "target {url} is outside {}",
                self.upstream_base
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_target() {
        let state =
            RelayState::new("https://api.replicate.com/v1/", Duration::from_secs(5)).unwrap();

        assert!(
            state
                .check_target("https://api.replicate.com/v1/predictions/abc")
                .is_ok()
        );
        assert!(state.check_target("https://api.replicate.com/v1").is_err());
        assert!(
            state
                .check_target("https://api.replicate.com/v1.evil.net/x")
                .is_err()
        );
        assert!(state.check_target("http://169.254.169.254/latest").is_err());
    }
}
