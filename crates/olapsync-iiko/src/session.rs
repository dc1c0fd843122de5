//! Session lifecycle: authenticate once per run, revoke once at the end.

use std::fmt;

use crate::client::{truncate_body, IikoClient};
use crate::error::IikoError;

/// An authenticated iiko session token.
///
/// Not `Clone`: [`IikoClient::release`] consumes it, so a session can be
/// revoked at most once. `Debug` shows only a short prefix of the token.
pub struct Session {
    token: String,
}

impl Session {
    pub(crate) fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.token.chars().take(6).collect();
        f.debug_struct("Session")
            .field("token", &format!("{prefix}…"))
            .finish()
    }
}

/// Releases a session from `Drop` when [`IikoClient::with_session`] never
/// reached its own release: `work` panicked or the run was cancelled.
struct ReleaseOnDrop {
    client: IikoClient,
    token: Option<String>,
}

impl ReleaseOnDrop {
    fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let session = Session { token };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                tracing::warn!(?session, "session work aborted; releasing in background");
                handle.spawn(async move { client.release(session).await });
            }
            Err(_) => {
                tracing::warn!(?session, "session work aborted outside a runtime; not released");
            }
        }
    }
}

impl IikoClient {
    /// Authenticates and returns a fresh session.
    ///
    /// # Errors
    ///
    /// Returns [`IikoError::Auth`] on a network failure, a non-2xx status, or
    /// an empty token body.
    pub async fn acquire(&self) -> Result<Session, IikoError> {
        // Credentials travel in the query string; errors below drop the URL.
        let url = self.endpoint(
            "api/auth",
            &[("login", self.login()), ("pass", self.password())],
        )?;

        let response = self
            .http()
            .get(url)
            .timeout(self.auth_timeout())
            .send()
            .await
            .map_err(|e| IikoError::Auth(e.without_url().to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IikoError::Auth(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(IikoError::Auth(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_body(&body)
            )));
        }

        let token = body.trim().trim_matches('"').trim();
        if token.is_empty() {
            return Err(IikoError::Auth("empty token in response".to_string()));
        }

        let session = Session {
            token: token.to_string(),
        };
        tracing::info!(?session, "iiko session acquired");
        Ok(session)
    }

    /// Revokes `session`. Failures are logged and swallowed.
    pub async fn release(&self, session: Session) {
        let url = match self.endpoint("api/logout", &[("key", session.token())]) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(?session, error = %e, "iiko logout skipped");
                return;
            }
        };

        let result = self
            .http()
            .post(url)
            .timeout(self.logout_timeout())
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(?session, "iiko session released");
            }
            Ok(resp) => {
                tracing::warn!(?session, status = resp.status().as_u16(), "iiko logout rejected");
            }
            Err(e) => {
                let e = e.without_url();
                tracing::warn!(?session, error = %e, "iiko logout failed");
            }
        }
    }

    /// Runs `work` inside a session that is released on every exit path.
    ///
    /// Authentication failure short-circuits before `work` runs. Whatever
    /// `work` returns, the session is released exactly once before the
    /// result is handed back. If `work` panics or this future is dropped
    /// mid-run, the release is spawned onto the current runtime instead.
    ///
    /// # Errors
    ///
    /// Returns the authentication error converted into `E`, or the error
    /// returned by `work`.
    pub async fn with_session<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&Session) -> Result<T, E>,
        E: From<IikoError>,
    {
        let session = self.acquire().await?;
        let guard = ReleaseOnDrop {
            client: self.clone(),
            token: Some(session.token.clone()),
        };
        let result = work(&session).await;
        guard.disarm();
        self.release(session).await;
        result
    }
}
