//! Instagram session client (private web API).
//!
//! A session is constructed offline with a generated device id, then
//! logged in once at startup; login failures are fatal to the daemon.
//! Photo posting is the two-step rupload + configure flow.

use postpilot_core::error::{PostPilotError, Result};
use serde::Deserialize;

const LOGIN_URL: &str = "https://www.instagram.com/api/v1/web/accounts/login/ajax/";
const UPLOAD_BASE: &str = "https://i.instagram.com/rupload_igphoto";
const CONFIGURE_URL: &str = "https://i.instagram.com/api/v1/media/configure/";
const USER_AGENT: &str = "Instagram 289.0.0.0 Android";

/// Reference to a published media item.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub media_id: String,
}

/// One Instagram account session.
///
/// Cookies issued at login live in the client's jar, so every later
/// request on the same session is authenticated.
pub struct InstagramSession {
    username: String,
    device_id: String,
    client: reqwest::Client,
    logged_in: bool,
}

impl InstagramSession {
    /// Build a session for `username`. No network traffic happens until
    /// [`login`](Self::login).
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        let device_id = generate_device_id();
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            username,
            device_id,
            client,
            logged_in: false,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Log in with the account password.
    pub async fn login(&mut self, password: &str) -> Result<()> {
        let form = [
            ("username", self.username.clone()),
            ("enc_password", encode_password(password)),
            ("device_id", self.device_id.clone()),
        ];

        let response = self
            .client
            .post(LOGIN_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| PostPilotError::Social(format!("login request failed: {e}")))?;

        let status = response.status();
        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| PostPilotError::Social(format!("invalid login response: {e}")))?;

        if !status.is_success() || !body.authenticated {
            return Err(PostPilotError::AuthFailed(self.username.clone()));
        }

        tracing::debug!("session open for {}", self.username);
        self.logged_in = true;
        Ok(())
    }

    /// Upload a photo and publish it with `caption`.
    pub async fn upload_photo(&self, image: Vec<u8>, caption: &str) -> Result<MediaRef> {
        let upload_id = uuid::Uuid::new_v4().simple().to_string();

        let response = self
            .client
            .post(format!("{UPLOAD_BASE}/{upload_id}"))
            .header("X-Entity-Name", format!("igphoto_{upload_id}"))
            .header("X-Entity-Length", image.len().to_string())
            .header("Offset", "0")
            .header("Content-Type", "application/octet-stream")
            .body(image)
            .send()
            .await
            .map_err(|e| PostPilotError::Social(format!("photo upload failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PostPilotError::Social(format!("upload {status}: {text}")));
        }

        let form = [
            ("upload_id", upload_id.as_str()),
            ("caption", caption),
            ("device_id", self.device_id.as_str()),
        ];

        let response = self
            .client
            .post(CONFIGURE_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| PostPilotError::Social(format!("media configure failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PostPilotError::Social(format!("configure {status}: {text}")));
        }

        let body: ConfigureResponse = response
            .json()
            .await
            .map_err(|e| PostPilotError::Social(format!("invalid configure response: {e}")))?;

        Ok(MediaRef {
            media_id: body.media.id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    authenticated: bool,
}

#[derive(Debug, Deserialize)]
struct ConfigureResponse {
    media: ConfiguredMedia,
}

#[derive(Debug, Deserialize)]
struct ConfiguredMedia {
    id: String,
}

/// The browser login endpoint wants passwords wrapped in this envelope.
fn encode_password(password: &str) -> String {
    format!("#PWD_INSTAGRAM_BROWSER:0:0:{password}")
}

fn generate_device_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("android-{}", &hex[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_builds_without_network() {
        let session = InstagramSession::new("A1");
        assert_eq!(session.username(), "A1");
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_device_id_shape() {
        let id = generate_device_id();
        assert!(id.starts_with("android-"));
        assert_eq!(id.len(), "android-".len() + 16);
    }

    #[test]
    fn test_password_envelope() {
        assert_eq!(
            encode_password("hunter2"),
            "#PWD_INSTAGRAM_BROWSER:0:0:hunter2"
        );
    }
}
