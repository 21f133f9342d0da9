use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::catalogue::error::CatalogueError;

/// Source of bearer tokens for catalogue downloads.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self) -> Result<String, CatalogueError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Password-grant exchange against an OpenID token endpoint.
pub fn authenticate(
    http: &Client,
    auth_url: &str,
    client_id: &str,
    username: &str,
    password: &str,
) -> Result<String, CatalogueError> {
    let response = http
        .post(auth_url)
        .form(&[
            ("client_id", client_id),
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ])
        .send()?;

    let status = response.status();
    if status != StatusCode::OK {
        let body = response.text().unwrap_or_default();
        return Err(CatalogueError::Auth {
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = response.json()?;
    Ok(token.access_token)
}

pub struct PasswordAuthenticator {
    http: Client,
    auth_url: String,
    client_id: String,
    username: String,
    password: String,
}

impl PasswordAuthenticator {
    pub fn new(
        http: Client,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            http,
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Authenticator for PasswordAuthenticator {
    fn authenticate(&self) -> Result<String, CatalogueError> {
        log::debug!("Requesting token from {} as {}", self.auth_url, self.username);
        authenticate(
            &self.http,
            &self.auth_url,
            &self.client_id,
            &self.username,
            &self.password,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::testing::{blocking_client, MockCatalogue};
    use std::sync::atomic::Ordering;

    #[tokio::test(flavor = "multi_thread")]
    async fn exchanges_password_for_token() {
        let mock = MockCatalogue::default().spawn().await;
        let auth_url = mock.url("/auth");
        let state = mock.state.clone();

        let token = tokio::task::spawn_blocking(move || {
            authenticate(&blocking_client(), &auth_url, "cdse-public", "user", "pass")
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(token, "token-1");
        assert_eq!(state.auth_calls.load(Ordering::SeqCst), 1);
        let form = state.last_auth_form.lock().unwrap().clone().unwrap();
        assert_eq!(form.get("grant_type").map(String::as_str), Some("password"));
        assert_eq!(form.get("client_id").map(String::as_str), Some("cdse-public"));
        assert_eq!(form.get("username").map(String::as_str), Some("user"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_credentials_carry_status_and_body() {
        let mock = MockCatalogue {
            auth_status: 401,
            ..Default::default()
        }
        .spawn()
        .await;
        let auth_url = mock.url("/auth");

        let err = tokio::task::spawn_blocking(move || {
            PasswordAuthenticator::new(blocking_client(), auth_url, "cdse-public", "u", "p")
                .authenticate()
        })
        .await
        .unwrap()
        .unwrap_err();

        match err {
            CatalogueError::Auth { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_grant"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
