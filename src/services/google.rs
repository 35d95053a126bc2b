use reqwest::Client;
use serde::Deserialize;

use crate::config::Config;

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Profile fields returned by Google's userinfo endpoint.
#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleOAuthService;

impl GoogleOAuthService {
    /// URL of the Google consent screen we send the browser to.
    pub fn authorize_url() -> Result<String, String> {
        let client_id = Config::google_client_id()
            .ok_or_else(|| "Google OAuth is not configured".to_string())?;

        let url = reqwest::Url::parse_with_params(
            AUTH_ENDPOINT,
            &[
                ("client_id", client_id.as_str()),
                ("redirect_uri", &Config::google_redirect_uri()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
            ],
        )
        .map_err(|e| e.to_string())?;

        Ok(url.to_string())
    }

    /// Exchanges the callback code for an access token, then fetches the
    /// user's profile.
    pub async fn fetch_profile(code: &str) -> Result<GoogleProfile, String> {
        let client_id = Config::google_client_id()
            .ok_or_else(|| "Google OAuth is not configured".to_string())?;
        let client_secret = Config::google_client_secret()
            .ok_or_else(|| "Google OAuth is not configured".to_string())?;

        let client = Client::new();

        let token: TokenResponse = client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", &Config::google_redirect_uri()),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        let profile: GoogleProfile = client
            .get(USERINFO_ENDPOINT)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        Ok(profile)
    }
}
