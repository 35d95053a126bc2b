use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            .merge(Env::prefixed("ROCKET_").split("_"))
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "sahyog-jwt-secret".to_string())
    }

    /// Token lifetime in seconds. Defaults to 7 days.
    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(604800)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017/sahyog".to_string())
    }

    /// Front-end origin the OAuth callback redirects back to.
    pub fn client_url() -> String {
        Self::figment()
            .extract_inner("client_url")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
    }

    pub fn google_client_id() -> Option<String> {
        Self::figment()
            .extract_inner("google_client_id")
            .ok()
    }

    pub fn google_client_secret() -> Option<String> {
        Self::figment()
            .extract_inner("google_client_secret")
            .ok()
    }

    pub fn google_redirect_uri() -> String {
        Self::figment()
            .extract_inner("google_redirect_uri")
            .unwrap_or_else(|_| "http://localhost:8000/api/auth/google/callback".to_string())
    }

    pub fn is_google_enabled() -> bool {
        Self::google_client_id().is_some()
            && Self::google_client_secret().is_some()
    }
}
