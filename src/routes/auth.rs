use log::{error, info};
use mongodb::bson::{doc, DateTime};
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::json;

use crate::config::Config;
use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::User;
use crate::services::{GoogleOAuthService, JwtService};
use crate::utils::{ApiError, ApiResponse};

use super::user::{active_skills, find_user, profile_json};

fn login_failed() -> Redirect {
    Redirect::to(format!("{}/login?error=auth_failed", Config::client_url()))
}

/// Kicks off the OAuth handshake by sending the browser to Google's
/// consent screen.
#[get("/auth/google")]
pub async fn google_login() -> Redirect {
    match GoogleOAuthService::authorize_url() {
        Ok(url) => Redirect::to(url),
        Err(e) => {
            error!("Google OAuth not available: {}", e);
            login_failed()
        }
    }
}

/// Finds the user for this Google account, creating one on first login.
async fn upsert_user(
    db: &DbConn,
    profile: &crate::services::google::GoogleProfile,
) -> Result<User, String> {
    if !crate::utils::validate_email(&profile.email) {
        return Err(format!("Invalid email from Google: {}", profile.email));
    }

    let users = db.collection::<User>("users");

    let existing = users
        .find_one(doc! { "google_id": &profile.id }, None)
        .await
        .map_err(|e| e.to_string())?;

    if let Some(user) = existing {
        // Keep name and picture fresh on every login
        users
            .update_one(
                doc! { "_id": user.id },
                doc! { "$set": {
                    "full_name": &profile.name,
                    "profile_picture": &profile.picture,
                    "updated_at": DateTime::now(),
                }},
                None,
            )
            .await
            .map_err(|e| e.to_string())?;
        return Ok(user);
    }

    let now = DateTime::now();
    let user = User {
        id: None,
        google_id: profile.id.clone(),
        email: profile.email.to_lowercase(),
        full_name: profile.name.clone(),
        profile_picture: profile.picture.clone(),
        bio: String::new(),
        location: String::new(),
        languages: vec![],
        skills_offered: vec![],
        reputation_score: 0,
        total_ratings: 0,
        member_since: now,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let result = users.insert_one(&user, None).await.map_err(|e| e.to_string())?;
    let id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| "Invalid inserted ID".to_string())?;

    info!("New user registered: {}", user.email);
    Ok(User {
        id: Some(id),
        ..user
    })
}

#[get("/auth/google/callback?<code>")]
pub async fn google_callback(db: &State<DbConn>, code: Option<String>) -> Redirect {
    // Google redirects back without a code when the user denies consent
    let Some(code) = code else {
        return login_failed();
    };

    let profile = match GoogleOAuthService::fetch_profile(&code).await {
        Ok(profile) => profile,
        Err(e) => {
            error!("Google code exchange failed: {}", e);
            return login_failed();
        }
    };

    let user = match upsert_user(db, &profile).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to upsert user: {}", e);
            return login_failed();
        }
    };

    let Some(user_id) = user.id else {
        return login_failed();
    };

    match JwtService::generate_token(&user_id, &user.email) {
        Ok(token) => Redirect::to(format!(
            "{}/auth/callback?token={}",
            Config::client_url(),
            token
        )),
        Err(e) => {
            error!("Failed to issue token: {}", e);
            login_failed()
        }
    }
}

#[get("/auth/current")]
pub async fn current_user(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user = find_user(db, &auth.user_id).await?;
    let skills = active_skills(db, &auth.user_id).await?;

    Ok(Json(ApiResponse::success(json!({
        "user": profile_json(user, &skills)
    }))))
}

/// Tokens are stateless; logout just acknowledges so clients can drop
/// theirs.
#[get("/auth/logout")]
pub async fn logout() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success_with_message(
        "Logged out successfully".to_string(),
        json!({}),
    ))
}
