use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub google_id: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub skills_offered: Vec<ObjectId>,
    #[serde(default)]
    pub reputation_score: i32,
    #[serde(default)]
    pub total_ratings: i32,
    pub member_since: DateTime,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Average of all ratings ever received, rounded to one decimal for
/// display. The average itself is never persisted.
pub fn average_rating(reputation_score: i32, total_ratings: i32) -> f64 {
    if total_ratings <= 0 {
        return 0.0;
    }
    (reputation_score as f64 / total_ratings as f64 * 10.0).round() / 10.0
}

impl User {
    pub fn average_rating(&self) -> f64 {
        average_rating(self.reputation_score, self.total_ratings)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateProfileDto {
    pub bio: Option<String>,
    pub location: Option<String>,
    pub languages: Option<Vec<String>>,
}

/// Everything a client may see about a user. Never carries `google_id`.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub profile_picture: String,
    pub bio: String,
    pub location: String,
    pub languages: Vec<String>,
    pub skills_offered: Vec<String>,
    pub reputation_score: i32,
    pub total_ratings: i32,
    pub average_rating: f64,
    pub member_since: DateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        let average_rating = user.average_rating();
        PublicUser {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            email: user.email,
            full_name: user.full_name,
            profile_picture: user.profile_picture,
            bio: user.bio,
            location: user.location,
            languages: user.languages,
            skills_offered: user.skills_offered.iter().map(|id| id.to_hex()).collect(),
            reputation_score: user.reputation_score,
            total_ratings: user.total_ratings,
            average_rating,
            member_since: user.member_since,
        }
    }
}

/// Compact owner/responder info joined into request and skill listings.
#[derive(Debug, Serialize, Clone)]
pub struct UserSummary {
    pub id: String,
    pub full_name: String,
    pub profile_picture: String,
    pub location: String,
    pub reputation_score: i32,
    pub average_rating: f64,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            full_name: user.full_name.clone(),
            profile_picture: user.profile_picture.clone(),
            location: user.location.clone(),
            reputation_score: user.reputation_score,
            average_rating: user.average_rating(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_zero_without_ratings() {
        assert_eq!(average_rating(0, 0), 0.0);
        assert_eq!(average_rating(12, 0), 0.0);
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        // 14 / 3 = 4.666...
        assert_eq!(average_rating(14, 3), 4.7);
        assert_eq!(average_rating(10, 4), 2.5);
        assert_eq!(average_rating(5, 1), 5.0);
    }
}
