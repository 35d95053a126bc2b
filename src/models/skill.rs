use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

/// Closed category set shared by skills and help requests.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum SkillCategory {
    #[serde(rename = "Technical Skills")]
    Technical,
    #[serde(rename = "Creative Skills")]
    Creative,
    #[serde(rename = "Academic Skills")]
    Academic,
    #[serde(rename = "Life Skills")]
    Life,
    #[serde(rename = "Professional Skills")]
    Professional,
    #[serde(rename = "Craft & Trades")]
    CraftAndTrades,
    Other,
}

impl SkillCategory {
    pub const ALL: [&'static str; 7] = [
        "Technical Skills",
        "Creative Skills",
        "Academic Skills",
        "Life Skills",
        "Professional Skills",
        "Craft & Trades",
        "Other",
    ];
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum Availability {
    Online,
    #[serde(rename = "In-Person")]
    InPerson,
    Both,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Skill {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub skill_name: String,
    pub category: SkillCategory,
    pub description: String,
    pub experience_level: ExperienceLevel,
    pub years_of_experience: i32,
    pub available_for: Availability,
    // Display-only; nothing in the rating flow writes these yet.
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub total_reviews: i32,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSkillDto {
    pub skill_name: String,
    pub category: SkillCategory,
    pub description: String,
    pub experience_level: Option<ExperienceLevel>,
    pub years_of_experience: Option<i32>,
    pub available_for: Option<Availability>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateSkillDto {
    pub skill_name: Option<String>,
    pub category: Option<SkillCategory>,
    pub description: Option<String>,
    pub experience_level: Option<ExperienceLevel>,
    pub years_of_experience: Option<i32>,
    pub available_for: Option<Availability>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_serialize_to_display_names() {
        let json = serde_json::to_string(&SkillCategory::CraftAndTrades).unwrap();
        assert_eq!(json, r#""Craft & Trades""#);
        let json = serde_json::to_string(&SkillCategory::Other).unwrap();
        assert_eq!(json, r#""Other""#);
    }

    #[test]
    fn availability_round_trips_hyphenated_name() {
        let parsed: Availability = serde_json::from_str(r#""In-Person""#).unwrap();
        assert_eq!(parsed, Availability::InPerson);
    }

    #[test]
    fn all_lists_every_category() {
        assert_eq!(SkillCategory::ALL.len(), 7);
        for name in SkillCategory::ALL {
            let parsed: Result<SkillCategory, _> =
                serde_json::from_value(serde_json::Value::String(name.to_string()));
            assert!(parsed.is_ok(), "category {} should parse", name);
        }
    }
}
