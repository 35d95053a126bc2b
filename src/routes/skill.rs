use mongodb::bson::{doc, oid::ObjectId, to_bson, DateTime, Document};
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket_okapi::openapi;
use serde_json::json;

use crate::db::DbConn;
use crate::guards::{load_owned, AuthGuard};
use crate::models::{
    Availability, CreateSkillDto, ExperienceLevel, Skill, SkillCategory, UpdateSkillDto, User,
};
use crate::utils::{
    is_blank, within, ApiError, ApiResponse, PageParams, Pagination, SKILL_DESCRIPTION_MAX,
};

use super::{iso, user_summaries};

const COLLECTION: &str = "skills";

fn parse_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid skill ID"))
}

fn skill_json(
    skill: &Skill,
    users: &std::collections::HashMap<ObjectId, crate::models::UserSummary>,
) -> serde_json::Value {
    json!({
        "id": skill.id.map(|id| id.to_hex()),
        "user_id": skill.user_id.to_hex(),
        "user": users.get(&skill.user_id),
        "skill_name": skill.skill_name,
        "category": skill.category,
        "description": skill.description,
        "experience_level": skill.experience_level,
        "years_of_experience": skill.years_of_experience,
        "available_for": skill.available_for,
        "rating": skill.rating,
        "total_reviews": skill.total_reviews,
        "is_active": skill.is_active,
        "created_at": iso(skill.created_at),
        "updated_at": iso(skill.updated_at),
    })
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct SkillSearchQuery {
    pub query: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub min_rating: Option<f64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Database-side part of the skill search. The owner-location filter cannot
/// go here because location lives on the user document.
pub(crate) fn build_search_filter(q: &SkillSearchQuery) -> Document {
    let mut filter = doc! { "is_active": true };

    if let Some(text) = &q.query {
        let re = doc! { "$regex": text, "$options": "i" };
        filter.insert(
            "$or",
            vec![doc! { "skill_name": re.clone() }, doc! { "description": re }],
        );
    }

    if let Some(category) = &q.category {
        filter.insert("category", category);
    }

    if let Some(min_rating) = q.min_rating {
        filter.insert("rating", doc! { "$gte": min_rating });
    }

    filter
}

#[openapi(tag = "Skills")]
#[get("/skills/categories")]
pub async fn get_categories() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(json!({
        "categories": SkillCategory::ALL
    })))
}

#[openapi(tag = "Skills")]
#[post("/skills", data = "<dto>")]
pub async fn create_skill(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateSkillDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if is_blank(&dto.skill_name) || is_blank(&dto.description) {
        return Err(ApiError::bad_request("Please provide all required fields"));
    }
    if !within(&dto.description, SKILL_DESCRIPTION_MAX) {
        return Err(ApiError::bad_request(
            "Description must be at most 500 characters",
        ));
    }
    if dto.years_of_experience.unwrap_or(0) < 0 {
        return Err(ApiError::bad_request("Years of experience cannot be negative"));
    }

    let now = DateTime::now();
    let skill = Skill {
        id: None,
        user_id: auth.user_id,
        skill_name: dto.skill_name.trim().to_string(),
        category: dto.category,
        description: dto.description.clone(),
        experience_level: dto.experience_level.unwrap_or(ExperienceLevel::Intermediate),
        years_of_experience: dto.years_of_experience.unwrap_or(0),
        available_for: dto.available_for.unwrap_or(Availability::Both),
        rating: 0.0,
        total_reviews: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let result = db
        .collection::<Skill>(COLLECTION)
        .insert_one(&skill, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create skill: {}", e)))?;

    let skill_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Invalid inserted ID"))?;

    // Back-reference on the owner. Not transactional with the insert; a
    // failure here leaves a skill without a back-reference.
    db.collection::<User>("users")
        .update_one(
            doc! { "_id": auth.user_id },
            doc! { "$push": { "skills_offered": skill_id }, "$set": { "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to link skill to user: {}", e)))?;

    let created = Skill {
        id: Some(skill_id),
        ..skill
    };
    let users = user_summaries(db, &[auth.user_id]).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Skill added successfully".to_string(),
        json!({ "skill": skill_json(&created, &users) }),
    )))
}

#[openapi(tag = "Skills")]
#[get("/skills/user/<user_id>")]
pub async fn get_user_skills(
    db: &State<DbConn>,
    user_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let owner_id =
        ObjectId::parse_str(&user_id).map_err(|_| ApiError::bad_request("Invalid user ID"))?;

    let find_options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

    let skills: Vec<Skill> = db
        .collection::<Skill>(COLLECTION)
        .find(doc! { "user_id": owner_id, "is_active": true }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let users = user_summaries(db, &[owner_id]).await?;
    let rendered: Vec<_> = skills.iter().map(|s| skill_json(s, &users)).collect();

    Ok(Json(ApiResponse::success(json!({ "skills": rendered }))))
}

#[openapi(tag = "Skills")]
#[get("/skills/search?<query..>")]
pub async fn search_skills(
    db: &State<DbConn>,
    query: SkillSearchQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let params = PageParams::new(query.page, query.limit, 20);
    let filter = build_search_filter(&query);

    let find_options = FindOptions::builder()
        .sort(doc! { "rating": -1, "created_at": -1 })
        .skip(params.skip())
        .limit(params.limit)
        .build();

    let skills: Vec<Skill> = db
        .collection::<Skill>(COLLECTION)
        .find(filter.clone(), find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let owner_ids: Vec<ObjectId> = skills.iter().map(|s| s.user_id).collect();
    let users = user_summaries(db, &owner_ids).await?;

    // Owner-location match happens after the page is fetched, so the totals
    // below count matches before this filter is applied.
    let rendered: Vec<_> = skills
        .iter()
        .filter(|s| match &query.location {
            Some(location) => users
                .get(&s.user_id)
                .map(|u| u.location.to_lowercase().contains(&location.to_lowercase()))
                .unwrap_or(false),
            None => true,
        })
        .map(|s| skill_json(s, &users))
        .collect();

    let total = db
        .collection::<Skill>(COLLECTION)
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(json!({
        "skills": rendered,
        "pagination": Pagination::new(params, total),
    }))))
}

#[openapi(tag = "Skills")]
#[put("/skills/<id>", data = "<dto>")]
pub async fn update_skill(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
    dto: Json<UpdateSkillDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = parse_id(&id)?;
    let _skill: Skill = load_owned(db, &object_id, &auth.user_id).await?;

    let mut update_doc = doc! { "updated_at": DateTime::now() };

    if let Some(ref skill_name) = dto.skill_name {
        if is_blank(skill_name) {
            return Err(ApiError::bad_request("Skill name cannot be empty"));
        }
        update_doc.insert("skill_name", skill_name.trim());
    }
    if let Some(category) = dto.category {
        update_doc.insert(
            "category",
            to_bson(&category).map_err(|e| ApiError::internal_error(e.to_string()))?,
        );
    }
    if let Some(ref description) = dto.description {
        if is_blank(description) || !within(description, SKILL_DESCRIPTION_MAX) {
            return Err(ApiError::bad_request(
                "Description must be at most 500 characters",
            ));
        }
        update_doc.insert("description", description);
    }
    if let Some(level) = dto.experience_level {
        update_doc.insert(
            "experience_level",
            to_bson(&level).map_err(|e| ApiError::internal_error(e.to_string()))?,
        );
    }
    if let Some(years) = dto.years_of_experience {
        if years < 0 {
            return Err(ApiError::bad_request("Years of experience cannot be negative"));
        }
        update_doc.insert("years_of_experience", years);
    }
    if let Some(available_for) = dto.available_for {
        update_doc.insert(
            "available_for",
            to_bson(&available_for).map_err(|e| ApiError::internal_error(e.to_string()))?,
        );
    }

    db.collection::<Skill>(COLLECTION)
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update skill: {}", e)))?;

    let updated = db
        .collection::<Skill>(COLLECTION)
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Skill not found"))?;

    let users = user_summaries(db, &[updated.user_id]).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Skill updated successfully".to_string(),
        json!({ "skill": skill_json(&updated, &users) }),
    )))
}

#[openapi(tag = "Skills")]
#[delete("/skills/<id>")]
pub async fn delete_skill(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = parse_id(&id)?;
    let _skill: Skill = load_owned(db, &object_id, &auth.user_id).await?;

    // Soft delete - mark as inactive
    db.collection::<Skill>(COLLECTION)
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { "is_active": false, "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to delete skill: {}", e)))?;

    // Remove from the owner's skills_offered list
    db.collection::<User>("users")
        .update_one(
            doc! { "_id": auth.user_id },
            doc! { "$pull": { "skills_offered": object_id } },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to unlink skill: {}", e)))?;

    Ok(Json(ApiResponse::success(json!({
        "message": "Skill deleted successfully"
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SkillSearchQuery {
        SkillSearchQuery {
            query: None,
            category: None,
            location: None,
            min_rating: None,
            page: None,
            limit: None,
        }
    }

    #[test]
    fn search_always_excludes_inactive() {
        let filter = build_search_filter(&query());
        assert_eq!(filter.get_bool("is_active").unwrap(), true);
    }

    #[test]
    fn text_search_covers_name_and_description() {
        let mut q = query();
        q.query = Some("guitar".to_string());
        let filter = build_search_filter(&q);
        let fields: Vec<&str> = filter
            .get_array("$or")
            .unwrap()
            .iter()
            .map(|b| b.as_document().unwrap().keys().next().unwrap().as_str())
            .collect();
        assert_eq!(fields, ["skill_name", "description"]);
    }

    #[test]
    fn min_rating_becomes_gte_bound() {
        let mut q = query();
        q.min_rating = Some(3.5);
        let filter = build_search_filter(&q);
        assert_eq!(
            filter.get_document("rating").unwrap().get_f64("$gte").unwrap(),
            3.5
        );
    }

    #[test]
    fn location_is_not_a_database_predicate() {
        let mut q = query();
        q.location = Some("pune".to_string());
        let filter = build_search_filter(&q);
        assert!(!filter.contains_key("location"));
    }
}
