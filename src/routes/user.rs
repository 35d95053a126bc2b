use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket::futures::TryStreamExt;
use rocket_okapi::openapi;
use serde_json::json;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{HelpRequest, PublicUser, Skill, UpdateProfileDto, User};
use crate::utils::{within, ApiError, ApiResponse, PageParams, Pagination, BIO_MAX};

use super::iso;

fn parse_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid user ID"))
}

pub(crate) async fn find_user(db: &DbConn, id: &ObjectId) -> Result<User, ApiError> {
    db.collection::<User>("users")
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub(crate) async fn active_skills(db: &DbConn, owner: &ObjectId) -> Result<Vec<Skill>, ApiError> {
    db.collection::<Skill>("skills")
        .find(doc! { "user_id": owner, "is_active": true }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))
}

pub(crate) fn profile_json(user: User, skills: &[Skill]) -> serde_json::Value {
    let public = PublicUser::from(user);
    json!({
        "id": public.id,
        "email": public.email,
        "full_name": public.full_name,
        "profile_picture": public.profile_picture,
        "bio": public.bio,
        "location": public.location,
        "languages": public.languages,
        "skills_offered": skills.iter().map(|s| json!({
            "id": s.id.map(|id| id.to_hex()),
            "skill_name": s.skill_name,
            "category": s.category,
            "description": s.description,
            "experience_level": s.experience_level,
            "years_of_experience": s.years_of_experience,
            "available_for": s.available_for,
        })).collect::<Vec<_>>(),
        "reputation_score": public.reputation_score,
        "total_ratings": public.total_ratings,
        "average_rating": public.average_rating,
        "member_since": iso(public.member_since),
    })
}

#[openapi(tag = "Users")]
#[get("/users/profile/<id>")]
pub async fn get_profile(
    db: &State<DbConn>,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user_id = parse_id(&id)?;
    let user = find_user(db, &user_id).await?;
    let skills = active_skills(db, &user_id).await?;

    Ok(Json(ApiResponse::success(json!({
        "user": profile_json(user, &skills)
    }))))
}

#[openapi(tag = "Users")]
#[put("/users/profile", data = "<dto>")]
pub async fn update_profile(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<UpdateProfileDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if let Some(ref bio) = dto.bio {
        if !within(bio, BIO_MAX) {
            return Err(ApiError::bad_request("Bio must be at most 500 characters"));
        }
    }

    let mut update_doc = doc! { "updated_at": DateTime::now() };

    if let Some(ref bio) = dto.bio {
        update_doc.insert("bio", bio);
    }
    if let Some(ref location) = dto.location {
        update_doc.insert("location", location);
    }
    if let Some(ref languages) = dto.languages {
        update_doc.insert("languages", languages.clone());
    }

    db.collection::<User>("users")
        .update_one(
            doc! { "_id": auth.user_id },
            doc! { "$set": update_doc },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update profile: {}", e)))?;

    let user = find_user(db, &auth.user_id).await?;
    let skills = active_skills(db, &auth.user_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Profile updated successfully".to_string(),
        json!({ "user": profile_json(user, &skills) }),
    )))
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct UserSearchQuery {
    pub query: Option<String>,
    pub location: Option<String>,
    pub skill: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub(crate) fn build_search_filter(q: &UserSearchQuery) -> Document {
    let mut filter = doc! { "is_active": true };

    if let Some(text) = &q.query {
        let re = doc! { "$regex": text, "$options": "i" };
        filter.insert(
            "$or",
            vec![
                doc! { "full_name": re.clone() },
                doc! { "location": re.clone() },
                doc! { "bio": re },
            ],
        );
    }

    if let Some(location) = &q.location {
        filter.insert("location", doc! { "$regex": location, "$options": "i" });
    }

    filter
}

#[openapi(tag = "Users")]
#[get("/users/search?<query..>")]
pub async fn search_users(
    db: &State<DbConn>,
    query: UserSearchQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let params = PageParams::new(query.page, query.limit, 10);
    let filter = build_search_filter(&query);

    let find_options = FindOptions::builder()
        .sort(doc! { "reputation_score": -1 })
        .skip(params.skip())
        .limit(params.limit)
        .build();

    let users: Vec<User> = db
        .collection::<User>("users")
        .find(filter.clone(), find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    // Skill-name match runs over the fetched page, so totals count matches
    // before this filter.
    let mut rendered = Vec::new();
    for user in users {
        let Some(user_id) = user.id else { continue };
        let skills = active_skills(db, &user_id).await?;

        if let Some(ref wanted) = query.skill {
            let wanted = wanted.to_lowercase();
            if !skills
                .iter()
                .any(|s| s.skill_name.to_lowercase().contains(&wanted))
            {
                continue;
            }
        }

        rendered.push(profile_json(user, &skills));
    }

    let total = db
        .collection::<User>("users")
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(json!({
        "users": rendered,
        "pagination": Pagination::new(params, total),
    }))))
}

#[openapi(tag = "Users")]
#[get("/users/stats/<id>")]
pub async fn get_stats(
    db: &State<DbConn>,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let user_id = parse_id(&id)?;
    let user = find_user(db, &user_id).await?;

    let skills_offered = db
        .collection::<Skill>("skills")
        .count_documents(doc! { "user_id": user_id, "is_active": true }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    let requests_created = db
        .collection::<HelpRequest>("help_requests")
        .count_documents(doc! { "requester_id": user_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    let requests_helped = db
        .collection::<HelpRequest>("help_requests")
        .count_documents(
            doc! { "accepted_responder_id": user_id, "status": "Completed" },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    Ok(Json(ApiResponse::success(json!({
        "stats": {
            "skills_offered": skills_offered,
            "reputation_score": user.reputation_score,
            "average_rating": user.average_rating(),
            "requests_created": requests_created,
            "requests_helped": requests_helped,
            "member_since": iso(user.member_since),
        }
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> UserSearchQuery {
        UserSearchQuery {
            query: None,
            location: None,
            skill: None,
            page: None,
            limit: None,
        }
    }

    #[test]
    fn search_excludes_deactivated_users() {
        let filter = build_search_filter(&query());
        assert_eq!(filter.get_bool("is_active").unwrap(), true);
    }

    #[test]
    fn location_matches_case_insensitively() {
        let mut q = query();
        q.location = Some("Pune".to_string());
        let filter = build_search_filter(&q);
        let loc = filter.get_document("location").unwrap();
        assert_eq!(loc.get_str("$regex").unwrap(), "Pune");
        assert_eq!(loc.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn skill_filter_stays_out_of_the_query() {
        let mut q = query();
        q.skill = Some("guitar".to_string());
        let filter = build_search_filter(&q);
        assert!(!filter.contains_key("skill"));
        assert!(!filter.contains_key("$or"));
    }
}
