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
    CreateHelpRequestDto, HelpRequest, RateDto, Rating, RequestStatus, RespondDto, ResponseEntry,
    UpdateHelpRequestDto, UrgencyLevel, User,
};
use crate::utils::{
    is_blank, within, ApiError, ApiResponse, PageParams, Pagination, DESCRIPTION_MAX, FEEDBACK_MAX,
    RESPONSE_MESSAGE_MAX, TITLE_MAX,
};

use super::{iso, user_summaries};

const COLLECTION: &str = "help_requests";

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct RequestListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub urgency: Option<String>,
    pub location: Option<String>,
    pub query: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Conjunctive filter over the optional list parameters. Without an explicit
/// status the listing shows only requests still looking for help.
pub(crate) fn build_list_filter(q: &RequestListQuery) -> Document {
    let mut filter = Document::new();

    match &q.status {
        Some(status) => {
            filter.insert("status", status);
        }
        None => {
            filter.insert("status", doc! { "$in": ["Open", "In Progress"] });
        }
    }

    if let Some(category) = &q.category {
        filter.insert("category", category);
    }

    if let Some(urgency) = &q.urgency {
        filter.insert("urgency_level", urgency);
    }

    // Location lives on the request itself, so it filters in the query and
    // pagination totals stay consistent.
    if let Some(location) = &q.location {
        filter.insert("location", doc! { "$regex": location, "$options": "i" });
    }

    if let Some(text) = &q.query {
        let re = doc! { "$regex": text, "$options": "i" };
        filter.insert(
            "$or",
            vec![
                doc! { "title": re.clone() },
                doc! { "description": re.clone() },
                doc! { "required_skill": re },
            ],
        );
    }

    filter
}

fn request_json(
    req: &HelpRequest,
    users: &std::collections::HashMap<ObjectId, crate::models::UserSummary>,
) -> serde_json::Value {
    json!({
        "id": req.id.map(|id| id.to_hex()),
        "requester_id": req.requester_id.to_hex(),
        "requester": users.get(&req.requester_id),
        "title": req.title,
        "description": req.description,
        "required_skill": req.required_skill,
        "category": req.category,
        "urgency_level": req.urgency_level,
        "location": req.location,
        "preferred_timeline": req.preferred_timeline,
        "status": req.status,
        "responses": req.responses.iter().map(|r| json!({
            "user_id": r.user_id.to_hex(),
            "user": users.get(&r.user_id),
            "message": r.message,
            "responded_at": iso(r.responded_at),
        })).collect::<Vec<_>>(),
        "accepted_responder_id": req.accepted_responder_id.map(|id| id.to_hex()),
        "accepted_responder": req.accepted_responder_id.and_then(|id| users.get(&id)),
        "completed_at": req.completed_at.map(iso),
        "rating": req.rating,
        "created_at": iso(req.created_at),
        "updated_at": iso(req.updated_at),
    })
}

/// Every user referenced by a request: requester, responders, accepted
/// responder.
fn referenced_ids(requests: &[HelpRequest]) -> Vec<ObjectId> {
    let mut ids = Vec::new();
    for req in requests {
        ids.push(req.requester_id);
        ids.extend(req.responses.iter().map(|r| r.user_id));
        ids.extend(req.accepted_responder_id);
    }
    ids
}

fn parse_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request("Invalid request ID"))
}

#[openapi(tag = "Requests")]
#[post("/requests", data = "<dto>")]
pub async fn create_request(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateHelpRequestDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if is_blank(&dto.title)
        || is_blank(&dto.description)
        || is_blank(&dto.required_skill)
        || is_blank(&dto.category)
    {
        return Err(ApiError::bad_request("Please provide all required fields"));
    }
    if !within(&dto.title, TITLE_MAX) {
        return Err(ApiError::bad_request("Title must be at most 200 characters"));
    }
    if !within(&dto.description, DESCRIPTION_MAX) {
        return Err(ApiError::bad_request(
            "Description must be at most 2000 characters",
        ));
    }

    let now = DateTime::now();
    let request = HelpRequest {
        id: None,
        requester_id: auth.user_id,
        title: dto.title.trim().to_string(),
        description: dto.description.clone(),
        required_skill: dto.required_skill.trim().to_string(),
        category: dto.category.clone(),
        urgency_level: dto.urgency_level.unwrap_or(UrgencyLevel::Medium),
        location: dto
            .location
            .clone()
            .filter(|l| !is_blank(l))
            .unwrap_or_else(|| "Online".to_string()),
        preferred_timeline: dto.preferred_timeline.clone(),
        status: RequestStatus::Open,
        responses: vec![],
        accepted_responder_id: None,
        completed_at: None,
        rating: None,
        created_at: now,
        updated_at: now,
    };

    let result = db
        .collection::<HelpRequest>(COLLECTION)
        .insert_one(&request, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create help request: {}", e)))?;

    let id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Invalid inserted ID"))?;

    let created = HelpRequest {
        id: Some(id),
        ..request
    };
    let users = user_summaries(db, &[created.requester_id]).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Help request created successfully".to_string(),
        json!({ "request": request_json(&created, &users) }),
    )))
}

#[openapi(tag = "Requests")]
#[get("/requests?<query..>")]
pub async fn list_requests(
    db: &State<DbConn>,
    query: RequestListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let params = PageParams::new(query.page, query.limit, 10);
    let filter = build_list_filter(&query);

    let find_options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .skip(params.skip())
        .limit(params.limit)
        .build();

    let requests: Vec<HelpRequest> = db
        .collection::<HelpRequest>(COLLECTION)
        .find(filter.clone(), find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let total = db
        .collection::<HelpRequest>(COLLECTION)
        .count_documents(filter, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Count error: {}", e)))?;

    let users = user_summaries(db, &referenced_ids(&requests)).await?;
    let rendered: Vec<_> = requests.iter().map(|r| request_json(r, &users)).collect();

    Ok(Json(ApiResponse::success(json!({
        "requests": rendered,
        "pagination": Pagination::new(params, total),
    }))))
}

#[openapi(tag = "Requests")]
#[get("/requests/<id>")]
pub async fn get_request(
    db: &State<DbConn>,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = parse_id(&id)?;

    let request = db
        .collection::<HelpRequest>(COLLECTION)
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Help request not found"))?;

    let users = user_summaries(db, &referenced_ids(std::slice::from_ref(&request))).await?;

    Ok(Json(ApiResponse::success(json!({
        "request": request_json(&request, &users)
    }))))
}

#[openapi(tag = "Requests")]
#[get("/requests/user/my-requests")]
pub async fn my_requests(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let find_options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

    let requests: Vec<HelpRequest> = db
        .collection::<HelpRequest>(COLLECTION)
        .find(doc! { "requester_id": auth.user_id }, find_options)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    let users = user_summaries(db, &referenced_ids(&requests)).await?;
    let rendered: Vec<_> = requests.iter().map(|r| request_json(r, &users)).collect();

    Ok(Json(ApiResponse::success(json!({ "requests": rendered }))))
}

#[openapi(tag = "Requests")]
#[put("/requests/<id>", data = "<dto>")]
pub async fn update_request(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
    dto: Json<UpdateHelpRequestDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = parse_id(&id)?;
    let request: HelpRequest = load_owned(db, &object_id, &auth.user_id).await?;

    let mut update_doc = doc! { "updated_at": DateTime::now() };

    if let Some(ref title) = dto.title {
        if is_blank(title) || !within(title, TITLE_MAX) {
            return Err(ApiError::bad_request("Title must be at most 200 characters"));
        }
        update_doc.insert("title", title.trim());
    }
    if let Some(ref description) = dto.description {
        if is_blank(description) || !within(description, DESCRIPTION_MAX) {
            return Err(ApiError::bad_request(
                "Description must be at most 2000 characters",
            ));
        }
        update_doc.insert("description", description);
    }
    if let Some(urgency) = dto.urgency_level {
        update_doc.insert(
            "urgency_level",
            to_bson(&urgency).map_err(|e| ApiError::internal_error(e.to_string()))?,
        );
    }
    if let Some(ref location) = dto.location {
        update_doc.insert("location", location);
    }
    if let Some(ref timeline) = dto.preferred_timeline {
        update_doc.insert("preferred_timeline", timeline);
    }
    if let Some(status) = dto.status {
        request.ensure_can_transition(status)?;
        update_doc.insert(
            "status",
            to_bson(&status).map_err(|e| ApiError::internal_error(e.to_string()))?,
        );
        if status == RequestStatus::Completed {
            update_doc.insert("completed_at", DateTime::now());
        }
    }

    db.collection::<HelpRequest>(COLLECTION)
        .update_one(doc! { "_id": object_id }, doc! { "$set": update_doc }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to update help request: {}", e)))?;

    let updated = db
        .collection::<HelpRequest>(COLLECTION)
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Help request not found"))?;

    let users = user_summaries(db, &referenced_ids(std::slice::from_ref(&updated))).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Help request updated successfully".to_string(),
        json!({ "request": request_json(&updated, &users) }),
    )))
}

#[openapi(tag = "Requests")]
#[post("/requests/<id>/respond", data = "<dto>")]
pub async fn respond_to_request(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
    dto: Json<RespondDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if is_blank(&dto.message) {
        return Err(ApiError::bad_request("Response message is required"));
    }
    if !within(&dto.message, RESPONSE_MESSAGE_MAX) {
        return Err(ApiError::bad_request(
            "Response message must be at most 1000 characters",
        ));
    }

    let object_id = parse_id(&id)?;

    let request = db
        .collection::<HelpRequest>(COLLECTION)
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Help request not found"))?;

    request.ensure_can_respond(&auth.user_id)?;

    let entry = ResponseEntry {
        user_id: auth.user_id,
        message: dto.message.clone(),
        responded_at: DateTime::now(),
    };

    db.collection::<HelpRequest>(COLLECTION)
        .update_one(
            doc! { "_id": object_id },
            doc! {
                "$push": { "responses": to_bson(&entry).map_err(|e| ApiError::internal_error(e.to_string()))? },
                "$set": { "updated_at": DateTime::now() },
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to submit response: {}", e)))?;

    let updated = db
        .collection::<HelpRequest>(COLLECTION)
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Help request not found"))?;

    let users = user_summaries(db, &referenced_ids(std::slice::from_ref(&updated))).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Response submitted successfully".to_string(),
        json!({ "request": request_json(&updated, &users) }),
    )))
}

#[openapi(tag = "Requests")]
#[post("/requests/<id>/accept/<responder_id>")]
pub async fn accept_responder(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
    responder_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = parse_id(&id)?;
    let responder_id = ObjectId::parse_str(&responder_id)
        .map_err(|_| ApiError::bad_request("Invalid responder ID"))?;

    let request: HelpRequest = load_owned(db, &object_id, &auth.user_id).await?;
    request.ensure_can_accept()?;

    db.collection::<HelpRequest>(COLLECTION)
        .update_one(
            doc! { "_id": object_id },
            doc! {
                "$set": {
                    "accepted_responder_id": responder_id,
                    "status": "In Progress",
                    "updated_at": DateTime::now(),
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to accept responder: {}", e)))?;

    let updated = db
        .collection::<HelpRequest>(COLLECTION)
        .find_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Help request not found"))?;

    let users = user_summaries(db, &referenced_ids(std::slice::from_ref(&updated))).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Responder accepted successfully".to_string(),
        json!({ "request": request_json(&updated, &users) }),
    )))
}

#[openapi(tag = "Requests")]
#[post("/requests/<id>/rate", data = "<dto>")]
pub async fn rate_request(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
    dto: Json<RateDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if let Some(ref feedback) = dto.feedback {
        if !within(feedback, FEEDBACK_MAX) {
            return Err(ApiError::bad_request(
                "Feedback must be at most 500 characters",
            ));
        }
    }

    let object_id = parse_id(&id)?;
    let request: HelpRequest = load_owned(db, &object_id, &auth.user_id).await?;
    request.ensure_can_rate(dto.score)?;

    let rating = Rating {
        score: dto.score,
        feedback: dto.feedback.clone(),
    };

    db.collection::<HelpRequest>(COLLECTION)
        .update_one(
            doc! { "_id": object_id },
            doc! {
                "$set": {
                    "rating": to_bson(&rating).map_err(|e| ApiError::internal_error(e.to_string()))?,
                    "updated_at": DateTime::now(),
                }
            },
            None,
        )
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to submit rating: {}", e)))?;

    // Reputation accrues to the accepted responder as one atomic increment.
    if let Some(responder_id) = request.accepted_responder_id {
        db.collection::<User>("users")
            .update_one(
                doc! { "_id": responder_id },
                doc! {
                    "$inc": { "reputation_score": dto.score, "total_ratings": 1 },
                    "$set": { "updated_at": DateTime::now() },
                },
                None,
            )
            .await
            .map_err(|e| ApiError::internal_error(format!("Failed to update reputation: {}", e)))?;
    }

    Ok(Json(ApiResponse::success_with_message(
        "Rating submitted successfully".to_string(),
        json!({ "rating": rating }),
    )))
}

#[openapi(tag = "Requests")]
#[delete("/requests/<id>")]
pub async fn delete_request(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = parse_id(&id)?;
    let _request: HelpRequest = load_owned(db, &object_id, &auth.user_id).await?;

    db.collection::<HelpRequest>(COLLECTION)
        .delete_one(doc! { "_id": object_id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to delete help request: {}", e)))?;

    Ok(Json(ApiResponse::success(json!({
        "message": "Help request deleted successfully"
    }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> RequestListQuery {
        RequestListQuery {
            status: None,
            category: None,
            urgency: None,
            location: None,
            query: None,
            page: None,
            limit: None,
        }
    }

    #[test]
    fn default_filter_hides_finished_requests() {
        let filter = build_list_filter(&query());
        assert_eq!(
            filter.get_document("status").unwrap(),
            &doc! { "$in": ["Open", "In Progress"] }
        );
    }

    #[test]
    fn explicit_status_overrides_default() {
        let mut q = query();
        q.status = Some("Closed".to_string());
        let filter = build_list_filter(&q);
        assert_eq!(filter.get_str("status").unwrap(), "Closed");
    }

    #[test]
    fn filters_conjoin() {
        let mut q = query();
        q.category = Some("Academic Skills".to_string());
        q.urgency = Some("High".to_string());
        q.location = Some("pune".to_string());
        q.query = Some("calculus".to_string());

        let filter = build_list_filter(&q);
        assert_eq!(filter.get_str("category").unwrap(), "Academic Skills");
        assert_eq!(filter.get_str("urgency_level").unwrap(), "High");
        assert_eq!(
            filter.get_document("location").unwrap().get_str("$regex").unwrap(),
            "pune"
        );
        let or = filter.get_array("$or").unwrap();
        assert_eq!(or.len(), 3);
    }

    #[test]
    fn text_search_covers_title_description_and_skill() {
        let mut q = query();
        q.query = Some("math".to_string());
        let filter = build_list_filter(&q);
        let fields: Vec<&str> = filter
            .get_array("$or")
            .unwrap()
            .iter()
            .map(|b| b.as_document().unwrap().keys().next().unwrap().as_str())
            .collect();
        assert_eq!(fields, ["title", "description", "required_skill"]);
    }
}
