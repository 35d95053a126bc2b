pub mod auth;
pub mod request;
pub mod skill;
pub mod user;

use std::collections::HashMap;

use mongodb::bson::{doc, oid::ObjectId, DateTime};
use rocket::futures::TryStreamExt;

use crate::db::DbConn;
use crate::models::{User, UserSummary};
use crate::utils::ApiError;

/// The driver has no populate(), so listings join owner/responder info by
/// fetching the referenced users in one `$in` query.
pub(crate) async fn user_summaries(
    db: &DbConn,
    ids: &[ObjectId],
) -> Result<HashMap<ObjectId, UserSummary>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users: Vec<User> = db
        .collection::<User>("users")
        .find(doc! { "_id": { "$in": ids } }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .try_collect()
        .await
        .map_err(|e| ApiError::internal_error(format!("Collection error: {}", e)))?;

    Ok(users
        .iter()
        .filter_map(|u| u.id.map(|id| (id, UserSummary::from(u))))
        .collect())
}

pub(crate) fn iso(dt: DateTime) -> String {
    dt.try_to_rfc3339_string().unwrap_or_default()
}
