use mongodb::bson::{doc, oid::ObjectId};
use serde::de::DeserializeOwned;

use crate::db::DbConn;
use crate::models::{HelpRequest, Skill};
use crate::utils::ApiError;

/// Resources that belong to exactly one user. Each entity names its own
/// owning field instead of the caller guessing between `user_id` and
/// `requester_id`.
pub trait Ownable {
    const COLLECTION: &'static str;

    fn owner_id(&self) -> ObjectId;
}

impl Ownable for Skill {
    const COLLECTION: &'static str = "skills";

    fn owner_id(&self) -> ObjectId {
        self.user_id
    }
}

impl Ownable for HelpRequest {
    const COLLECTION: &'static str = "help_requests";

    fn owner_id(&self) -> ObjectId {
        self.requester_id
    }
}

/// Loads a document and proves the caller owns it: 404 when absent,
/// 403 when owned by someone else.
pub async fn load_owned<T>(db: &DbConn, id: &ObjectId, caller: &ObjectId) -> Result<T, ApiError>
where
    T: Ownable + DeserializeOwned + Unpin + Send + Sync,
{
    let resource = db
        .collection::<T>(T::COLLECTION)
        .find_one(doc! { "_id": id }, None)
        .await
        .map_err(|e| ApiError::internal_error(format!("Database error: {}", e)))?
        .ok_or_else(|| ApiError::not_found("Resource not found"))?;

    if resource.owner_id() != *caller {
        return Err(ApiError::forbidden("Access denied"));
    }

    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RequestStatus, UrgencyLevel};
    use mongodb::bson::DateTime;

    #[test]
    fn entities_expose_their_owning_field() {
        let owner = ObjectId::new();
        let request = HelpRequest {
            id: Some(ObjectId::new()),
            requester_id: owner,
            title: "t".into(),
            description: "d".into(),
            required_skill: "s".into(),
            category: "Other".into(),
            urgency_level: UrgencyLevel::Low,
            location: "Online".into(),
            preferred_timeline: None,
            status: RequestStatus::Open,
            responses: vec![],
            accepted_responder_id: None,
            completed_at: None,
            rating: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        assert_eq!(request.owner_id(), owner);
        assert_eq!(HelpRequest::COLLECTION, "help_requests");
        assert_eq!(Skill::COLLECTION, "skills");
    }
}
