use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::utils::ApiError;

/// Help-request lifecycle. `Completed` and `Closed` are terminal.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum RequestStatus {
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Closed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Closed)
    }

    /// Transitions a requester may perform through the update endpoint.
    /// Open → In Progress is reserved for responder acceptance.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Open, Closed) | (InProgress, Closed) | (InProgress, Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "Open",
            RequestStatus::InProgress => "In Progress",
            RequestStatus::Completed => "Completed",
            RequestStatus::Closed => "Closed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResponseEntry {
    pub user_id: ObjectId,
    pub message: String,
    pub responded_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Rating {
    pub score: i32,
    pub feedback: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HelpRequest {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub requester_id: ObjectId,
    pub title: String,
    pub description: String,
    pub required_skill: String,
    pub category: String,
    pub urgency_level: UrgencyLevel,
    pub location: String,
    pub preferred_timeline: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub responses: Vec<ResponseEntry>,
    pub accepted_responder_id: Option<ObjectId>,
    pub completed_at: Option<DateTime>,
    pub rating: Option<Rating>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl HelpRequest {
    /// Responses are accepted while the request is still live, at most one
    /// per user.
    pub fn ensure_can_respond(&self, user_id: &ObjectId) -> Result<(), ApiError> {
        if self.status.is_terminal() {
            return Err(ApiError::bad_request(
                "Cannot respond to a closed or completed request",
            ));
        }
        if self.responses.iter().any(|r| r.user_id == *user_id) {
            return Err(ApiError::conflict(
                "You have already responded to this request",
            ));
        }
        Ok(())
    }

    /// A responder can be accepted exactly once: acceptance moves the
    /// request out of Open, so a second attempt fails here.
    pub fn ensure_can_accept(&self) -> Result<(), ApiError> {
        if self.status != RequestStatus::Open {
            return Err(ApiError::bad_request(
                "Can only accept responders for open requests",
            ));
        }
        Ok(())
    }

    pub fn ensure_can_transition(&self, next: RequestStatus) -> Result<(), ApiError> {
        if !self.status.can_transition_to(next) {
            return Err(ApiError::bad_request(format!(
                "Cannot change status from {} to {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }

    pub fn ensure_can_rate(&self, score: i32) -> Result<(), ApiError> {
        if !(1..=5).contains(&score) {
            return Err(ApiError::bad_request("Rating score must be between 1 and 5"));
        }
        if self.status != RequestStatus::Completed {
            return Err(ApiError::bad_request("Can only rate completed requests"));
        }
        if self.rating.is_some() {
            return Err(ApiError::conflict("Request already rated"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateHelpRequestDto {
    pub title: String,
    pub description: String,
    pub required_skill: String,
    pub category: String,
    pub urgency_level: Option<UrgencyLevel>,
    pub location: Option<String>,
    pub preferred_timeline: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateHelpRequestDto {
    pub title: Option<String>,
    pub description: Option<String>,
    pub urgency_level: Option<UrgencyLevel>,
    pub location: Option<String>,
    pub preferred_timeline: Option<String>,
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RespondDto {
    pub message: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RateDto {
    pub score: i32,
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    fn sample(status: RequestStatus) -> HelpRequest {
        HelpRequest {
            id: Some(ObjectId::new()),
            requester_id: ObjectId::new(),
            title: "Need tutor".to_string(),
            description: "Weekly calculus help".to_string(),
            required_skill: "Math".to_string(),
            category: "Academic Skills".to_string(),
            urgency_level: UrgencyLevel::Medium,
            location: "Online".to_string(),
            preferred_timeline: None,
            status,
            responses: vec![],
            accepted_responder_id: None,
            completed_at: None,
            rating: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn status_serializes_with_space() {
        let json = serde_json::to_string(&RequestStatus::InProgress).unwrap();
        assert_eq!(json, r#""In Progress""#);
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        use RequestStatus::*;
        for from in [Completed, Closed] {
            for to in [Open, InProgress, Completed, Closed] {
                assert!(!from.can_transition_to(to), "{:?} -> {:?}", from, to);
            }
        }
    }

    #[test]
    fn legal_requester_transitions() {
        use RequestStatus::*;
        assert!(Open.can_transition_to(Closed));
        assert!(InProgress.can_transition_to(Closed));
        assert!(InProgress.can_transition_to(Completed));
        // Acceptance path only, not via status update
        assert!(!Open.can_transition_to(InProgress));
        assert!(!Open.can_transition_to(Completed));
    }

    #[test]
    fn respond_rejected_on_terminal_requests() {
        let user = ObjectId::new();
        for status in [RequestStatus::Completed, RequestStatus::Closed] {
            let err = sample(status).ensure_can_respond(&user).unwrap_err();
            assert_eq!(err.status, Status::BadRequest);
        }
    }

    #[test]
    fn second_response_from_same_user_conflicts() {
        let user = ObjectId::new();
        let mut req = sample(RequestStatus::Open);
        assert!(req.ensure_can_respond(&user).is_ok());

        req.responses.push(ResponseEntry {
            user_id: user,
            message: "I can help".to_string(),
            responded_at: DateTime::now(),
        });
        let err = req.ensure_can_respond(&user).unwrap_err();
        assert_eq!(err.status, Status::Conflict);

        // A different user may still respond
        assert!(req.ensure_can_respond(&ObjectId::new()).is_ok());
    }

    #[test]
    fn accept_requires_open_status() {
        assert!(sample(RequestStatus::Open).ensure_can_accept().is_ok());
        for status in [
            RequestStatus::InProgress,
            RequestStatus::Completed,
            RequestStatus::Closed,
        ] {
            let err = sample(status).ensure_can_accept().unwrap_err();
            assert_eq!(err.status, Status::BadRequest);
        }
    }

    #[test]
    fn rate_requires_completed_and_valid_score() {
        let err = sample(RequestStatus::Completed).ensure_can_rate(0).unwrap_err();
        assert_eq!(err.status, Status::BadRequest);
        let err = sample(RequestStatus::Completed).ensure_can_rate(6).unwrap_err();
        assert_eq!(err.status, Status::BadRequest);

        let err = sample(RequestStatus::InProgress).ensure_can_rate(5).unwrap_err();
        assert_eq!(err.status, Status::BadRequest);

        assert!(sample(RequestStatus::Completed).ensure_can_rate(5).is_ok());
    }

    #[test]
    fn rate_is_one_time() {
        let mut req = sample(RequestStatus::Completed);
        req.rating = Some(Rating {
            score: 4,
            feedback: None,
        });
        let err = req.ensure_can_rate(5).unwrap_err();
        assert_eq!(err.status, Status::Conflict);
    }
}
