use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::staff::{AssignmentStatus, Staff};
use crate::models::venue::Venue;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateStaffPayload {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateVenuePayload {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 1, max = 10000))]
    pub capacity: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<AssignmentStatus>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignStaffPayload {
    pub staff_id: Uuid,
    pub venue_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnassignStaffPayload {
    pub staff_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub message: String,
    pub staff: Staff,
    pub venue: Venue,
}

#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnassignAllResponse {
    pub staff_reset: usize,
    pub venues_reset: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffProfileResponse {
    pub staff: Staff,
    pub venue: Option<Venue>,
}
