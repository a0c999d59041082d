use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::staff_dto::{
    AssignmentResponse, CreateStaffPayload, CreateVenuePayload, StaffProfileResponse,
    UnassignAllResponse,
};
use crate::error::{Error, Result};
use crate::models::staff::{AssignmentStatus, Staff};
use crate::models::venue::Venue;
use crate::utils::crypto::hash_password;

/// Both sides must currently be unassigned.
pub fn check_assignable(staff: &Staff, venue: &Venue) -> Result<()> {
    if staff.assignment_status() == AssignmentStatus::Assigned {
        return Err(Error::Conflict(format!(
            "Staff {} is already assigned to a venue",
            staff.name
        )));
    }
    if venue.assignment_status() == AssignmentStatus::Assigned {
        return Err(Error::Conflict(format!(
            "Venue {} already has staff assigned",
            venue.name
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct StaffService {
    pool: PgPool,
}

impl StaffService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_staff(&self, payload: CreateStaffPayload) -> Result<Staff> {
        let password_hash = hash_password(&payload.password)?;
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "INSERT INTO staff (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            Staff::COLUMNS
        ))
        .bind(payload.name.trim())
        .bind(payload.email.trim().to_lowercase())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(staff_id = %staff.id, "staff created");
        Ok(staff)
    }

    pub async fn list_staff(&self, status: Option<AssignmentStatus>) -> Result<Vec<Staff>> {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {} FROM staff WHERE ($1::text IS NULL OR status = $1) ORDER BY name",
            Staff::COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(staff)
    }

    pub async fn get_staff(&self, id: Uuid) -> Result<Staff> {
        sqlx::query_as::<_, Staff>(&format!("SELECT {} FROM staff WHERE id = $1", Staff::COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Staff not found".into()))
    }

    pub async fn create_venue(&self, payload: CreateVenuePayload) -> Result<Venue> {
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "INSERT INTO venues (name, capacity) VALUES ($1, $2) RETURNING {}",
            Venue::COLUMNS
        ))
        .bind(payload.name.trim())
        .bind(payload.capacity)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(venue_id = %venue.id, "venue created");
        Ok(venue)
    }

    pub async fn list_venues(&self, status: Option<AssignmentStatus>) -> Result<Vec<Venue>> {
        let venues = sqlx::query_as::<_, Venue>(&format!(
            "SELECT {} FROM venues WHERE ($1::text IS NULL OR status = $1) ORDER BY name",
            Venue::COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(venues)
    }

    pub async fn get_venue(&self, id: Uuid) -> Result<Venue> {
        sqlx::query_as::<_, Venue>(&format!("SELECT {} FROM venues WHERE id = $1", Venue::COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Venue not found".into()))
    }

    /// Pairs an unassigned staff member with an unassigned venue. Both rows
    /// are locked and flipped together, so neither side is left half-assigned.
    pub async fn assign(&self, staff_id: Uuid, venue_id: Uuid) -> Result<AssignmentResponse> {
        let mut tx = self.pool.begin().await?;

        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {} FROM staff WHERE id = $1 FOR UPDATE",
            Staff::COLUMNS
        ))
        .bind(staff_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Staff not found".into()))?;
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "SELECT {} FROM venues WHERE id = $1 FOR UPDATE",
            Venue::COLUMNS
        ))
        .bind(venue_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Venue not found".into()))?;

        check_assignable(&staff, &venue)?;

        let staff = sqlx::query_as::<_, Staff>(&format!(
            r#"
            UPDATE staff SET status = 'assigned', venue_id = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'unassigned'
            RETURNING {}
            "#,
            Staff::COLUMNS
        ))
        .bind(staff_id)
        .bind(venue_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::Conflict("Staff was assigned concurrently".into()))?;
        let venue = sqlx::query_as::<_, Venue>(&format!(
            r#"
            UPDATE venues SET status = 'assigned', updated_at = NOW()
            WHERE id = $1 AND status = 'unassigned'
            RETURNING {}
            "#,
            Venue::COLUMNS
        ))
        .bind(venue_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::Conflict("Venue was assigned concurrently".into()))?;

        tx.commit().await?;
        tracing::info!(staff_id = %staff_id, venue_id = %venue_id, "staff assigned to venue");
        Ok(AssignmentResponse {
            message: format!("{} assigned to {}", staff.name, venue.name),
            staff,
            venue,
        })
    }

    /// Releases the staff member and the venue they held.
    pub async fn unassign(&self, staff_id: Uuid) -> Result<AssignmentResponse> {
        let mut tx = self.pool.begin().await?;

        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {} FROM staff WHERE id = $1 FOR UPDATE",
            Staff::COLUMNS
        ))
        .bind(staff_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Staff not found".into()))?;

        let venue_id = staff
            .assigned_venue()
            .ok_or_else(|| Error::BadRequest("Staff is not assigned to any venue".into()))?;

        let staff = sqlx::query_as::<_, Staff>(&format!(
            r#"
            UPDATE staff SET status = 'unassigned', venue_id = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Staff::COLUMNS
        ))
        .bind(staff_id)
        .fetch_one(&mut *tx)
        .await?;
        let venue = sqlx::query_as::<_, Venue>(&format!(
            r#"
            UPDATE venues SET status = 'unassigned', updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Venue::COLUMNS
        ))
        .bind(venue_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Assigned venue no longer exists".into()))?;

        tx.commit().await?;
        tracing::info!(staff_id = %staff_id, venue_id = %venue_id, "staff unassigned");
        Ok(AssignmentResponse {
            message: format!("{} unassigned from {}", staff.name, venue.name),
            staff,
            venue,
        })
    }

    /// Resets every staff member and venue. Each reset is independent;
    /// a failed one is counted and the sweep carries on.
    pub async fn unassign_all(&self) -> Result<UnassignAllResponse> {
        let staff_ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM staff WHERE status = 'assigned' OR venue_id IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        let venue_ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM venues WHERE status = 'assigned'")
            .fetch_all(&self.pool)
            .await?;

        let mut report = UnassignAllResponse::default();

        for (id,) in staff_ids {
            let res = sqlx::query(
                "UPDATE staff SET status = 'unassigned', venue_id = NULL, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .execute(&self.pool)
            .await;
            match res {
                Ok(_) => report.staff_reset += 1,
                Err(err) => {
                    tracing::warn!(staff_id = %id, error = %err, "failed to reset staff");
                    report.failed += 1;
                }
            }
        }

        for (id,) in venue_ids {
            let res = sqlx::query("UPDATE venues SET status = 'unassigned', updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await;
            match res {
                Ok(_) => report.venues_reset += 1,
                Err(err) => {
                    tracing::warn!(venue_id = %id, error = %err, "failed to reset venue");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            staff_reset = report.staff_reset,
            venues_reset = report.venues_reset,
            failed = report.failed,
            "unassign-all finished"
        );
        Ok(report)
    }

    pub async fn profile(&self, staff_id: Uuid) -> Result<StaffProfileResponse> {
        let staff = self.get_staff(staff_id).await?;
        let venue = match staff.assigned_venue() {
            Some(venue_id) => Some(self.get_venue(venue_id).await?),
            None => None,
        };
        Ok(StaffProfileResponse { staff, venue })
    }

    /// The venue a staff caller operates on; unassigned staff cannot act.
    pub async fn require_venue(&self, staff_id: Uuid) -> Result<Uuid> {
        let staff = self.get_staff(staff_id).await?;
        staff
            .assigned_venue()
            .ok_or_else(|| Error::Forbidden("Staff is not assigned to a venue".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn staff(status: AssignmentStatus) -> Staff {
        Staff {
            id: Uuid::new_v4(),
            name: "Priya".into(),
            email: "priya@college.edu".into(),
            password_hash: String::new(),
            status: status.as_str().into(),
            venue_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn venue(status: AssignmentStatus) -> Venue {
        Venue {
            id: Uuid::new_v4(),
            name: "Lab 3".into(),
            capacity: 60,
            status: status.as_str().into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn both_sides_must_be_free() {
        use AssignmentStatus::*;
        assert!(check_assignable(&staff(Unassigned), &venue(Unassigned)).is_ok());
        assert!(matches!(
            check_assignable(&staff(Assigned), &venue(Unassigned)),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            check_assignable(&staff(Unassigned), &venue(Assigned)),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn unassigned_staff_has_no_venue_even_with_stale_reference() {
        let mut s = staff(AssignmentStatus::Unassigned);
        s.venue_id = Some(Uuid::new_v4());
        assert_eq!(s.assigned_venue(), None);
        s.status = "assigned".into();
        assert_eq!(s.assigned_venue(), s.venue_id);
    }
}
