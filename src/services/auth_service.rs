use sqlx::PgPool;

use crate::dto::auth_dto::{LoginResponse, RegisterAdminPayload};
use crate::error::{Error, Result};
use crate::middleware::auth::Role;
use crate::models::admin::Admin;
use crate::models::staff::Staff;
use crate::models::student::Student;
use crate::utils::crypto::{hash_password, verify_password};
use crate::utils::token::TokenIssuer;

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    issuer: TokenIssuer,
}

impl AuthService {
    pub fn new(pool: PgPool, issuer: TokenIssuer) -> Self {
        Self { pool, issuer }
    }

    pub async fn register_admin(&self, payload: RegisterAdminPayload) -> Result<Admin> {
        let password_hash = hash_password(&payload.password)?;
        let admin = sqlx::query_as::<_, Admin>(&format!(
            "INSERT INTO admins (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            Admin::COLUMNS
        ))
        .bind(payload.name.trim())
        .bind(payload.email.trim().to_lowercase())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        tracing::info!(admin_id = %admin.id, "admin registered");
        Ok(admin)
    }

    pub async fn login_admin(&self, email: &str, password: &str) -> Result<LoginResponse<Admin>> {
        let admin = sqlx::query_as::<_, Admin>(&format!(
            "SELECT {} FROM admins WHERE email = $1",
            Admin::COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Admin not found".into()))?;

        self.check_password(password, &admin.password_hash)?;
        self.respond(admin.id, Role::Admin, admin)
    }

    pub async fn login_staff(&self, email: &str, password: &str) -> Result<LoginResponse<Staff>> {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {} FROM staff WHERE email = $1",
            Staff::COLUMNS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Staff not found".into()))?;

        self.check_password(password, &staff.password_hash)?;
        self.respond(staff.id, Role::Staff, staff)
    }

    pub async fn login_student(
        &self,
        reg_no: &str,
        password: &str,
    ) -> Result<LoginResponse<Student>> {
        let student = sqlx::query_as::<_, Student>(&format!(
            "SELECT {} FROM students WHERE reg_no = $1",
            Student::COLUMNS
        ))
        .bind(reg_no.trim())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Student not found".into()))?;

        self.check_password(password, &student.password_hash)?;
        self.respond(student.id, Role::Student, student)
    }

    fn check_password(&self, password: &str, hash: &str) -> Result<()> {
        if verify_password(password, hash)? {
            Ok(())
        } else {
            Err(Error::Unauthorized("Invalid credentials".into()))
        }
    }

    fn respond<T: serde::Serialize>(
        &self,
        id: uuid::Uuid,
        role: Role,
        profile: T,
    ) -> Result<LoginResponse<T>> {
        let issued = self.issuer.issue(id, role)?;
        tracing::info!(user = %id, role = %role, "login succeeded");
        Ok(LoginResponse {
            message: "Login successful".into(),
            token: issued.token,
            expires_at: issued.expires_at,
            profile,
        })
    }
}
