pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    attendance_service::AttendanceService, auth_service::AuthService,
    leaderboard_service::LeaderboardService, module_service::ModuleService,
    notification_service::NotificationService, score_service::ScoreService,
    staff_service::StaffService, student_service::StudentService,
};
use crate::utils::token::TokenIssuer;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub issuer: TokenIssuer,
    pub auth_service: AuthService,
    pub student_service: StudentService,
    pub module_service: ModuleService,
    pub staff_service: StaffService,
    pub attendance_service: AttendanceService,
    pub score_service: ScoreService,
    pub leaderboard_service: LeaderboardService,
    pub notification_service: NotificationService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Result<Self> {
        let issuer = TokenIssuer::from_config(&config);
        let notification_service = NotificationService::new(&config)?;

        Ok(Self {
            auth_service: AuthService::new(pool.clone(), issuer.clone()),
            student_service: StudentService::new(pool.clone()),
            module_service: ModuleService::new(pool.clone()),
            staff_service: StaffService::new(pool.clone()),
            attendance_service: AttendanceService::new(pool.clone()),
            score_service: ScoreService::new(pool.clone()),
            leaderboard_service: LeaderboardService::new(pool.clone()),
            notification_service,
            issuer,
            config: Arc::new(config),
            pool,
        })
    }
}
