pub mod attendance_service;
pub mod auth_service;
pub mod export_service;
pub mod import_service;
pub mod leaderboard_service;
pub mod module_service;
pub mod notification_service;
pub mod reconciliation;
pub mod score_service;
pub mod staff_service;
pub mod student_service;
