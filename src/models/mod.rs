pub mod admin;
pub mod module;
pub mod progress;
pub mod staff;
pub mod student;
pub mod venue;
