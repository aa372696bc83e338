//! API endpoint handlers.
//!
//! Each module maps one resource onto the domain operations. Handlers
//! open a connection per request and pass the caller's `Actor` down.

pub mod alerts;
pub mod appointments;
pub mod dashboard;
pub mod health;
pub mod notifications;
pub mod profile;
pub mod records;
pub mod tasks;
pub mod users;
pub mod vitals;
