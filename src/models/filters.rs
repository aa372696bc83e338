use chrono::NaiveDate;
use uuid::Uuid;

use super::enums::{AppointmentStatus, Role, TaskStatus};

#[derive(Debug, Default, Clone)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub active_only: bool,
}

#[derive(Debug, Default, Clone)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
}

#[derive(Debug, Default, Clone)]
pub struct MedicalRecordFilter {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Default, Clone)]
pub struct VitalSignsFilter {
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    pub assigned_to: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
}

/// Offset pagination shared by all list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            limit: size,
            offset: number.saturating_sub(1).saturating_mul(size),
        }
    }

    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }

    pub fn unbounded() -> Self {
        Self {
            limit: u32::MAX,
            offset: 0,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, crate::config::PAGE_SIZE)
    }
}
