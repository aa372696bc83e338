use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Shift;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub user_id: Uuid,
    pub specialization: String,
    pub license_number: Option<String>,
    pub years_of_experience: u32,
    /// Consultation fee in minor currency units.
    pub consultation_fee_cents: i64,
    pub available_days: String,
    pub available_time_start: NaiveTime,
    pub available_time_end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NurseProfile {
    pub user_id: Uuid,
    pub department: String,
    pub shift: Shift,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientProfile {
    pub user_id: Uuid,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub blood_group: String,
    pub allergies: String,
    pub medical_history: String,
}

/// The role-specific profile attached to a user. Admins carry none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleProfile {
    Doctor(DoctorProfile),
    Nurse(NurseProfile),
    Patient(PatientProfile),
    None,
}
