use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One set of physiological measurements taken for a patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VitalSigns {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub recorded_by: Uuid,
    pub blood_pressure_systolic: i32,
    pub blood_pressure_diastolic: i32,
    pub heart_rate: i32,
    /// Degrees Celsius, one decimal.
    pub temperature: f64,
    pub oxygen_saturation: i32,
    /// Kilograms.
    pub weight: Option<f64>,
    /// Centimetres.
    pub height: Option<f64>,
    pub notes: String,
    pub recorded_at: NaiveDateTime,
}

impl VitalSigns {
    pub fn blood_pressure(&self) -> String {
        format!(
            "{}/{}",
            self.blood_pressure_systolic, self.blood_pressure_diastolic
        )
    }
}
