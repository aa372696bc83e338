//! Vital sign capture and listing.

use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{self, Actor, AuthorizationError, Operation, Resource, Scope};
use crate::db::{self, DatabaseError};
use crate::models::{Page, Role, VitalSigns, VitalSignsFilter};
use crate::validation::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct NewVitals {
    pub patient_id: Uuid,
    pub blood_pressure_systolic: i32,
    pub blood_pressure_diastolic: i32,
    pub heart_rate: i32,
    pub temperature: f64,
    pub oxygen_saturation: i32,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VitalsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

fn in_range<T: PartialOrd>(value: T, min: T, max: T) -> bool {
    value >= min && value <= max
}

fn validate(v: &mut ValidationError, input: &NewVitals) {
    let (sys, dia) = (input.blood_pressure_systolic, input.blood_pressure_diastolic);
    v.check(in_range(sys, 50, 300), "blood_pressure_systolic", "Must be between 50 and 300.");
    v.check(in_range(dia, 20, 200), "blood_pressure_diastolic", "Must be between 20 and 200.");
    v.check(dia < sys, "blood_pressure_diastolic", "Diastolic must be below systolic.");
    v.check(in_range(input.heart_rate, 20, 300), "heart_rate", "Must be between 20 and 300.");
    v.check(
        input.temperature.is_finite() && in_range(input.temperature, 25.0, 45.0),
        "temperature",
        "Must be between 25.0 and 45.0.",
    );
    v.check(
        in_range(input.oxygen_saturation, 50, 100),
        "oxygen_saturation",
        "Must be between 50 and 100.",
    );
    if let Some(w) = input.weight {
        v.check(w.is_finite() && in_range(w, 0.5, 500.0), "weight", "Must be between 0.5 and 500.");
    }
    if let Some(h) = input.height {
        v.check(h.is_finite() && in_range(h, 20.0, 300.0), "height", "Must be between 20 and 300.");
    }
}

/// Store one measurement set recorded by `actor`.
pub fn record_vitals(conn: &Connection, actor: &Actor, input: NewVitals) -> Result<VitalSigns, VitalsError> {
    authorization::authorize(actor.role, Operation::RecordVitals)?;

    let mut v = ValidationError::new();
    v.check(
        db::user_has_role(conn, &input.patient_id, &[Role::Patient])?,
        "patient_id",
        "Select a valid patient.",
    );
    validate(&mut v, &input);
    v.into_result()?;

    let vitals = VitalSigns {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        recorded_by: actor.user_id,
        blood_pressure_systolic: input.blood_pressure_systolic,
        blood_pressure_diastolic: input.blood_pressure_diastolic,
        heart_rate: input.heart_rate,
        temperature: (input.temperature * 10.0).round() / 10.0,
        oxygen_saturation: input.oxygen_saturation,
        weight: input.weight,
        height: input.height,
        notes: input.notes,
        recorded_at: db::now(),
    };
    db::insert_vital_signs(conn, &vitals)?;
    tracing::info!(patient_id = %vitals.patient_id, bp = %vitals.blood_pressure(), "Vital signs recorded");
    Ok(vitals)
}

/// Patients always get their own history; staff may narrow by patient.
pub fn list_vitals(
    conn: &Connection,
    actor: &Actor,
    patient_id: Option<Uuid>,
    page: Page,
) -> Result<Vec<VitalSigns>, VitalsError> {
    authorization::authorize(actor.role, Operation::ListVitals)?;
    let patient_id = match authorization::list_scope(actor.role, Resource::Vitals) {
        Scope::OwnAsPatient => Some(actor.user_id),
        Scope::All => patient_id,
        _ => return Ok(Vec::new()),
    };
    Ok(db::list_vital_signs(conn, &VitalSignsFilter { patient_id }, page)?)
}

pub fn latest_for_patient(
    conn: &Connection,
    actor: &Actor,
    patient_id: &Uuid,
) -> Result<Option<VitalSigns>, VitalsError> {
    authorization::authorize(actor.role, Operation::ListVitals)?;
    let latest = db::latest_vital_signs(conn, patient_id)?;
    if let Some(vitals) = &latest {
        authorization::check_vitals_access(actor, vitals).require("vital signs")?;
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{create_user, new_user};
    use crate::db::open_memory_database;

    fn actor(conn: &Connection, name: &str, role: Role) -> Actor {
        let user = create_user(conn, new_user(name, role)).unwrap();
        Actor::new(user.id, role)
    }

    fn normal(patient: Uuid) -> NewVitals {
        NewVitals {
            patient_id: patient,
            blood_pressure_systolic: 120,
            blood_pressure_diastolic: 80,
            heart_rate: 72,
            temperature: 36.64,
            oxygen_saturation: 98,
            weight: Some(70.5),
            height: None,
            notes: String::new(),
        }
    }

    #[test]
    fn nurse_records_and_temperature_is_rounded() {
        let conn = open_memory_database().unwrap();
        let nurse = actor(&conn, "n", Role::Nurse);
        let patient = actor(&conn, "p", Role::Patient);
        let v = record_vitals(&conn, &nurse, normal(patient.user_id)).unwrap();
        assert_eq!(v.recorded_by, nurse.user_id);
        assert_eq!(v.temperature, 36.6);
        assert_eq!(v.blood_pressure(), "120/80");
    }

    #[test]
    fn patients_and_admins_cannot_record() {
        let conn = open_memory_database().unwrap();
        let admin = actor(&conn, "a", Role::SuperAdmin);
        let patient = actor(&conn, "p", Role::Patient);
        for who in [&admin, &patient] {
            assert!(matches!(
                record_vitals(&conn, who, normal(patient.user_id)),
                Err(VitalsError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn implausible_values_are_rejected() {
        let conn = open_memory_database().unwrap();
        let doctor = actor(&conn, "d", Role::Doctor);
        let patient = actor(&conn, "p", Role::Patient);
        let mut input = normal(patient.user_id);
        input.blood_pressure_diastolic = 130;
        input.temperature = 51.0;
        input.height = Some(5.0);
        match record_vitals(&conn, &doctor, input) {
            Err(VitalsError::Validation(v)) => {
                let fields: Vec<_> = v.fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(fields, vec!["blood_pressure_diastolic", "temperature", "height"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(matches!(
            record_vitals(&conn, &doctor, normal(doctor.user_id)),
            Err(VitalsError::Validation(_))
        ));
    }

    #[test]
    fn patient_listing_is_scoped_to_self() {
        let conn = open_memory_database().unwrap();
        let nurse = actor(&conn, "n", Role::Nurse);
        let p1 = actor(&conn, "p1", Role::Patient);
        let p2 = actor(&conn, "p2", Role::Patient);
        record_vitals(&conn, &nurse, normal(p1.user_id)).unwrap();
        record_vitals(&conn, &nurse, normal(p2.user_id)).unwrap();

        let own = list_vitals(&conn, &p1, Some(p2.user_id), Page::default()).unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].patient_id, p1.user_id);
        assert_eq!(list_vitals(&conn, &nurse, None, Page::default()).unwrap().len(), 2);
        assert_eq!(list_vitals(&conn, &nurse, Some(p2.user_id), Page::default()).unwrap().len(), 1);

        assert!(latest_for_patient(&conn, &p1, &p2.user_id).is_err());
        assert!(latest_for_patient(&conn, &p1, &p1.user_id).unwrap().is_some());
    }
}
