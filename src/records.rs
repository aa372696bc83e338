//! Medical records and their prescriptions.
//!
//! Records are append-only. Prescriptions can be attached at creation or
//! later by the authoring doctor; the record text download is a plain
//! text rendering of the record, not a binary document.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{self, Actor, AuthorizationError, Operation, Resource, Scope};
use crate::db::{self, DatabaseError};
use crate::models::{
    MedicalRecord, MedicalRecordFilter, NotificationType, Page, Prescription, Role, User, UserRef,
};
use crate::notifications;
use crate::validation::ValidationError;

const DIAGNOSIS_MAX: usize = 200;
const MEDICATION_MAX: usize = 100;
const DOSAGE_FIELD_MAX: usize = 50;

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct NewPrescription {
    pub medication_name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMedicalRecord {
    pub patient_id: Uuid,
    pub diagnosis: String,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub prescription: String,
    #[serde(default)]
    pub notes: String,
    pub visit_date: NaiveDate,
    #[serde(default)]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub prescriptions: Vec<NewPrescription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicalRecordDetail {
    #[serde(flatten)]
    pub record: MedicalRecord,
    pub patient: UserRef,
    pub doctor: UserRef,
    pub prescriptions: Vec<Prescription>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
    #[error("Medical record not found: {0}")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for RecordError {
    fn from(err: rusqlite::Error) -> Self {
        RecordError::Database(err.into())
    }
}

// ═══════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════

fn validate_prescription(v: &mut ValidationError, p: &NewPrescription, prefix: &str) {
    let field = |name: &str| format!("{prefix}{name}");
    v.require_text(&p.medication_name, &field("medication_name"));
    v.check(
        p.medication_name.chars().count() <= MEDICATION_MAX,
        &field("medication_name"),
        "Ensure this value has at most 100 characters.",
    );
    for (name, value) in [("dosage", &p.dosage), ("frequency", &p.frequency), ("duration", &p.duration)] {
        v.require_text(value, &field(name));
        v.check(
            value.chars().count() <= DOSAGE_FIELD_MAX,
            &field(name),
            "Ensure this value has at most 50 characters.",
        );
    }
}

fn build_prescription(record_id: Uuid, p: NewPrescription) -> Prescription {
    Prescription {
        id: Uuid::new_v4(),
        medical_record_id: record_id,
        medication_name: p.medication_name.trim().to_string(),
        dosage: p.dosage.trim().to_string(),
        frequency: p.frequency.trim().to_string(),
        duration: p.duration.trim().to_string(),
        instructions: p.instructions,
    }
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

/// Create a record authored by `actor`, with any inline prescriptions.
pub fn create_record(
    conn: &Connection,
    actor: &Actor,
    input: NewMedicalRecord,
) -> Result<MedicalRecordDetail, RecordError> {
    authorization::authorize(actor.role, Operation::CreateMedicalRecord)?;

    let mut v = ValidationError::new();
    v.check(
        db::user_has_role(conn, &input.patient_id, &[Role::Patient])?,
        "patient_id",
        "Select a valid patient.",
    );
    v.require_text(&input.diagnosis, "diagnosis");
    v.check(
        input.diagnosis.chars().count() <= DIAGNOSIS_MAX,
        "diagnosis",
        "Ensure this value has at most 200 characters.",
    );
    if let Some(follow_up) = input.follow_up_date {
        v.check(
            follow_up >= input.visit_date,
            "follow_up_date",
            "Follow-up date cannot precede the visit date.",
        );
    }
    for (i, p) in input.prescriptions.iter().enumerate() {
        validate_prescription(&mut v, p, &format!("prescriptions[{i}]."));
    }
    v.into_result()?;

    let record = MedicalRecord {
        id: Uuid::new_v4(),
        patient_id: input.patient_id,
        doctor_id: actor.user_id,
        diagnosis: input.diagnosis.trim().to_string(),
        symptoms: input.symptoms,
        treatment: input.treatment,
        prescription: input.prescription,
        notes: input.notes,
        visit_date: input.visit_date,
        follow_up_date: input.follow_up_date,
        created_at: db::now(),
    };

    let tx = conn.unchecked_transaction()?;
    db::insert_medical_record(&tx, &record)?;
    for p in input.prescriptions {
        db::insert_prescription(&tx, &build_prescription(record.id, p))?;
    }
    tx.commit()?;

    tracing::info!(record_id = %record.id, patient_id = %record.patient_id, "Medical record created");
    load_detail(conn, record)
}

/// Append a prescription. Only the record's author or an admin may do so;
/// the patient receives a prescription notification.
pub fn add_prescription(
    conn: &Connection,
    actor: &Actor,
    record_id: &Uuid,
    input: NewPrescription,
) -> Result<Prescription, RecordError> {
    authorization::authorize(actor.role, Operation::AddPrescription)?;
    let record = db::get_medical_record(conn, record_id)?.ok_or(RecordError::NotFound(*record_id))?;
    authorization::check_record_authorship(actor, &record).require("medical records")?;

    let mut v = ValidationError::new();
    validate_prescription(&mut v, &input, "");
    v.into_result()?;

    let prescription = build_prescription(record.id, input);
    let tx = conn.unchecked_transaction()?;
    db::insert_prescription(&tx, &prescription)?;
    notifications::notify(
        &tx,
        record.patient_id,
        Some(actor.user_id),
        "New Prescription",
        &format!(
            "{} ({}, {}) has been prescribed for {}.",
            prescription.medication_name, prescription.dosage, prescription.frequency, prescription.duration
        ),
        NotificationType::Prescription,
    )?;
    tx.commit()?;
    Ok(prescription)
}

pub fn list_records(
    conn: &Connection,
    actor: &Actor,
    mut filter: MedicalRecordFilter,
    page: Page,
) -> Result<Vec<MedicalRecord>, RecordError> {
    authorization::authorize(actor.role, Operation::ListMedicalRecords)?;
    match authorization::list_scope(actor.role, Resource::MedicalRecords) {
        Scope::OwnAsPatient => filter.patient_id = Some(actor.user_id),
        Scope::OwnAsDoctor => filter.doctor_id = Some(actor.user_id),
        Scope::AssignedTo | Scope::None => return Ok(Vec::new()),
        Scope::All => {}
    }
    Ok(db::list_medical_records(conn, &filter, page)?)
}

fn load_detail(conn: &Connection, record: MedicalRecord) -> Result<MedicalRecordDetail, RecordError> {
    let patient = fetch_user(conn, &record.patient_id, record.id)?;
    let doctor = fetch_user(conn, &record.doctor_id, record.id)?;
    let prescriptions = db::get_prescriptions_for_record(conn, &record.id)?;
    Ok(MedicalRecordDetail {
        patient: UserRef::from(&patient),
        doctor: UserRef::from(&doctor),
        prescriptions,
        record,
    })
}

fn fetch_user(conn: &Connection, id: &Uuid, record_id: Uuid) -> Result<User, RecordError> {
    db::get_user(conn, id)?.ok_or(RecordError::NotFound(record_id))
}

pub fn get_record(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<MedicalRecordDetail, RecordError> {
    authorization::authorize(actor.role, Operation::ViewMedicalRecord)?;
    let record = db::get_medical_record(conn, id)?.ok_or(RecordError::NotFound(*id))?;
    authorization::check_record_access(actor, &record).require("medical records")?;
    load_detail(conn, record)
}

/// Plain-text rendering served by the download endpoint.
pub fn render_record_document(detail: &MedicalRecordDetail) -> String {
    let r = &detail.record;
    let mut out = String::new();
    out.push_str(&format!("Medical Record for {}\n", detail.patient.name));
    out.push_str(&format!("Doctor: Dr. {}\n", detail.doctor.name));
    out.push_str(&format!("Date: {}\n", r.visit_date));
    out.push_str(&format!("Diagnosis: {}\n", r.diagnosis));
    if !r.symptoms.is_empty() {
        out.push_str(&format!("Symptoms: {}\n", r.symptoms));
    }
    out.push_str(&format!("Treatment: {}\n", r.treatment));
    if !r.prescription.is_empty() {
        out.push_str(&format!("Prescription: {}\n", r.prescription));
    }
    if let Some(follow_up) = r.follow_up_date {
        out.push_str(&format!("Follow-up: {follow_up}\n"));
    }
    if !r.notes.is_empty() {
        out.push_str(&format!("Notes: {}\n", r.notes));
    }
    if !detail.prescriptions.is_empty() {
        out.push_str("\nPrescriptions:\n");
        for p in &detail.prescriptions {
            out.push_str(&format!(
                "- {} {}, {} for {}",
                p.medication_name, p.dosage, p.frequency, p.duration
            ));
            if !p.instructions.is_empty() {
                out.push_str(&format!(" ({})", p.instructions));
            }
            out.push('\n');
        }
    }
    out
}

pub fn download_filename(record_id: &Uuid) -> String {
    format!("medical_record_{record_id}.txt")
}

/// Load, check download rights, render.
pub fn download_record(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<(String, String), RecordError> {
    authorization::authorize(actor.role, Operation::DownloadMedicalRecord)?;
    let detail = get_record(conn, actor, id)?;
    Ok((download_filename(id), render_record_document(&detail)))
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
