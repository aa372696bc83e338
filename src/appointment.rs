//! Appointment booking and lifecycle.
//!
//! Status moves only along the edges of `AppointmentStatus::can_transition_to`.
//! Every successful transition writes the new status and exactly one
//! notification to the other party in a single transaction.

use chrono::{NaiveDate, NaiveTime, Timelike};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::authorization::{self, Actor, AuthorizationError, Operation, Resource, Scope};
use crate::db::{self, DatabaseError};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, Notification, NotificationType, Page, Role,
    User, UserRef, DEFAULT_APPOINTMENT_TYPE,
};
use crate::notifications;
use crate::validation::ValidationError;

const APPOINTMENT_TYPE_MAX: usize = 100;

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    /// Required for nurses and admins; must be the caller (or absent) for patients.
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default)]
    pub appointment_type: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: UserRef,
    pub doctor: UserRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub appointment: Appointment,
    pub notification: Notification,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),
    #[error("This time slot is already booked for the selected doctor")]
    SlotTaken,
    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for AppointmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation(_) => AppointmentError::SlotTaken,
            other => AppointmentError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for AppointmentError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

// ═══════════════════════════════════════════
// Booking
// ═══════════════════════════════════════════

pub fn book_appointment(
    conn: &Connection,
    actor: &Actor,
    req: BookingRequest,
) -> Result<Appointment, AppointmentError> {
    authorization::authorize(actor.role, Operation::BookAppointment)?;

    let mut v = ValidationError::new();
    let patient_id = match (actor.role, req.patient_id) {
        (Role::Patient, None) => Some(actor.user_id),
        (Role::Patient, Some(id)) if id == actor.user_id => Some(id),
        (Role::Patient, Some(_)) => {
            return Err(AuthorizationError::NotOwner { entity: "appointments" }.into());
        }
        (_, Some(id)) => Some(id),
        (_, None) => {
            v.add("patient_id", "Select a patient.");
            None
        }
    };

    if let Some(id) = patient_id {
        v.check(
            db::user_has_role(conn, &id, &[Role::Patient])?,
            "patient_id",
            "Select a valid patient.",
        );
    }
    v.check(
        db::user_has_role(conn, &req.doctor_id, &[Role::Doctor])?,
        "doctor_id",
        "Select a valid doctor.",
    );
    v.check(req.date >= db::now().date(), "date", "Appointment date cannot be in the past.");
    v.require_text(&req.reason, "reason");
    let appointment_type = req
        .appointment_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_APPOINTMENT_TYPE.to_string());
    v.check(
        appointment_type.chars().count() <= APPOINTMENT_TYPE_MAX,
        "appointment_type",
        "Ensure this value has at most 100 characters.",
    );
    v.into_result()?;

    // Slots are stored at minute precision.
    let time = req
        .time
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(req.time);
    let now = db::now();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: patient_id.unwrap_or(actor.user_id),
        doctor_id: req.doctor_id,
        date: req.date,
        time,
        status: AppointmentStatus::Pending,
        appointment_type,
        reason: req.reason.trim().to_string(),
        notes: req.notes.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };
    db::insert_appointment(conn, &appointment)?;

    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        date = %appointment.date,
        "Appointment booked"
    );
    Ok(appointment)
}

// ═══════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════

fn operation_for(target: AppointmentStatus) -> Option<Operation> {
    match target {
        AppointmentStatus::Approved | AppointmentStatus::Rejected => Some(Operation::ReviewAppointment),
        AppointmentStatus::Completed => Some(Operation::CompleteAppointment),
        AppointmentStatus::Cancelled => Some(Operation::CancelAppointment),
        AppointmentStatus::Pending => None,
    }
}

/// Move an appointment to `target`, notifying the counterpart.
pub fn transition(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    target: AppointmentStatus,
) -> Result<TransitionOutcome, AppointmentError> {
    let Some(op) = operation_for(target) else {
        let appointment = db::get_appointment(conn, id)?.ok_or(AppointmentError::NotFound(*id))?;
        return Err(AppointmentError::InvalidTransition {
            from: appointment.status,
            to: target,
        });
    };
    authorization::authorize(actor.role, op)?;
    let appointment = db::get_appointment(conn, id)?.ok_or(AppointmentError::NotFound(*id))?;
    let from = appointment.status;
    let decision = if target == AppointmentStatus::Cancelled {
        authorization::check_appointment_cancel(actor, &appointment)
    } else {
        authorization::check_appointment_review(actor, &appointment)
    };
    decision.require("appointments")?;

    if !from.can_transition_to(target) {
        tracing::warn!(appointment_id = %id, %from, to = %target, "Illegal appointment transition");
        return Err(AppointmentError::InvalidTransition { from, to: target });
    }

    let doctor = db::get_user(conn, &appointment.doctor_id)?;
    let doctor_name = doctor.as_ref().map(User::full_name).unwrap_or_default();
    let patient = db::get_user(conn, &appointment.patient_id)?;
    let patient_name = patient.as_ref().map(User::full_name).unwrap_or_default();
    let when = format!(
        "{} at {}",
        appointment.date.format("%B %-d, %Y"),
        appointment.time.format("%H:%M")
    );

    let (recipient, title, message, kind) = match target {
        AppointmentStatus::Approved => (
            appointment.patient_id,
            "Appointment Approved".to_string(),
            format!("Your appointment with Dr. {doctor_name} on {when} has been approved."),
            NotificationType::Success,
        ),
        AppointmentStatus::Rejected => (
            appointment.patient_id,
            "Appointment Rejected".to_string(),
            format!("Your appointment with Dr. {doctor_name} on {when} has been rejected."),
            NotificationType::Warning,
        ),
        AppointmentStatus::Completed => (
            appointment.patient_id,
            "Appointment Completed".to_string(),
            format!("Your appointment with Dr. {doctor_name} on {when} has been marked as completed."),
            NotificationType::Appointment,
        ),
        AppointmentStatus::Cancelled if actor.user_id == appointment.patient_id => (
            appointment.doctor_id,
            "Appointment Cancelled".to_string(),
            format!("{patient_name} cancelled the appointment on {when}."),
            NotificationType::Appointment,
        ),
        AppointmentStatus::Cancelled => (
            appointment.patient_id,
            "Appointment Cancelled".to_string(),
            format!("Your appointment with Dr. {doctor_name} on {when} has been cancelled."),
            NotificationType::Appointment,
        ),
        AppointmentStatus::Pending => {
            return Err(AppointmentError::InvalidTransition { from, to: target });
        }
    };

    let tx = conn.unchecked_transaction()?;
    if !db::update_appointment_status(&tx, id, from, target)? {
        // Lost a race with another transition; report against the fresh state.
        let current = db::get_appointment(&tx, id)?.map(|a| a.status).unwrap_or(from);
        return Err(AppointmentError::InvalidTransition { from: current, to: target });
    }
    let notification = notifications::notify(&tx, recipient, Some(actor.user_id), &title, &message, kind)?;
    tx.commit()?;

    tracing::info!(appointment_id = %id, %from, to = %target, actor = %actor.user_id, "Appointment transitioned");

    let appointment = db::get_appointment(conn, id)?.ok_or(AppointmentError::NotFound(*id))?;
    Ok(TransitionOutcome { appointment, notification })
}

/// Status change from a raw string, as posted by the status endpoint.
pub fn update_status(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    raw_status: &str,
) -> Result<TransitionOutcome, AppointmentError> {
    let target: AppointmentStatus = raw_status
        .parse()
        .map_err(|_| ValidationError::single("status", "Invalid status"))?;
    transition(conn, actor, id, target)
}

// ═══════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════

/// Appointments visible to `actor`. Scope overrides any party filter the caller sets.
pub fn list_for(
    conn: &Connection,
    actor: &Actor,
    mut filter: AppointmentFilter,
    page: Page,
) -> Result<Vec<Appointment>, AppointmentError> {
    authorization::authorize(actor.role, Operation::ListAppointments)?;
    match authorization::list_scope(actor.role, Resource::Appointments) {
        Scope::OwnAsPatient => filter.patient_id = Some(actor.user_id),
        Scope::OwnAsDoctor => filter.doctor_id = Some(actor.user_id),
        Scope::AssignedTo | Scope::None => return Ok(Vec::new()),
        Scope::All => {}
    }
    Ok(db::list_appointments(conn, &filter, page)?)
}

pub fn get_for(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<AppointmentDetail, AppointmentError> {
    authorization::authorize(actor.role, Operation::ViewAppointment)?;
    let appointment = db::get_appointment(conn, id)?.ok_or(AppointmentError::NotFound(*id))?;
    authorization::check_appointment_access(actor, &appointment).require("appointments")?;
    let patient = db::get_user(conn, &appointment.patient_id)?.ok_or(AppointmentError::NotFound(*id))?;
    let doctor = db::get_user(conn, &appointment.doctor_id)?.ok_or(AppointmentError::NotFound(*id))?;
    Ok(AppointmentDetail {
        patient: UserRef::from(&patient),
        doctor: UserRef::from(&doctor),
        appointment,
    })
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
