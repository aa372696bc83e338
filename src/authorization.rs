//! Role-based access policy.
//!
//! Two layers, checked in order:
//! 1. Operation gate: a static (role, operation) table. Default-deny.
//! 2. Row ownership: once an operation is allowed, patients and doctors
//!    only reach the rows they are party to. Admins bypass.
//!
//! List views apply the same ownership rule up front through [`list_scope`].

use uuid::Uuid;

use crate::models::{Appointment, MedicalRecord, Role, Task, VitalSigns};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The authenticated caller of a domain operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListUsers,
    ViewUser,
    CreateUser,
    SetUserActive,
    ViewOwnProfile,
    UpdateOwnProfile,
    BookAppointment,
    ListAppointments,
    ViewAppointment,
    ReviewAppointment,
    CompleteAppointment,
    CancelAppointment,
    CreateMedicalRecord,
    AddPrescription,
    ListMedicalRecords,
    ViewMedicalRecord,
    DownloadMedicalRecord,
    RecordVitals,
    ListVitals,
    CreateTask,
    ListTasks,
    UpdateTaskStatus,
    ViewInbox,
    MarkNotificationRead,
    EditNotificationPreferences,
    ViewDashboard,
    ManageSystemAlerts,
}

/// Row families that list views filter by ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Appointments,
    MedicalRecords,
    Vitals,
    Tasks,
}

/// Which rows of a [`Resource`] a role may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    /// Rows whose patient is the caller.
    OwnAsPatient,
    /// Rows whose doctor (or author) is the caller.
    OwnAsDoctor,
    /// Rows assigned to the caller.
    AssignedTo,
    None,
}

/// Why row access was granted (or denied), for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    Admin,
    OwnAsPatient,
    OwnAsDoctor,
    Assignee,
    Staff,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self { allowed: true, reason }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AccessReason::Denied,
        }
    }

    /// Turn a denial into an error naming the entity.
    pub fn require(self, entity: &'static str) -> Result<AccessReason, AuthorizationError> {
        if self.allowed {
            Ok(self.reason)
        } else {
            Err(AuthorizationError::NotOwner { entity })
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Role {role} may not perform {operation:?}")]
    Forbidden { role: Role, operation: Operation },
    #[error("You can only access your own {entity}")]
    NotOwner { entity: &'static str },
}

// ═══════════════════════════════════════════════════════════
// Operation gate
// ═══════════════════════════════════════════════════════════

const ADMIN: &[Role] = &[Role::SuperAdmin];
const EVERYONE: &[Role] = &[Role::SuperAdmin, Role::Doctor, Role::Nurse, Role::Patient];
const ADMIN_DOCTOR: &[Role] = &[Role::SuperAdmin, Role::Doctor];
const STAFF_AND_ADMIN: &[Role] = &[Role::SuperAdmin, Role::Doctor, Role::Nurse];

/// The single policy table.
pub fn allowed_roles(op: Operation) -> &'static [Role] {
    use Operation::*;
    match op {
        ListUsers | ViewUser | CreateUser | SetUserActive | ManageSystemAlerts => ADMIN,
        BookAppointment => &[Role::SuperAdmin, Role::Nurse, Role::Patient],
        ReviewAppointment | CompleteAppointment => ADMIN_DOCTOR,
        CancelAppointment => &[Role::SuperAdmin, Role::Doctor, Role::Patient],
        CreateMedicalRecord | AddPrescription => ADMIN_DOCTOR,
        RecordVitals => &[Role::Doctor, Role::Nurse],
        CreateTask | ListTasks | UpdateTaskStatus => STAFF_AND_ADMIN,
        ViewOwnProfile
        | UpdateOwnProfile
        | ListAppointments
        | ViewAppointment
        | ListMedicalRecords
        | ViewMedicalRecord
        | DownloadMedicalRecord
        | ListVitals
        | ViewInbox
        | MarkNotificationRead
        | EditNotificationPreferences
        | ViewDashboard => EVERYONE,
    }
}

pub fn authorize(role: Role, op: Operation) -> Result<(), AuthorizationError> {
    if allowed_roles(op).contains(&role) {
        Ok(())
    } else {
        tracing::warn!(role = %role, operation = ?op, "Operation refused by policy");
        Err(AuthorizationError::Forbidden { role, operation: op })
    }
}

/// Row filter for list views.
pub fn list_scope(role: Role, resource: Resource) -> Scope {
    match (resource, role) {
        (_, Role::SuperAdmin) => Scope::All,
        (Resource::Appointments, Role::Patient) => Scope::OwnAsPatient,
        (Resource::Appointments, Role::Doctor) => Scope::OwnAsDoctor,
        (Resource::Appointments, Role::Nurse) => Scope::All,
        (Resource::MedicalRecords, Role::Patient) => Scope::OwnAsPatient,
        (Resource::MedicalRecords, Role::Doctor) => Scope::OwnAsDoctor,
        (Resource::MedicalRecords, Role::Nurse) => Scope::All,
        (Resource::Vitals, Role::Patient) => Scope::OwnAsPatient,
        (Resource::Vitals, Role::Doctor | Role::Nurse) => Scope::All,
        (Resource::Tasks, Role::Doctor | Role::Nurse) => Scope::AssignedTo,
        (Resource::Tasks, Role::Patient) => Scope::None,
    }
}

// ═══════════════════════════════════════════════════════════
// Row ownership
// ═══════════════════════════════════════════════════════════

/// Patients see their own appointments, doctors the ones assigned to them.
pub fn check_appointment_access(actor: &Actor, appointment: &Appointment) -> AccessDecision {
    match actor.role {
        Role::SuperAdmin => AccessDecision::allow(AccessReason::Admin),
        Role::Nurse => AccessDecision::allow(AccessReason::Staff),
        Role::Patient if appointment.patient_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsPatient)
        }
        Role::Doctor if appointment.doctor_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsDoctor)
        }
        _ => AccessDecision::deny(),
    }
}

/// Approve, reject and complete: the assigned doctor or an admin.
pub fn check_appointment_review(actor: &Actor, appointment: &Appointment) -> AccessDecision {
    match actor.role {
        Role::SuperAdmin => AccessDecision::allow(AccessReason::Admin),
        Role::Doctor if appointment.doctor_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsDoctor)
        }
        _ => AccessDecision::deny(),
    }
}

/// Cancel: either party or an admin.
pub fn check_appointment_cancel(actor: &Actor, appointment: &Appointment) -> AccessDecision {
    match actor.role {
        Role::SuperAdmin => AccessDecision::allow(AccessReason::Admin),
        Role::Patient if appointment.patient_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsPatient)
        }
        Role::Doctor if appointment.doctor_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsDoctor)
        }
        _ => AccessDecision::deny(),
    }
}

/// Patients read only their own records. Clinical staff read any record.
pub fn check_record_access(actor: &Actor, record: &MedicalRecord) -> AccessDecision {
    match actor.role {
        Role::SuperAdmin => AccessDecision::allow(AccessReason::Admin),
        Role::Doctor if record.doctor_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsDoctor)
        }
        Role::Doctor | Role::Nurse => AccessDecision::allow(AccessReason::Staff),
        Role::Patient if record.patient_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsPatient)
        }
        Role::Patient => AccessDecision::deny(),
    }
}

/// Adding prescriptions: the authoring doctor or an admin.
pub fn check_record_authorship(actor: &Actor, record: &MedicalRecord) -> AccessDecision {
    match actor.role {
        Role::SuperAdmin => AccessDecision::allow(AccessReason::Admin),
        Role::Doctor if record.doctor_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsDoctor)
        }
        _ => AccessDecision::deny(),
    }
}

pub fn check_vitals_access(actor: &Actor, vitals: &VitalSigns) -> AccessDecision {
    match actor.role {
        Role::SuperAdmin => AccessDecision::allow(AccessReason::Admin),
        Role::Doctor | Role::Nurse => AccessDecision::allow(AccessReason::Staff),
        Role::Patient if vitals.patient_id == actor.user_id => {
            AccessDecision::allow(AccessReason::OwnAsPatient)
        }
        Role::Patient => AccessDecision::deny(),
    }
}

/// Tasks are visible and mutable by their assignee or an admin.
pub fn check_task_access(actor: &Actor, task: &Task) -> AccessDecision {
    match actor.role {
        Role::SuperAdmin => AccessDecision::allow(AccessReason::Admin),
        _ if task.assigned_to == actor.user_id => AccessDecision::allow(AccessReason::Assignee),
        _ => AccessDecision::deny(),
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::db::now;
    use crate::models::AppointmentStatus;

    fn appointment(patient: Uuid, doctor: Uuid) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: patient,
            doctor_id: doctor,
            date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            status: AppointmentStatus::Pending,
            appointment_type: "General Consultation".into(),
            reason: "Checkup".into(),
            notes: String::new(),
            created_at: now(),
            updated_at: now(),
        }
    }

    fn record(patient: Uuid, doctor: Uuid) -> MedicalRecord {
        MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: patient,
            doctor_id: doctor,
            diagnosis: "Flu".into(),
            symptoms: String::new(),
            treatment: String::new(),
            prescription: String::new(),
            notes: String::new(),
            visit_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            follow_up_date: None,
            created_at: now(),
        }
    }

    #[test]
    fn admin_only_operations() {
        for op in [Operation::ListUsers, Operation::CreateUser, Operation::ManageSystemAlerts] {
            assert!(authorize(Role::SuperAdmin, op).is_ok());
            for role in [Role::Doctor, Role::Nurse, Role::Patient] {
                assert_eq!(
                    authorize(role, op),
                    Err(AuthorizationError::Forbidden { role, operation: op })
                );
            }
        }
    }

    #[test]
    fn booking_and_review_roles() {
        assert!(authorize(Role::Patient, Operation::BookAppointment).is_ok());
        assert!(authorize(Role::Nurse, Operation::BookAppointment).is_ok());
        assert!(authorize(Role::Doctor, Operation::BookAppointment).is_err());

        assert!(authorize(Role::Doctor, Operation::ReviewAppointment).is_ok());
        assert!(authorize(Role::Nurse, Operation::ReviewAppointment).is_err());
        assert!(authorize(Role::Patient, Operation::ReviewAppointment).is_err());
        assert!(authorize(Role::Patient, Operation::CancelAppointment).is_ok());
    }

    #[test]
    fn vitals_are_recorded_by_clinical_staff_only() {
        assert!(authorize(Role::Nurse, Operation::RecordVitals).is_ok());
        assert!(authorize(Role::Doctor, Operation::RecordVitals).is_ok());
        assert!(authorize(Role::SuperAdmin, Operation::RecordVitals).is_err());
        assert!(authorize(Role::Patient, Operation::RecordVitals).is_err());
    }

    #[test]
    fn everyone_has_dashboard_and_inbox() {
        for role in Role::ALL {
            assert!(authorize(*role, Operation::ViewDashboard).is_ok());
            assert!(authorize(*role, Operation::MarkNotificationRead).is_ok());
        }
    }

    #[test]
    fn list_scopes() {
        assert_eq!(list_scope(Role::Patient, Resource::Appointments), Scope::OwnAsPatient);
        assert_eq!(list_scope(Role::Doctor, Resource::Appointments), Scope::OwnAsDoctor);
        assert_eq!(list_scope(Role::Nurse, Resource::Appointments), Scope::All);
        assert_eq!(list_scope(Role::Doctor, Resource::MedicalRecords), Scope::OwnAsDoctor);
        assert_eq!(list_scope(Role::Nurse, Resource::Vitals), Scope::All);
        assert_eq!(list_scope(Role::Nurse, Resource::Tasks), Scope::AssignedTo);
        assert_eq!(list_scope(Role::Patient, Resource::Tasks), Scope::None);
        for resource in [Resource::Appointments, Resource::MedicalRecords, Resource::Vitals, Resource::Tasks] {
            assert_eq!(list_scope(Role::SuperAdmin, resource), Scope::All);
        }
    }

    #[test]
    fn appointment_ownership() {
        let patient = Actor::new(Uuid::new_v4(), Role::Patient);
        let doctor = Actor::new(Uuid::new_v4(), Role::Doctor);
        let other_doctor = Actor::new(Uuid::new_v4(), Role::Doctor);
        let nurse = Actor::new(Uuid::new_v4(), Role::Nurse);
        let a = appointment(patient.user_id, doctor.user_id);

        assert!(check_appointment_access(&patient, &a).allowed);
        assert!(check_appointment_access(&nurse, &a).allowed);
        assert!(!check_appointment_access(&other_doctor, &a).allowed);

        assert_eq!(check_appointment_review(&doctor, &a).reason, AccessReason::OwnAsDoctor);
        assert!(!check_appointment_review(&other_doctor, &a).allowed);
        assert!(!check_appointment_review(&patient, &a).allowed);

        assert!(check_appointment_cancel(&patient, &a).allowed);
        let stranger = Actor::new(Uuid::new_v4(), Role::Patient);
        assert_eq!(
            check_appointment_cancel(&stranger, &a).require("appointments"),
            Err(AuthorizationError::NotOwner { entity: "appointments" })
        );
    }

    #[test]
    fn record_ownership() {
        let patient = Actor::new(Uuid::new_v4(), Role::Patient);
        let author = Actor::new(Uuid::new_v4(), Role::Doctor);
        let colleague = Actor::new(Uuid::new_v4(), Role::Doctor);
        let r = record(patient.user_id, author.user_id);

        assert!(check_record_access(&patient, &r).allowed);
        assert!(check_record_access(&colleague, &r).allowed);
        assert!(!check_record_access(&Actor::new(Uuid::new_v4(), Role::Patient), &r).allowed);

        assert!(check_record_authorship(&author, &r).allowed);
        assert!(!check_record_authorship(&colleague, &r).allowed);
        assert!(check_record_authorship(&Actor::new(Uuid::new_v4(), Role::SuperAdmin), &r).allowed);
    }
}
