//! Per-role dashboard summaries.
//!
//! Each role has its own provider. Every figure is queried live on each
//! call; nothing is cached between requests.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::authorization::{self, Actor, AuthorizationError, Operation};
use crate::config::RECENT_LIMIT;
use crate::db::{self, DatabaseError};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, MedicalRecord, MedicalRecordFilter,
    Notification, Page, Role, SystemAlert, Task, TaskFilter, TaskStatus, User, UserFilter,
};

/// Patients see fewer recent records than doctors do.
const PATIENT_RECENT_RECORDS: u32 = 3;

// ═══════════════════════════════════════════
// Summary types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct AdminSummary {
    pub total_users: u32,
    pub total_doctors: u32,
    pub total_nurses: u32,
    pub total_patients: u32,
    pub total_appointments: u32,
    pub pending_appointments: u32,
    pub active_alerts: u32,
    pub recent_users: Vec<User>,
    pub recent_appointments: Vec<Appointment>,
    pub system_alerts: Vec<SystemAlert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorSummary {
    pub todays_appointments: u32,
    pub pending_appointments: u32,
    pub total_patients: u32,
    pub medical_records: u32,
    pub todays_appointment_list: Vec<Appointment>,
    pub pending_appointment_list: Vec<Appointment>,
    pub recent_records: Vec<MedicalRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NurseSummary {
    pub todays_tasks: u32,
    pub pending_tasks: u32,
    pub completed_tasks: u32,
    pub todays_task_list: Vec<Task>,
    pub pending_task_list: Vec<Task>,
    pub recent_tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub upcoming_appointments: u32,
    pub medical_records: u32,
    pub pending_requests: u32,
    pub upcoming_appointment_list: Vec<Appointment>,
    pub recent_records: Vec<MedicalRecord>,
    pub pending_request_list: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleSummary {
    SuperAdmin(AdminSummary),
    Doctor(DoctorSummary),
    Nurse(NurseSummary),
    Patient(PatientSummary),
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub summary: RoleSummary,
    pub unread_notifications: u32,
    pub recent_notifications: Vec<Notification>,
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

// ═══════════════════════════════════════════
// Providers
// ═══════════════════════════════════════════

pub trait DashboardProvider: Sync {
    fn summary(&self, conn: &Connection, actor: &Actor, today: NaiveDate) -> Result<RoleSummary, DatabaseError>;
}

struct AdminDashboard;
struct DoctorDashboard;
struct NurseDashboard;
struct PatientDashboard;

fn recent() -> Page {
    Page::first(RECENT_LIMIT)
}

impl DashboardProvider for AdminDashboard {
    fn summary(&self, conn: &Connection, _actor: &Actor, _today: NaiveDate) -> Result<RoleSummary, DatabaseError> {
        let by_role = |role| UserFilter {
            role: Some(role),
            active_only: false,
        };
        let pending = AppointmentFilter {
            status: Some(AppointmentStatus::Pending),
            ..Default::default()
        };
        Ok(RoleSummary::SuperAdmin(AdminSummary {
            total_users: db::count_users(conn, &UserFilter::default())?,
            total_doctors: db::count_users(conn, &by_role(Role::Doctor))?,
            total_nurses: db::count_users(conn, &by_role(Role::Nurse))?,
            total_patients: db::count_users(conn, &by_role(Role::Patient))?,
            total_appointments: db::count_appointments(conn, &AppointmentFilter::default())?,
            pending_appointments: db::count_appointments(conn, &pending)?,
            active_alerts: db::count_active_system_alerts(conn)?,
            recent_users: db::list_users(conn, &UserFilter::default(), recent())?,
            recent_appointments: db::list_appointments(conn, &AppointmentFilter::default(), recent())?,
            system_alerts: db::list_active_system_alerts(conn, RECENT_LIMIT)?,
        }))
    }
}

impl DashboardProvider for DoctorDashboard {
    fn summary(&self, conn: &Connection, actor: &Actor, today: NaiveDate) -> Result<RoleSummary, DatabaseError> {
        let doctor_id = Some(actor.user_id);
        let todays = AppointmentFilter {
            doctor_id,
            date: Some(today),
            ..Default::default()
        };
        let pending = AppointmentFilter {
            doctor_id,
            status: Some(AppointmentStatus::Pending),
            ..Default::default()
        };
        let authored = MedicalRecordFilter {
            doctor_id,
            ..Default::default()
        };
        Ok(RoleSummary::Doctor(DoctorSummary {
            todays_appointments: db::count_appointments(conn, &todays)?,
            pending_appointments: db::count_appointments(conn, &pending)?,
            total_patients: db::count_patients_of_doctor(conn, &actor.user_id)?,
            medical_records: db::count_medical_records(conn, &authored)?,
            todays_appointment_list: db::list_appointments(conn, &todays, recent())?,
            pending_appointment_list: db::list_appointments(conn, &pending, recent())?,
            recent_records: db::list_medical_records(conn, &authored, recent())?,
        }))
    }
}

impl DashboardProvider for NurseDashboard {
    fn summary(&self, conn: &Connection, actor: &Actor, today: NaiveDate) -> Result<RoleSummary, DatabaseError> {
        let assigned = |status: Option<TaskStatus>, due_date: Option<NaiveDate>| TaskFilter {
            assigned_to: Some(actor.user_id),
            status,
            due_date,
        };
        let todays = assigned(None, Some(today));
        let pending = assigned(Some(TaskStatus::Pending), None);
        Ok(RoleSummary::Nurse(NurseSummary {
            todays_tasks: db::count_tasks(conn, &todays)?,
            pending_tasks: db::count_tasks(conn, &pending)?,
            completed_tasks: db::count_tasks(conn, &assigned(Some(TaskStatus::Completed), None))?,
            todays_task_list: db::list_tasks(conn, &todays, recent())?,
            pending_task_list: db::list_tasks(conn, &pending, recent())?,
            recent_tasks: db::list_tasks(conn, &assigned(None, None), recent())?,
        }))
    }
}

impl DashboardProvider for PatientDashboard {
    fn summary(&self, conn: &Connection, actor: &Actor, today: NaiveDate) -> Result<RoleSummary, DatabaseError> {
        let patient_id = Some(actor.user_id);
        let upcoming = AppointmentFilter {
            patient_id,
            status: Some(AppointmentStatus::Approved),
            date_from: Some(today),
            ..Default::default()
        };
        let pending = AppointmentFilter {
            patient_id,
            status: Some(AppointmentStatus::Pending),
            ..Default::default()
        };
        let own_records = MedicalRecordFilter {
            patient_id,
            ..Default::default()
        };
        Ok(RoleSummary::Patient(PatientSummary {
            upcoming_appointments: db::count_appointments(conn, &upcoming)?,
            medical_records: db::count_medical_records(conn, &own_records)?,
            pending_requests: db::count_appointments(conn, &pending)?,
            upcoming_appointment_list: db::list_appointments(conn, &upcoming, recent())?,
            recent_records: db::list_medical_records(conn, &own_records, Page::first(PATIENT_RECENT_RECORDS))?,
            pending_request_list: db::list_appointments(conn, &pending, recent())?,
        }))
    }
}

/// Role → provider.
pub fn provider_for(role: Role) -> &'static dyn DashboardProvider {
    match role {
        Role::SuperAdmin => &AdminDashboard,
        Role::Doctor => &DoctorDashboard,
        Role::Nurse => &NurseDashboard,
        Role::Patient => &PatientDashboard,
    }
}

// ═══════════════════════════════════════════
// Entry points
// ═══════════════════════════════════════════

pub fn build_dashboard(conn: &Connection, actor: &Actor) -> Result<Dashboard, DashboardError> {
    build_dashboard_on(conn, actor, db::now().date())
}

/// Dashboard as of `today`. Adds the unread badge and latest unread
/// notifications to the role summary.
pub fn build_dashboard_on(conn: &Connection, actor: &Actor, today: NaiveDate) -> Result<Dashboard, DashboardError> {
    authorization::authorize(actor.role, Operation::ViewDashboard)?;
    let summary = provider_for(actor.role).summary(conn, actor, today)?;
    Ok(Dashboard {
        summary,
        unread_notifications: db::count_unread_notifications(conn, &actor.user_id)?,
        recent_notifications: db::list_notifications(conn, &actor.user_id, true, recent())?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveTime};

    use super::*;
    use crate::accounts::{create_user, new_user};
    use crate::alerts::{self, NewAlert};
    use crate::appointment::{self, BookingRequest};
    use crate::db::open_memory_database;
    use crate::tasks::{self, NewTask};

    fn actor(conn: &Connection, name: &str, role: Role) -> Actor {
        let user = create_user(conn, new_user(name, role)).unwrap();
        Actor::new(user.id, role)
    }

    fn book(conn: &Connection, patient: &Actor, doctor: &Actor, date: NaiveDate, hour: u32) -> Appointment {
        appointment::book_appointment(
            conn,
            patient,
            BookingRequest {
                doctor_id: doctor.user_id,
                patient_id: None,
                date,
                time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                appointment_type: None,
                reason: "Checkup".into(),
                notes: None,
            },
        )
        .unwrap()
    }

    fn count_rows(conn: &Connection, sql: &str) -> u32 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn admin_counts_match_live_tables() {
        let conn = open_memory_database().unwrap();
        let admin = actor(&conn, "root", Role::SuperAdmin);
        let doctor = actor(&conn, "doc", Role::Doctor);
        let patient = actor(&conn, "pat", Role::Patient);
        actor(&conn, "nurse", Role::Nurse);
        let today = db::now().date();
        let first = book(&conn, &patient, &doctor, today + Duration::days(1), 9);
        book(&conn, &patient, &doctor, today + Duration::days(1), 10);
        appointment::transition(&conn, &doctor, &first.id, AppointmentStatus::Approved).unwrap();
        alerts::create_alert(
            &conn,
            &admin,
            NewAlert {
                title: "Maintenance".into(),
                message: "Tonight".into(),
                alert_type: None,
            },
        )
        .unwrap();

        let before = build_dashboard_on(&conn, &admin, today).unwrap();
        let RoleSummary::SuperAdmin(stats) = before.summary else {
            panic!("expected admin summary");
        };
        assert_eq!(stats.total_users, count_rows(&conn, "SELECT COUNT(*) FROM users"));
        assert_eq!(stats.total_doctors, 1);
        assert_eq!(stats.total_nurses, 1);
        assert_eq!(stats.total_patients, 1);
        assert_eq!(stats.total_appointments, count_rows(&conn, "SELECT COUNT(*) FROM appointments"));
        assert_eq!(stats.pending_appointments, 1);
        assert_eq!(stats.active_alerts, 1);
        assert_eq!(stats.recent_users.len(), 4);

        // A new row is reflected immediately
        actor(&conn, "pat2", Role::Patient);
        let after = build_dashboard_on(&conn, &admin, today).unwrap();
        let RoleSummary::SuperAdmin(stats) = after.summary else {
            panic!("expected admin summary");
        };
        assert_eq!(stats.total_users, 5);
        assert_eq!(stats.total_patients, 2);
    }

    #[test]
    fn doctor_and_patient_views() {
        let conn = open_memory_database().unwrap();
        let doctor = actor(&conn, "doc", Role::Doctor);
        let p1 = actor(&conn, "p1", Role::Patient);
        let p2 = actor(&conn, "p2", Role::Patient);
        let today = db::now().date();
        let tomorrow = today + Duration::days(1);
        let a = book(&conn, &p1, &doctor, today, 23);
        book(&conn, &p1, &doctor, tomorrow, 9);
        book(&conn, &p2, &doctor, tomorrow, 10);
        appointment::transition(&conn, &doctor, &a.id, AppointmentStatus::Approved).unwrap();

        let RoleSummary::Doctor(d) = build_dashboard_on(&conn, &doctor, today).unwrap().summary else {
            panic!("expected doctor summary");
        };
        assert_eq!(d.todays_appointments, 1);
        assert_eq!(d.pending_appointments, 2);
        assert_eq!(d.total_patients, 2);
        assert_eq!(d.medical_records, 0);

        let dash = build_dashboard_on(&conn, &p1, today).unwrap();
        assert_eq!(dash.unread_notifications, 1);
        assert_eq!(dash.recent_notifications[0].title, "Appointment Approved");
        let RoleSummary::Patient(p) = dash.summary else {
            panic!("expected patient summary");
        };
        assert_eq!(p.upcoming_appointments, 1);
        assert_eq!(p.pending_requests, 1);
        assert_eq!(p.upcoming_appointment_list[0].id, a.id);
    }

    #[test]
    fn nurse_task_counts() {
        let conn = open_memory_database().unwrap();
        let doctor = actor(&conn, "doc", Role::Doctor);
        let nurse = actor(&conn, "nurse", Role::Nurse);
        let today = NaiveDate::from_ymd_opt(2030, 3, 1).unwrap();
        for (i, due) in [today, today, today + Duration::days(2)].into_iter().enumerate() {
            let task = tasks::create_task(
                &conn,
                &doctor,
                NewTask {
                    title: format!("Round {i}"),
                    description: String::new(),
                    assigned_to: nurse.user_id,
                    patient_id: None,
                    priority: None,
                    due_date: due,
                },
            )
            .unwrap();
            if i == 0 {
                tasks::update_status(&conn, &nurse, &task.id, TaskStatus::Completed).unwrap();
            }
        }

        let dash = build_dashboard_on(&conn, &nurse, today).unwrap();
        assert_eq!(dash.unread_notifications, 3);
        assert_eq!(dash.recent_notifications.len(), 3);
        let RoleSummary::Nurse(n) = dash.summary else {
            panic!("expected nurse summary");
        };
        assert_eq!(n.todays_tasks, 2);
        assert_eq!(n.pending_tasks, 2);
        assert_eq!(n.completed_tasks, 1);
        assert_eq!(n.recent_tasks.len(), 3);
    }
}
