use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{date_at, datetime_at, enum_at, fmt_date, fmt_datetime, fmt_time, time_at, uuid_at, Conditions};
use crate::db::DatabaseError;
use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, Page};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, doctor_id, date, time, status,
     appointment_type, reason, notes, created_at, updated_at";

/// A taken (doctor, date, time) slot surfaces as `ConstraintViolation`.
pub fn insert_appointment(conn: &Connection, a: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, patient_id, doctor_id, date, time, status,
         appointment_type, reason, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            a.id.to_string(),
            a.patient_id.to_string(),
            a.doctor_id.to_string(),
            fmt_date(&a.date),
            fmt_time(&a.time),
            a.status.as_str(),
            a.appointment_type,
            a.reason,
            a.notes,
            fmt_datetime(&a.created_at),
            fmt_datetime(&a.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let appointment = conn
        .query_row(&sql, params![id.to_string()], row_to_appointment)
        .optional()?;
    Ok(appointment)
}

fn appointment_conditions(f: &AppointmentFilter) -> Conditions {
    let mut c = Conditions::default();
    if let Some(id) = f.patient_id {
        c.push("patient_id =", id.to_string());
    }
    if let Some(id) = f.doctor_id {
        c.push("doctor_id =", id.to_string());
    }
    if let Some(status) = f.status {
        c.push("status =", status.as_str().to_string());
    }
    if let Some(date) = f.date {
        c.push("date =", fmt_date(&date));
    }
    if let Some(from) = f.date_from {
        c.push("date >=", fmt_date(&from));
    }
    c
}

/// Appointments matching `filter`, latest slot first. With `date_from`
/// set the order flips to soonest first, which is what upcoming lists want.
pub fn list_appointments(
    conn: &Connection,
    filter: &AppointmentFilter,
    page: Page,
) -> Result<Vec<Appointment>, DatabaseError> {
    let c = appointment_conditions(filter);
    let order = if filter.date_from.is_some() {
        "date ASC, time ASC"
    } else {
        "date DESC, time DESC"
    };
    let idx = c.next_index();
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE 1=1{}
         ORDER BY {order} LIMIT ?{idx} OFFSET ?{}",
        c.sql(),
        idx + 1
    );
    let limit = page.limit as i64;
    let offset = page.offset as i64;
    let paging: [&dyn ToSql; 2] = [&limit, &offset];
    let params = c.params_with(&paging);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), row_to_appointment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_appointments(conn: &Connection, filter: &AppointmentFilter) -> Result<u32, DatabaseError> {
    let c = appointment_conditions(filter);
    let sql = format!("SELECT COUNT(*) FROM appointments WHERE 1=1{}", c.sql());
    let params = c.params_with(&[]);
    let count: u32 = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
    Ok(count)
}

/// Distinct patients that have ever booked with `doctor_id`.
pub fn count_patients_of_doctor(conn: &Connection, doctor_id: &Uuid) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(DISTINCT patient_id) FROM appointments WHERE doctor_id = ?1",
        params![doctor_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Compare-and-set on status: returns false when the row was no longer in `from`.
pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND status = ?4",
        params![
            to.as_str(),
            fmt_datetime(&super::now()),
            id.to_string(),
            from.as_str(),
        ],
    )?;
    Ok(updated == 1)
}

fn row_to_appointment(row: &rusqlite::Row) -> Result<Appointment, rusqlite::Error> {
    Ok(Appointment {
        id: uuid_at(row, 0)?,
        patient_id: uuid_at(row, 1)?,
        doctor_id: uuid_at(row, 2)?,
        date: date_at(row, 3)?,
        time: time_at(row, 4)?,
        status: enum_at(row, 5)?,
        appointment_type: row.get(6)?,
        reason: row.get(7)?,
        notes: row.get(8)?,
        created_at: datetime_at(row, 9)?,
        updated_at: datetime_at(row, 10)?,
    })
}
