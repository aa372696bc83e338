use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{date_at, datetime_at, fmt_date, fmt_datetime, opt_date_at, uuid_at, Conditions};
use crate::db::DatabaseError;
use crate::models::{MedicalRecord, MedicalRecordFilter, Page, Prescription};

const RECORD_COLUMNS: &str = "id, patient_id, doctor_id, diagnosis, symptoms, treatment,
     prescription, notes, visit_date, follow_up_date, created_at";

pub fn insert_medical_record(conn: &Connection, r: &MedicalRecord) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medical_records (id, patient_id, doctor_id, diagnosis, symptoms,
         treatment, prescription, notes, visit_date, follow_up_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            r.id.to_string(),
            r.patient_id.to_string(),
            r.doctor_id.to_string(),
            r.diagnosis,
            r.symptoms,
            r.treatment,
            r.prescription,
            r.notes,
            fmt_date(&r.visit_date),
            r.follow_up_date.as_ref().map(fmt_date),
            fmt_datetime(&r.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_medical_record(conn: &Connection, id: &Uuid) -> Result<Option<MedicalRecord>, DatabaseError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM medical_records WHERE id = ?1");
    let record = conn
        .query_row(&sql, params![id.to_string()], row_to_medical_record)
        .optional()?;
    Ok(record)
}

fn record_conditions(f: &MedicalRecordFilter) -> Conditions {
    let mut c = Conditions::default();
    if let Some(id) = f.patient_id {
        c.push("patient_id =", id.to_string());
    }
    if let Some(id) = f.doctor_id {
        c.push("doctor_id =", id.to_string());
    }
    c
}

/// Most recent visit first.
pub fn list_medical_records(
    conn: &Connection,
    filter: &MedicalRecordFilter,
    page: Page,
) -> Result<Vec<MedicalRecord>, DatabaseError> {
    let c = record_conditions(filter);
    let idx = c.next_index();
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM medical_records WHERE 1=1{}
         ORDER BY visit_date DESC, created_at DESC LIMIT ?{idx} OFFSET ?{}",
        c.sql(),
        idx + 1
    );
    let limit = page.limit as i64;
    let offset = page.offset as i64;
    let paging: [&dyn ToSql; 2] = [&limit, &offset];
    let params = c.params_with(&paging);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), row_to_medical_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_medical_records(conn: &Connection, filter: &MedicalRecordFilter) -> Result<u32, DatabaseError> {
    let c = record_conditions(filter);
    let sql = format!("SELECT COUNT(*) FROM medical_records WHERE 1=1{}", c.sql());
    let params = c.params_with(&[]);
    let count: u32 = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
    Ok(count)
}

fn row_to_medical_record(row: &rusqlite::Row) -> Result<MedicalRecord, rusqlite::Error> {
    Ok(MedicalRecord {
        id: uuid_at(row, 0)?,
        patient_id: uuid_at(row, 1)?,
        doctor_id: uuid_at(row, 2)?,
        diagnosis: row.get(3)?,
        symptoms: row.get(4)?,
        treatment: row.get(5)?,
        prescription: row.get(6)?,
        notes: row.get(7)?,
        visit_date: date_at(row, 8)?,
        follow_up_date: opt_date_at(row, 9)?,
        created_at: datetime_at(row, 10)?,
    })
}

// ── Prescriptions ────────────────────────────────────────

pub fn insert_prescription(conn: &Connection, p: &Prescription) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prescriptions (id, medical_record_id, medication_name, dosage,
         frequency, duration, instructions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            p.id.to_string(),
            p.medical_record_id.to_string(),
            p.medication_name,
            p.dosage,
            p.frequency,
            p.duration,
            p.instructions,
        ],
    )?;
    Ok(())
}

/// In insertion order.
pub fn get_prescriptions_for_record(
    conn: &Connection,
    record_id: &Uuid,
) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, medical_record_id, medication_name, dosage, frequency, duration, instructions
         FROM prescriptions WHERE medical_record_id = ?1 ORDER BY rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![record_id.to_string()], |row| {
            Ok(Prescription {
                id: uuid_at(row, 0)?,
                medical_record_id: uuid_at(row, 1)?,
                medication_name: row.get(2)?,
                dosage: row.get(3)?,
                frequency: row.get(4)?,
                duration: row.get(5)?,
                instructions: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::repository::{delete_user, insert_test_user, now};
    use crate::db::sqlite::open_memory_database;
    use crate::models::Role;

    fn record(patient: Uuid, doctor: Uuid, day: u32) -> MedicalRecord {
        MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: patient,
            doctor_id: doctor,
            diagnosis: "Hypertension".into(),
            symptoms: "Headache".into(),
            treatment: "Rest".into(),
            prescription: String::new(),
            notes: String::new(),
            visit_date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            follow_up_date: None,
            created_at: now(),
        }
    }

    #[test]
    fn records_scope_by_patient_and_doctor() {
        let conn = open_memory_database().unwrap();
        let p1 = insert_test_user(&conn, "p1", Role::Patient);
        let p2 = insert_test_user(&conn, "p2", Role::Patient);
        let d1 = insert_test_user(&conn, "d1", Role::Doctor);
        let d2 = insert_test_user(&conn, "d2", Role::Doctor);
        insert_medical_record(&conn, &record(p1.id, d1.id, 1)).unwrap();
        insert_medical_record(&conn, &record(p1.id, d2.id, 9)).unwrap();
        insert_medical_record(&conn, &record(p2.id, d1.id, 4)).unwrap();

        let p1_filter = MedicalRecordFilter { patient_id: Some(p1.id), doctor_id: None };
        let rows = list_medical_records(&conn, &p1_filter, Page::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.patient_id == p1.id));
        assert_eq!(rows[0].visit_date.format("%d").to_string(), "09");

        let d1_filter = MedicalRecordFilter { patient_id: None, doctor_id: Some(d1.id) };
        assert_eq!(count_medical_records(&conn, &d1_filter).unwrap(), 2);
    }

    #[test]
    fn prescriptions_attach_and_cascade() {
        let conn = open_memory_database().unwrap();
        let p = insert_test_user(&conn, "p", Role::Patient);
        let d = insert_test_user(&conn, "d", Role::Doctor);
        let r = record(p.id, d.id, 2);
        insert_medical_record(&conn, &r).unwrap();
        for name in ["Amlodipine", "Aspirin"] {
            insert_prescription(
                &conn,
                &Prescription {
                    id: Uuid::new_v4(),
                    medical_record_id: r.id,
                    medication_name: name.into(),
                    dosage: "5mg".into(),
                    frequency: "daily".into(),
                    duration: "30 days".into(),
                    instructions: String::new(),
                },
            )
            .unwrap();
        }
        let rx = get_prescriptions_for_record(&conn, &r.id).unwrap();
        assert_eq!(rx.len(), 2);
        assert_eq!(rx[0].medication_name, "Amlodipine");

        delete_user(&conn, &p.id).unwrap();
        assert!(get_medical_record(&conn, &r.id).unwrap().is_none());
        assert!(get_prescriptions_for_record(&conn, &r.id).unwrap().is_empty());
    }
}
