use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_at, fmt_time, time_at, uuid_at};
use crate::db::DatabaseError;
use crate::models::{DoctorProfile, NurseProfile, PatientProfile};

// ── Doctor ───────────────────────────────────────────────

/// Insert or replace the doctor profile keyed by `user_id`.
pub fn upsert_doctor_profile(conn: &Connection, p: &DoctorProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctor_profiles (user_id, specialization, license_number,
         years_of_experience, consultation_fee_cents, available_days,
         available_time_start, available_time_end)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(user_id) DO UPDATE SET
           specialization = excluded.specialization,
           license_number = excluded.license_number,
           years_of_experience = excluded.years_of_experience,
           consultation_fee_cents = excluded.consultation_fee_cents,
           available_days = excluded.available_days,
           available_time_start = excluded.available_time_start,
           available_time_end = excluded.available_time_end",
        params![
            p.user_id.to_string(),
            p.specialization,
            p.license_number,
            p.years_of_experience,
            p.consultation_fee_cents,
            p.available_days,
            fmt_time(&p.available_time_start),
            fmt_time(&p.available_time_end),
        ],
    )?;
    Ok(())
}

pub fn get_doctor_profile(conn: &Connection, user_id: &Uuid) -> Result<Option<DoctorProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            "SELECT user_id, specialization, license_number, years_of_experience,
                    consultation_fee_cents, available_days, available_time_start,
                    available_time_end
             FROM doctor_profiles WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok(DoctorProfile {
                    user_id: uuid_at(row, 0)?,
                    specialization: row.get(1)?,
                    license_number: row.get(2)?,
                    years_of_experience: row.get(3)?,
                    consultation_fee_cents: row.get(4)?,
                    available_days: row.get(5)?,
                    available_time_start: time_at(row, 6)?,
                    available_time_end: time_at(row, 7)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

// ── Nurse ────────────────────────────────────────────────

pub fn upsert_nurse_profile(conn: &Connection, p: &NurseProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO nurse_profiles (user_id, department, shift, license_number)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
           department = excluded.department,
           shift = excluded.shift,
           license_number = excluded.license_number",
        params![
            p.user_id.to_string(),
            p.department,
            p.shift.as_str(),
            p.license_number,
        ],
    )?;
    Ok(())
}

pub fn get_nurse_profile(conn: &Connection, user_id: &Uuid) -> Result<Option<NurseProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            "SELECT user_id, department, shift, license_number
             FROM nurse_profiles WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok(NurseProfile {
                    user_id: uuid_at(row, 0)?,
                    department: row.get(1)?,
                    shift: enum_at(row, 2)?,
                    license_number: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

// ── Patient ──────────────────────────────────────────────

pub fn upsert_patient_profile(conn: &Connection, p: &PatientProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patient_profiles (user_id, emergency_contact_name,
         emergency_contact_phone, blood_group, allergies, medical_history)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
           emergency_contact_name = excluded.emergency_contact_name,
           emergency_contact_phone = excluded.emergency_contact_phone,
           blood_group = excluded.blood_group,
           allergies = excluded.allergies,
           medical_history = excluded.medical_history",
        params![
            p.user_id.to_string(),
            p.emergency_contact_name,
            p.emergency_contact_phone,
            p.blood_group,
            p.allergies,
            p.medical_history,
        ],
    )?;
    Ok(())
}

pub fn get_patient_profile(conn: &Connection, user_id: &Uuid) -> Result<Option<PatientProfile>, DatabaseError> {
    let profile = conn
        .query_row(
            "SELECT user_id, emergency_contact_name, emergency_contact_phone,
                    blood_group, allergies, medical_history
             FROM patient_profiles WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok(PatientProfile {
                    user_id: uuid_at(row, 0)?,
                    emergency_contact_name: row.get(1)?,
                    emergency_contact_phone: row.get(2)?,
                    blood_group: row.get(3)?,
                    allergies: row.get(4)?,
                    medical_history: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

/// Number of profile rows of any kind attached to `user_id`.
pub fn count_profiles(conn: &Connection, user_id: &Uuid) -> Result<u32, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM doctor_profiles WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM nurse_profiles WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM patient_profiles WHERE user_id = ?1)",
        params![user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::db::repository::insert_test_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::{Role, Shift};

    fn doctor_profile(user_id: Uuid, license: Option<&str>) -> DoctorProfile {
        DoctorProfile {
            user_id,
            specialization: "Cardiology".into(),
            license_number: license.map(String::from),
            years_of_experience: 7,
            consultation_fee_cents: 15_000,
            available_days: "Monday-Friday".into(),
            available_time_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            available_time_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }
    }

    #[test]
    fn doctor_profile_upsert_updates_in_place() {
        let conn = open_memory_database().unwrap();
        let doc = insert_test_user(&conn, "doc", Role::Doctor);
        upsert_doctor_profile(&conn, &doctor_profile(doc.id, None)).unwrap();

        let mut p = get_doctor_profile(&conn, &doc.id).unwrap().unwrap();
        assert!(p.license_number.is_none());
        p.license_number = Some("MD-1".into());
        p.years_of_experience = 8;
        upsert_doctor_profile(&conn, &p).unwrap();

        let loaded = get_doctor_profile(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.license_number.as_deref(), Some("MD-1"));
        assert_eq!(loaded.years_of_experience, 8);
        assert_eq!(count_profiles(&conn, &doc.id).unwrap(), 1);
    }

    #[test]
    fn doctor_license_is_unique() {
        let conn = open_memory_database().unwrap();
        let a = insert_test_user(&conn, "a", Role::Doctor);
        let b = insert_test_user(&conn, "b", Role::Doctor);
        upsert_doctor_profile(&conn, &doctor_profile(a.id, Some("MD-9"))).unwrap();
        let err = upsert_doctor_profile(&conn, &doctor_profile(b.id, Some("MD-9"))).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn unset_licenses_do_not_collide() {
        let conn = open_memory_database().unwrap();
        let a = insert_test_user(&conn, "na", Role::Nurse);
        let b = insert_test_user(&conn, "nb", Role::Nurse);
        for id in [a.id, b.id] {
            upsert_nurse_profile(
                &conn,
                &NurseProfile { user_id: id, department: "ER".into(), shift: Shift::Night, license_number: None },
            )
            .unwrap();
        }
        let loaded = get_nurse_profile(&conn, &b.id).unwrap().unwrap();
        assert_eq!(loaded.shift, Shift::Night);
    }

    #[test]
    fn patient_profile_round_trip() {
        let conn = open_memory_database().unwrap();
        let p = insert_test_user(&conn, "pat", Role::Patient);
        let profile = PatientProfile {
            user_id: p.id,
            blood_group: "O+".into(),
            allergies: "Penicillin".into(),
            ..Default::default()
        };
        upsert_patient_profile(&conn, &profile).unwrap();
        let loaded = get_patient_profile(&conn, &p.id).unwrap().unwrap();
        assert_eq!(loaded.blood_group, "O+");
        assert_eq!(loaded.allergies, "Penicillin");
        assert!(get_doctor_profile(&conn, &p.id).unwrap().is_none());
    }
}
