use rusqlite::types::ToSql;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{datetime_at, fmt_datetime, uuid_at, Conditions};
use crate::db::DatabaseError;
use crate::models::{Page, VitalSigns, VitalSignsFilter};

const VITALS_COLUMNS: &str = "id, patient_id, recorded_by, blood_pressure_systolic,
     blood_pressure_diastolic, heart_rate, temperature, oxygen_saturation,
     weight, height, notes, recorded_at";

pub fn insert_vital_signs(conn: &Connection, v: &VitalSigns) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO vital_signs (id, patient_id, recorded_by, blood_pressure_systolic,
         blood_pressure_diastolic, heart_rate, temperature, oxygen_saturation,
         weight, height, notes, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            v.id.to_string(),
            v.patient_id.to_string(),
            v.recorded_by.to_string(),
            v.blood_pressure_systolic,
            v.blood_pressure_diastolic,
            v.heart_rate,
            v.temperature,
            v.oxygen_saturation,
            v.weight,
            v.height,
            v.notes,
            fmt_datetime(&v.recorded_at),
        ],
    )?;
    Ok(())
}

/// Newest measurement first.
pub fn list_vital_signs(
    conn: &Connection,
    filter: &VitalSignsFilter,
    page: Page,
) -> Result<Vec<VitalSigns>, DatabaseError> {
    let mut c = Conditions::default();
    if let Some(id) = filter.patient_id {
        c.push("patient_id =", id.to_string());
    }
    let idx = c.next_index();
    let sql = format!(
        "SELECT {VITALS_COLUMNS} FROM vital_signs WHERE 1=1{}
         ORDER BY recorded_at DESC, rowid DESC LIMIT ?{idx} OFFSET ?{}",
        c.sql(),
        idx + 1
    );
    let limit = page.limit as i64;
    let offset = page.offset as i64;
    let paging: [&dyn ToSql; 2] = [&limit, &offset];
    let params = c.params_with(&paging);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), row_to_vital_signs)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn latest_vital_signs(conn: &Connection, patient_id: &Uuid) -> Result<Option<VitalSigns>, DatabaseError> {
    let filter = VitalSignsFilter { patient_id: Some(*patient_id) };
    Ok(list_vital_signs(conn, &filter, Page::first(1))?.into_iter().next())
}

fn row_to_vital_signs(row: &rusqlite::Row) -> Result<VitalSigns, rusqlite::Error> {
    Ok(VitalSigns {
        id: uuid_at(row, 0)?,
        patient_id: uuid_at(row, 1)?,
        recorded_by: uuid_at(row, 2)?,
        blood_pressure_systolic: row.get(3)?,
        blood_pressure_diastolic: row.get(4)?,
        heart_rate: row.get(5)?,
        temperature: row.get(6)?,
        oxygen_saturation: row.get(7)?,
        weight: row.get(8)?,
        height: row.get(9)?,
        notes: row.get(10)?,
        recorded_at: datetime_at(row, 11)?,
    })
}
