//! Portal accounts and their role profiles.
//!
//! A user is created together with exactly one profile matching its role
//! (none for administrators) inside a single transaction, so the two can
//! never drift apart.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, DatabaseError};
use crate::models::{
    DoctorProfile, NurseProfile, Page, PatientProfile, Role, RoleProfile, Shift, User, UserFilter,
};
use crate::validation::ValidationError;

const USERNAME_MAX: usize = 150;
const NAME_MAX: usize = 30;

// ═══════════════════════════════════════════
// Inputs
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Partial update of contact fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorProfileInput {
    pub specialization: String,
    pub license_number: Option<String>,
    #[serde(default)]
    pub years_of_experience: u32,
    #[serde(default)]
    pub consultation_fee_cents: i64,
    pub available_days: Option<String>,
    pub available_time_start: Option<NaiveTime>,
    pub available_time_end: Option<NaiveTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NurseProfileInput {
    pub department: String,
    pub shift: Shift,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientProfileInput {
    #[serde(default)]
    pub emergency_contact_name: String,
    #[serde(default)]
    pub emergency_contact_phone: String,
    #[serde(default)]
    pub blood_group: String,
    #[serde(default)]
    pub allergies: String,
    #[serde(default)]
    pub medical_history: String,
}

/// Body of a role-profile edit; `kind` must match the user's role.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoleProfileUpdate {
    Doctor(DoctorProfileInput),
    Nurse(NurseProfileInput),
    Patient(PatientProfileInput),
}

/// A user together with its role profile.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub full_name: String,
    pub profile: RoleProfile,
}

// ═══════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Already taken: {0}")]
    Conflict(String),
    #[error("User not found: {0}")]
    NotFound(Uuid),
    #[error("A {role} account has no {kind} profile")]
    ProfileMismatch { role: Role, kind: &'static str },
    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for AccountError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation(msg) => AccountError::Conflict(msg),
            other => AccountError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for AccountError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

// ═══════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════

fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.len() <= USERNAME_MAX
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

fn validate_names(v: &mut ValidationError, first: &str, last: &str) {
    v.check(first.chars().count() <= NAME_MAX, "first_name", "Ensure this value has at most 30 characters.");
    v.check(last.chars().count() <= NAME_MAX, "last_name", "Ensure this value has at most 30 characters.");
}

fn normalize_license(license: Option<String>) -> Option<String> {
    license
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

/// Create a user and, in the same transaction, the profile its role implies.
pub fn create_user(conn: &Connection, input: NewUser) -> Result<User, AccountError> {
    let mut v = ValidationError::new();
    let username = input.username.trim().to_string();
    let email = input.email.trim().to_lowercase();
    v.check(
        valid_username(&username),
        "username",
        "Required. 150 characters or fewer. Letters, digits and @/./+/-/_ only.",
    );
    v.check(valid_email(&email), "email", "Enter a valid email address.");
    validate_names(&mut v, &input.first_name, &input.last_name);
    v.into_result()?;

    let now = db::now();
    let user = User {
        id: Uuid::new_v4(),
        username,
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        email,
        role: input.role,
        phone: input.phone.filter(|p| !p.trim().is_empty()),
        date_of_birth: input.date_of_birth,
        address: input.address.filter(|a| !a.trim().is_empty()),
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    db::insert_user(&tx, &user)?;
    match user.role {
        Role::Doctor => db::upsert_doctor_profile(&tx, &default_doctor_profile(user.id))?,
        Role::Nurse => db::upsert_nurse_profile(&tx, &default_nurse_profile(user.id))?,
        Role::Patient => db::upsert_patient_profile(
            &tx,
            &PatientProfile {
                user_id: user.id,
                ..Default::default()
            },
        )?,
        Role::SuperAdmin => {}
    }
    tx.commit()?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    Ok(user)
}

fn default_doctor_profile(user_id: Uuid) -> DoctorProfile {
    DoctorProfile {
        user_id,
        specialization: String::new(),
        license_number: None,
        years_of_experience: 0,
        consultation_fee_cents: 0,
        available_days: "Monday-Friday".into(),
        available_time_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        available_time_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
    }
}

fn default_nurse_profile(user_id: Uuid) -> NurseProfile {
    NurseProfile {
        user_id,
        department: String::new(),
        shift: Shift::Morning,
        license_number: None,
    }
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<User, AccountError> {
    db::get_user(conn, id)?.ok_or(AccountError::NotFound(*id))
}

pub fn list_users(conn: &Connection, filter: &UserFilter, page: Page) -> Result<Vec<User>, AccountError> {
    Ok(db::list_users(conn, filter, page)?)
}

/// Deactivating a user also revokes its bearer tokens.
pub fn set_user_active(conn: &Connection, id: &Uuid, active: bool) -> Result<User, AccountError> {
    let tx = conn.unchecked_transaction()?;
    db::set_user_active(&tx, id, active).map_err(|e| match e {
        DatabaseError::NotFound { .. } => AccountError::NotFound(*id),
        other => other.into(),
    })?;
    if !active {
        db::revoke_user_tokens(&tx, id)?;
    }
    tx.commit()?;
    tracing::info!(user_id = %id, active, "User activity changed");
    get_user(conn, id)
}

pub fn update_contact(conn: &Connection, user_id: &Uuid, update: ContactUpdate) -> Result<User, AccountError> {
    let mut user = get_user(conn, user_id)?;
    if let Some(first) = update.first_name {
        user.first_name = first.trim().to_string();
    }
    if let Some(last) = update.last_name {
        user.last_name = last.trim().to_string();
    }
    if let Some(email) = update.email {
        user.email = email.trim().to_lowercase();
    }
    if let Some(phone) = update.phone {
        user.phone = Some(phone).filter(|p| !p.trim().is_empty());
    }
    if update.date_of_birth.is_some() {
        user.date_of_birth = update.date_of_birth;
    }
    if let Some(address) = update.address {
        user.address = Some(address).filter(|a| !a.trim().is_empty());
    }

    let mut v = ValidationError::new();
    v.check(valid_email(&user.email), "email", "Enter a valid email address.");
    validate_names(&mut v, &user.first_name, &user.last_name);
    if let Some(dob) = user.date_of_birth {
        v.check(dob <= db::now().date(), "date_of_birth", "Date of birth cannot be in the future.");
    }
    v.into_result()?;

    user.updated_at = db::now();
    db::update_user_contact(conn, &user)?;
    Ok(user)
}

fn require_role(user: &User, role: Role, kind: &'static str) -> Result<(), AccountError> {
    if user.role == role {
        Ok(())
    } else {
        Err(AccountError::ProfileMismatch { role: user.role, kind })
    }
}

pub fn update_doctor_profile(
    conn: &Connection,
    user: &User,
    input: DoctorProfileInput,
) -> Result<DoctorProfile, AccountError> {
    require_role(user, Role::Doctor, "doctor")?;
    let current = db::get_doctor_profile(conn, &user.id)?.unwrap_or_else(|| default_doctor_profile(user.id));
    let profile = DoctorProfile {
        user_id: user.id,
        specialization: input.specialization.trim().to_string(),
        license_number: normalize_license(input.license_number),
        years_of_experience: input.years_of_experience,
        consultation_fee_cents: input.consultation_fee_cents,
        available_days: input.available_days.unwrap_or(current.available_days),
        available_time_start: input.available_time_start.unwrap_or(current.available_time_start),
        available_time_end: input.available_time_end.unwrap_or(current.available_time_end),
    };

    let mut v = ValidationError::new();
    v.check(profile.consultation_fee_cents >= 0, "consultation_fee_cents", "Fee cannot be negative.");
    v.check(
        profile.available_time_start < profile.available_time_end,
        "available_time_end",
        "End of availability must be after its start.",
    );
    v.into_result()?;

    db::upsert_doctor_profile(conn, &profile)?;
    Ok(profile)
}

pub fn update_nurse_profile(
    conn: &Connection,
    user: &User,
    input: NurseProfileInput,
) -> Result<NurseProfile, AccountError> {
    require_role(user, Role::Nurse, "nurse")?;
    let profile = NurseProfile {
        user_id: user.id,
        department: input.department.trim().to_string(),
        shift: input.shift,
        license_number: normalize_license(input.license_number),
    };
    db::upsert_nurse_profile(conn, &profile)?;
    Ok(profile)
}

pub fn update_patient_profile(
    conn: &Connection,
    user: &User,
    input: PatientProfileInput,
) -> Result<PatientProfile, AccountError> {
    require_role(user, Role::Patient, "patient")?;
    let profile = PatientProfile {
        user_id: user.id,
        emergency_contact_name: input.emergency_contact_name.trim().to_string(),
        emergency_contact_phone: input.emergency_contact_phone.trim().to_string(),
        blood_group: input.blood_group.trim().to_string(),
        allergies: input.allergies,
        medical_history: input.medical_history,
    };
    db::upsert_patient_profile(conn, &profile)?;
    Ok(profile)
}

pub fn update_role_profile(
    conn: &Connection,
    user: &User,
    update: RoleProfileUpdate,
) -> Result<RoleProfile, AccountError> {
    Ok(match update {
        RoleProfileUpdate::Doctor(input) => RoleProfile::Doctor(update_doctor_profile(conn, user, input)?),
        RoleProfileUpdate::Nurse(input) => RoleProfile::Nurse(update_nurse_profile(conn, user, input)?),
        RoleProfileUpdate::Patient(input) => RoleProfile::Patient(update_patient_profile(conn, user, input)?),
    })
}

/// The profile attached to `user`; `None` for administrators.
pub fn get_profile(conn: &Connection, user: &User) -> Result<RoleProfile, AccountError> {
    let profile = match user.role {
        Role::Doctor => db::get_doctor_profile(conn, &user.id)?.map(RoleProfile::Doctor),
        Role::Nurse => db::get_nurse_profile(conn, &user.id)?.map(RoleProfile::Nurse),
        Role::Patient => db::get_patient_profile(conn, &user.id)?.map(RoleProfile::Patient),
        Role::SuperAdmin => None,
    };
    Ok(profile.unwrap_or(RoleProfile::None))
}

pub fn get_user_detail(conn: &Connection, id: &Uuid) -> Result<UserDetail, AccountError> {
    let user = get_user(conn, id)?;
    let profile = get_profile(conn, &user)?;
    Ok(UserDetail {
        full_name: user.full_name(),
        user,
        profile,
    })
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
pub(crate) fn new_user(username: &str, role: Role) -> NewUser {
    NewUser {
        username: username.into(),
        email: format!("{username}@medora.test"),
        role,
        first_name: username.into(),
        last_name: "Tester".into(),
        phone: None,
        date_of_birth: None,
        address: None,
    }
}
