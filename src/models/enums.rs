use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            pub const ALL: &'static [$name] = &[$(Self::$variant),+];
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    SuperAdmin => "super_admin",
    Doctor => "doctor",
    Nurse => "nurse",
    Patient => "patient",
});

impl Role {
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Doctor | Role::Nurse)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "Super Admin",
            Role::Doctor => "Doctor",
            Role::Nurse => "Nurse",
            Role::Patient => "Patient",
        }
    }
}

str_enum!(Shift {
    Morning => "morning",
    Evening => "evening",
    Night => "night",
});

str_enum!(AppointmentStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl AppointmentStatus {
    /// Legal lifecycle edges. Rejected, completed and cancelled are terminal.
    pub fn can_transition_to(&self, target: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, target),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Completed)
                | (Approved, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }
}

str_enum!(TaskPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

str_enum!(TaskStatus {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
});

impl TaskStatus {
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, target),
            (Pending, InProgress) | (Pending, Completed) | (InProgress, Completed)
        )
    }
}

str_enum!(NotificationType {
    Info => "info",
    Success => "success",
    Warning => "warning",
    Error => "error",
    Appointment => "appointment",
    Prescription => "prescription",
    Task => "task",
});

str_enum!(AlertType {
    Info => "info",
    Warning => "warning",
    Error => "error",
    Success => "success",
});
