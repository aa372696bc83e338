pub mod alert;
pub mod appointment;
pub mod enums;
pub mod filters;
pub mod medical_record;
pub mod notification;
pub mod profile;
pub mod task;
pub mod user;
pub mod vital_sign;

pub use alert::*;
pub use appointment::*;
pub use enums::*;
pub use filters::*;
pub use medical_record::*;
pub use notification::*;
pub use profile::*;
pub use task::*;
pub use user::*;
pub use vital_sign::*;
