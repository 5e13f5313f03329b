mod pagination;
mod time_record;
mod user;

pub use pagination::{Page, TimeRecordFilters};
pub use time_record::{
    CanRecordStatus, NewTimeRecord, NewTimeRecordRow, TimeRecord, TimeRecordEntry, TimeRecordRow,
};
pub use user::{Role, User, UserRow};
