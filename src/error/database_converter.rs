use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

use crate::error::AppError;

/// Converts Diesel errors into `AppError` variants.
///
/// Constraint violations that a caller can cause (a record for a user that
/// does not exist, a missing column value) become `Validation` errors named
/// after the offending column; everything else is a `Database` error.
pub struct DatabaseErrorConverter;

impl DatabaseErrorConverter {
    pub fn convert_diesel_error(error: DieselError, operation: &str) -> AppError {
        match error {
            DieselError::DatabaseError(kind, info) => {
                Self::convert_database_error(kind, info.as_ref(), operation)
            }
            DieselError::NotFound => AppError::NotFound {
                entity: "resource".to_string(),
                field: "id".to_string(),
                value: "unknown".to_string(),
            },
            other => AppError::Database {
                operation: operation.to_string(),
                source: anyhow::Error::from(other),
            },
        }
    }

    fn convert_database_error(
        kind: DatabaseErrorKind,
        info: &(dyn DatabaseErrorInformation + Send + Sync),
        operation: &str,
    ) -> AppError {
        match kind {
            DatabaseErrorKind::ForeignKeyViolation => {
                let field = info
                    .constraint_name()
                    .and_then(foreign_key_column)
                    .or_else(|| info.column_name().map(str::to_string));
                match field {
                    Some(field) => AppError::Validation {
                        reason: format!("Invalid reference in {}", field),
                        field,
                    },
                    None => Self::opaque(operation, "Foreign key constraint violation", info),
                }
            }
            DatabaseErrorKind::NotNullViolation => match info.column_name() {
                Some(column) => AppError::Validation {
                    field: column.to_string(),
                    reason: format!(
                        "Field is required for {}",
                        info.table_name().unwrap_or("record")
                    ),
                },
                None => Self::opaque(operation, "Not null constraint violation", info),
            },
            DatabaseErrorKind::CheckViolation => match info.constraint_name() {
                Some(constraint) => AppError::Validation {
                    field: constraint.to_string(),
                    reason: "Check constraint failed".to_string(),
                },
                None => Self::opaque(operation, "Check constraint violation", info),
            },
            DatabaseErrorKind::UniqueViolation => {
                Self::opaque(operation, "Unique constraint violation", info)
            }
            _ => Self::opaque(operation, "Database error", info),
        }
    }

    fn opaque(
        operation: &str,
        label: &str,
        info: &(dyn DatabaseErrorInformation + Send + Sync),
    ) -> AppError {
        AppError::Database {
            operation: operation.to_string(),
            source: anyhow::Error::msg(format!("{}: {}", label, info.message())),
        }
    }
}

/// Column of a Postgres default foreign key name:
/// `time_records_user_id_fkey` -> `user_id`.
fn foreign_key_column(constraint: &str) -> Option<String> {
    let stem = constraint.strip_suffix("_fkey")?;
    let (rest, last) = stem.rsplit_once('_')?;
    if last != "id" {
        return Some(last.to_string());
    }
    let column = rest.rsplit_once('_').map_or(rest, |(_, column)| column);
    Some(format!("{}_id", column))
}
