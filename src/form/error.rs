use thiserror::Error;

use crate::file_works::FileWorksError;
use crate::request::UploadStatus;
use crate::storage::DatabaseError;

/// Failures of [`super::FormWorkflow::persist`]. Invalid input is not among them:
/// it makes `persist` return `Ok(false)` instead.
#[derive(Debug, Error)]
pub enum FormError {
    /// Programmer mistake in a form, record or rule definition.
    #[error("Form misconfigured: {0}")]
    Config(String),
    #[error("{field} file has been uploaded with errors ({status:?})")]
    Upload { field: String, status: UploadStatus },
    #[error("{0}")]
    NotFound(String),
    #[error("Could not save the record: {0}")]
    Persistence(String),
    #[error(transparent)]
    Files(FileWorksError),
    #[error(transparent)]
    Database(DatabaseError),
}

impl FormError {
    pub fn is_config(&self) -> bool {
        matches!(self, FormError::Config(_))
    }
}

impl From<FileWorksError> for FormError {
    fn from(e: FileWorksError) -> Self {
        match e {
            FileWorksError::Config(message) => FormError::Config(message),
            other => FormError::Files(other),
        }
    }
}

impl From<DatabaseError> for FormError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { table, key } => {
                FormError::NotFound(format!("No record {key} in {table}"))
            }
            other => FormError::Database(other),
        }
    }
}
