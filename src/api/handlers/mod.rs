mod admin;
mod multipart;
mod paintings;
mod rubrics;

use serde::Serialize;

use crate::api::response::ApiError;
use crate::form::{FormDefinition, FormError, FormWorkflow};
use crate::model::{Attributes, Model};
use crate::storage::models::StoredRecord;
use crate::storage::DatabaseError;

pub use admin::{admin_purge, health};
pub use multipart::read_form;
pub use paintings::{create_painting, delete_painting, get_painting, list_paintings, update_painting};
pub use rubrics::{create_rubric, list_rubrics};

#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub id: u64,
    pub attributes: Attributes,
}

impl From<StoredRecord> for RecordResponse {
    fn from(record: StoredRecord) -> Self {
        Self {
            id: record.id,
            attributes: record.attributes,
        }
    }
}

fn record_response<M: Model>(model: &M) -> Result<RecordResponse, ApiError> {
    let id = model
        .key()
        .ok_or_else(|| ApiError::internal("Record has no id after saving"))?;
    Ok(RecordResponse {
        id,
        attributes: model.attributes().clone(),
    })
}

/// Run synchronous form/storage work on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ApiError::internal(format!("Form task failed: {e}")))?
}

/// Persist a workflow, turning invalid input into a 422 and returning the saved record.
fn submit<D: FormDefinition>(mut workflow: FormWorkflow<'_, D>) -> Result<D::Model, ApiError> {
    if !workflow.persist().map_err(form_error)? {
        let errors = workflow.take_validation_errors().unwrap_or_default();
        return Err(ApiError::invalid(errors));
    }

    workflow
        .into_model()
        .ok_or_else(|| ApiError::internal("Form persisted without a record"))
}

/// Map a FormError to an ApiError
fn form_error(e: FormError) -> ApiError {
    match e {
        FormError::Upload { .. } => ApiError::bad_request(e.to_string()),
        FormError::NotFound(message) => ApiError::not_found(message),
        other => {
            tracing::error!(error = %other, config = other.is_config(), "Form submission failed");
            ApiError::internal(other.to_string())
        }
    }
}

/// Map a DatabaseError to an ApiError
fn database_error(e: DatabaseError) -> ApiError {
    match e {
        DatabaseError::NotFound { .. } => ApiError::not_found("Record not found"),
        other => ApiError::internal(other.to_string()),
    }
}
