use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use super::{record_response, run_blocking, submit, RecordResponse};
use crate::api::response::{ApiError, AppJson, JSend};
use crate::catalog::{Rubric, RubricForm};
use crate::form::FormWorkflow;
use crate::model::Model;
use crate::request::FormRequest;
use crate::AppState;

pub async fn create_rubric(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<serde_json::Value>,
) -> Result<Json<JSend<RecordResponse>>, ApiError> {
    let request = FormRequest::from_json(body);

    let rubric = run_blocking(move || {
        let workflow = FormWorkflow::new(&RubricForm, &state.db, request);
        submit(workflow)
    })
    .await?;

    tracing::debug!(rubric_id = ?rubric.key(), "Created rubric");
    Ok(JSend::success(record_response(&rubric)?))
}

pub async fn list_rubrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<Vec<RecordResponse>>>, ApiError> {
    let rubrics = state
        .db
        .all(Rubric::TABLE)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(JSend::success(
        rubrics.into_iter().map(RecordResponse::from).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_state;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_list_rubrics() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);

        let Json(created) = create_rubric(State(Arc::clone(&state)), AppJson(json!({ "name": "Portraits" })))
            .await
            .unwrap();
        assert_eq!(created.data.id, 1);
        assert_eq!(created.data.attributes["name"], json!("Portraits"));

        let Json(listed) = list_rubrics(State(Arc::clone(&state))).await.unwrap();
        assert_eq!(listed.data.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_rubric_name_is_invalid() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);

        create_rubric(State(Arc::clone(&state)), AppJson(json!({ "name": "Portraits" })))
            .await
            .unwrap();
        let result = create_rubric(State(Arc::clone(&state)), AppJson(json!({ "name": "Portraits" }))).await;

        match result {
            Err(ApiError::Invalid(errors)) => assert!(errors.has("name.unique")),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }
}
