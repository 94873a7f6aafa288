use axum::extract::{Multipart, Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use super::{database_error, read_form, record_response, run_blocking, submit, RecordResponse};
use crate::api::response::{ApiError, AppQuery, JSend, JSendPaginated, Pagination};
use crate::catalog::{Painting, PaintingForm, Rubric};
use crate::file_works::HasFileAttachments;
use crate::form::{FormDefinition, FormWorkflow};
use crate::model::Model;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    20
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_painting(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<JSend<RecordResponse>>, ApiError> {
    let request = read_form(multipart, state.config.max_upload_size).await?;

    let painting = run_blocking(move || {
        let form = PaintingForm::new(state.config.storage.paintings_dir());
        let workflow = FormWorkflow::new(&form, &state.db, request)
            .with_file("path")
            .bind_parent_by_key::<Rubric>("rubric_id");
        submit(workflow)
    })
    .await?;

    tracing::debug!(painting_id = ?painting.key(), "Created painting");
    Ok(JSend::success(record_response(&painting)?))
}

pub async fn update_painting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    multipart: Multipart,
) -> Result<Json<JSend<RecordResponse>>, ApiError> {
    let request = read_form(multipart, state.config.max_upload_size).await?;

    let painting = run_blocking(move || {
        let form = PaintingForm::new(state.config.storage.paintings_dir());
        let existing = state
            .db
            .find_or_fail(form.make_model(), id)
            .map_err(database_error)?;
        let workflow = FormWorkflow::new(&form, &state.db, request)
            .with_file("path")
            .bind_existing_record(existing);
        submit(workflow)
    })
    .await?;

    tracing::debug!(painting_id = id, "Updated painting");
    Ok(JSend::success(record_response(&painting)?))
}

pub async fn get_painting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<JSend<RecordResponse>>, ApiError> {
    let painting = state
        .db
        .find(Painting::TABLE, id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Painting not found"))?;

    Ok(JSend::success(painting.into()))
}

pub async fn list_paintings(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<JSendPaginated<RecordResponse>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let paintings = state
        .db
        .all(Painting::TABLE)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let total = paintings.len() as u64;
    let items: Vec<RecordResponse> = paintings
        .into_iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .map(RecordResponse::from)
        .collect();

    Ok(JSendPaginated::success(
        items,
        Pagination {
            limit: params.limit,
            offset: params.offset,
            total,
        },
    ))
}

pub async fn delete_painting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<JSend<()>>, ApiError> {
    run_blocking(move || {
        let mut painting = state
            .db
            .find_or_fail(Painting::new(state.config.storage.paintings_dir()), id)
            .map_err(database_error)?;

        // Phase 1: Remove the record
        state
            .db
            .delete(Painting::TABLE, id)
            .map_err(|e| ApiError::internal(e.to_string()))?;

        // Phase 2: Remove attachments (best-effort)
        if painting.image().is_some() {
            let result = painting.files().and_then(|files| files.delete_all());
            if let Err(e) = result {
                tracing::warn!(painting_id = id, error = %e, "Failed to delete painting image");
            }
        }

        Ok(())
    })
    .await?;

    tracing::debug!(painting_id = id, "Deleted painting");
    Ok(JSend::success(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::create_rubric;
    use crate::api::response::AppJson;
    use crate::testutil::{multipart, multipart_body, multipart_in_frames, test_state};
    use serde_json::json;

    const BOUNDARY: &str = "paintingboundary";

    fn jpeg(len: usize) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.resize(len, 1);
        data
    }

    fn png(len: usize) -> Vec<u8> {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.resize(len, 2);
        data
    }

    async fn seed_rubric(state: &Arc<AppState>) -> u64 {
        let Json(response) = create_rubric(State(Arc::clone(state)), AppJson(json!({ "name": "Landscapes" })))
            .await
            .unwrap();
        response.data.id
    }

    #[tokio::test]
    async fn test_create_update_and_delete_painting() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        let rubric_id = seed_rubric(&state).await.to_string();

        let body = multipart_body(
            BOUNDARY,
            &[("name", "Foo"), ("name_en", "Foo"), ("rubric_id", &rubric_id)],
            &[("path", "foo.jpg", &jpeg(2048))],
        );
        let Json(created) = create_painting(State(Arc::clone(&state)), multipart(BOUNDARY, body).await)
            .await
            .unwrap();
        let id = created.data.id;
        let first_image = created.data.attributes["path"].as_str().unwrap().to_string();
        let first_path = state.config.storage.paintings_dir().join(&first_image);
        assert!(first_path.is_file());

        let body = multipart_body(
            BOUNDARY,
            &[("name", "Bar"), ("name_en", "Bar"), ("rubric_id", &rubric_id)],
            &[("path", "bar.png", &png(1024))],
        );
        let Json(updated) = update_painting(State(Arc::clone(&state)), Path(id), multipart(BOUNDARY, body).await)
            .await
            .unwrap();
        assert_eq!(updated.data.attributes["name"], json!("Bar"));
        let second_image = updated.data.attributes["path"].as_str().unwrap().to_string();
        assert!(second_image.ends_with(".png"));
        assert!(!first_path.exists());

        delete_painting(State(Arc::clone(&state)), Path(id)).await.unwrap();
        assert!(!state.config.storage.paintings_dir().join(second_image).exists());
        assert!(matches!(
            get_painting(State(Arc::clone(&state)), Path(id)).await,
            Err(ApiError::Fail(code, _)) if code == axum::http::StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_create_painting_with_unknown_rubric_is_invalid() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);

        let body = multipart_body(
            BOUNDARY,
            &[("name", "Foo"), ("name_en", "Foo"), ("rubric_id", "42")],
            &[("path", "foo.jpg", &jpeg(128))],
        );
        let result = create_painting(State(Arc::clone(&state)), multipart(BOUNDARY, body).await).await;

        match result {
            Err(ApiError::Invalid(errors)) => assert!(errors.has("rubric_id.exists")),
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(state.db.all(Painting::TABLE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_image_is_invalid() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        let rubric_id = seed_rubric(&state).await.to_string();

        let too_big = vec![0u8; state.config.max_upload_size as usize + 1];
        let body = multipart_body(
            BOUNDARY,
            &[("name", "Foo"), ("name_en", "Foo"), ("rubric_id", &rubric_id)],
            &[("path", "foo.jpg", &too_big)],
        );
        let result = create_painting(State(Arc::clone(&state)), multipart(BOUNDARY, body).await).await;

        match result {
            Err(ApiError::Invalid(errors)) => assert!(errors.has("path.uploaded")),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_image_over_body_limit_is_invalid() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);
        let rubric_id = seed_rubric(&state).await.to_string();

        let huge = jpeg(3 * 1024 * 1024);
        let body = multipart_body(
            BOUNDARY,
            &[("name", "Foo"), ("name_en", "Foo"), ("rubric_id", &rubric_id)],
            &[("path", "foo.jpg", &huge)],
        );
        let request = multipart_in_frames(BOUNDARY, body, 64 * 1024).await;
        let result = create_painting(State(Arc::clone(&state)), request).await;

        match result {
            Err(ApiError::Invalid(errors)) => {
                assert!(errors.has("path.uploaded"));
                assert_eq!(errors.len(), 1);
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert!(state.db.all(Painting::TABLE).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_paintings_rejects_zero_limit() {
        let temp = tempfile::tempdir().unwrap();
        let state = test_state(&temp);

        let result = list_paintings(
            State(state),
            AppQuery(ListParams {
                limit: 0,
                offset: 0,
            }),
        )
        .await;
        assert!(result.is_err());
    }
}
