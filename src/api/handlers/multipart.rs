use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::BytesMut;

use crate::api::response::ApiError;
use crate::request::{FormRequest, UploadStatus, UploadedFile};

/// Read a multipart body into a [`FormRequest`].
///
/// File parts larger than `max_upload_size` are drained without being kept and
/// are recorded as [`UploadStatus::ExceedsServerLimit`]. A part that breaks off
/// mid-stream is recorded as [`UploadStatus::Partial`] and ends intake. Hitting
/// the request body limit also ends intake: the part being read is recorded as
/// [`UploadStatus::ExceedsServerLimit`] and the fields read so far are kept.
/// Empty file inputs are treated as absent.
pub async fn read_form(mut multipart: Multipart, max_upload_size: u64) -> Result<FormRequest, ApiError> {
    let mut request = FormRequest::new();

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if exceeds_body_limit(&e) => {
                tracing::warn!(error = %e, "Request body limit reached between parts");
                break;
            }
            Err(e) => return Err(ApiError::bad_request(format!("Invalid multipart data: {e}"))),
        };

        let name = field.name().unwrap_or("").to_string();
        if name.is_empty() {
            continue;
        }

        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            match field.text().await {
                Ok(value) => request.insert_field(name, value),
                Err(e) if exceeds_body_limit(&e) => {
                    tracing::warn!(field = %name, error = %e, "Request body limit reached in a field");
                    break;
                }
                Err(e) => return Err(ApiError::bad_request(format!("Invalid {name}: {e}"))),
            }
            continue;
        };

        let mut buf = BytesMut::new();
        let mut status = UploadStatus::Ok;
        let mut ended_cleanly = true;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if status == UploadStatus::ExceedsServerLimit {
                        continue;
                    }
                    if (buf.len() + chunk.len()) as u64 > max_upload_size {
                        status = UploadStatus::ExceedsServerLimit;
                        buf.clear();
                        continue;
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) if exceeds_body_limit(&e) => {
                    tracing::warn!(field = %name, error = %e, "Upload exceeds request body limit");
                    status = UploadStatus::ExceedsServerLimit;
                    ended_cleanly = false;
                    buf.clear();
                    break;
                }
                Err(e) => {
                    tracing::warn!(field = %name, error = %e, "Upload broke off");
                    status = UploadStatus::Partial;
                    ended_cleanly = false;
                    break;
                }
            }
        }

        if file_name.is_empty() && buf.is_empty() && status == UploadStatus::Ok {
            continue;
        }

        let file = match status {
            UploadStatus::Ok => UploadedFile::new(file_name, buf.freeze()),
            failed => {
                tracing::debug!(field = %name, status = ?failed, "Discarded upload");
                UploadedFile::failed(file_name, failed)
            }
        };
        request.insert_file(name, file);

        // the stream is unusable past a broken or cut-off part
        if !ended_cleanly {
            break;
        }
    }

    Ok(request)
}

fn exceeds_body_limit(e: &MultipartError) -> bool {
    e.status() == StatusCode::PAYLOAD_TOO_LARGE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{multipart, multipart_body, multipart_in_frames};
    use serde_json::json;

    const BOUNDARY: &str = "XBOUNDARYX";

    #[tokio::test]
    async fn test_reads_fields_and_files() {
        let body = multipart_body(
            BOUNDARY,
            &[("name", "Foo"), ("rubric_id", "3")],
            &[("path", "cat.JPG", b"jpegbytes")],
        );
        let request = read_form(multipart(BOUNDARY, body).await, 1024).await.unwrap();

        assert_eq!(request.input("name"), Some(&json!("Foo")));
        assert_eq!(request.input("rubric_id"), Some(&json!("3")));
        let file = request.file("path").unwrap();
        assert!(file.is_valid());
        assert_eq!(file.original_name(), "cat.JPG");
        assert_eq!(file.size(), 9);
    }

    #[tokio::test]
    async fn test_oversized_file_is_flagged_not_kept() {
        let big = vec![7u8; 2048];
        let body = multipart_body(BOUNDARY, &[("name", "Foo")], &[("path", "big.png", &big)]);
        let request = read_form(multipart(BOUNDARY, body).await, 1024).await.unwrap();

        let file = request.file("path").unwrap();
        assert_eq!(file.status(), UploadStatus::ExceedsServerLimit);
        assert_eq!(file.size(), 0);
        assert_eq!(request.input("name"), Some(&json!("Foo")));
    }

    #[tokio::test]
    async fn test_part_over_body_limit_is_flagged_not_rejected() {
        // larger than axum's default 2 MiB body limit
        let huge = vec![7u8; 3 * 1024 * 1024];
        let body = multipart_body(BOUNDARY, &[("name", "Foo")], &[("path", "huge.jpg", &huge)]);
        let request = read_form(multipart_in_frames(BOUNDARY, body, 64 * 1024).await, 1024)
            .await
            .unwrap();

        assert_eq!(request.upload_status("path"), Some(UploadStatus::ExceedsServerLimit));
        assert_eq!(request.file("path").unwrap().size(), 0);
        assert_eq!(request.input("name"), Some(&json!("Foo")));
    }

    #[tokio::test]
    async fn test_empty_file_input_is_absent() {
        let body = multipart_body(BOUNDARY, &[("name", "Foo")], &[("path", "", b"")]);
        let request = read_form(multipart(BOUNDARY, body).await, 1024).await.unwrap();

        assert!(!request.has_file("path"));
    }
}
