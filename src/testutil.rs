//! Shared test helpers for post-form unit tests.

use std::sync::Arc;

use crate::config::{Config, NodeConfig, StorageConfig};
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState with a temporary database and uploads directory.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let uploads_dir = temp_dir.path().join("uploads");

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        storage: StorageConfig {
            uploads_dir: uploads_dir.to_string_lossy().to_string(),
        },
        test_mode: true,
        max_upload_size: 64 * 1024, // 64KB for tests
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    std::fs::create_dir_all(config.storage.paintings_dir())
        .expect("Failed to create test uploads directory");

    Arc::new(AppState { config, db })
}

/// A multipart body with the given text fields and `(field, file name, bytes)` file parts.
pub fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// Build the `Multipart` extractor for a body made by [`multipart_body`].
pub async fn multipart(boundary: &str, body: Vec<u8>) -> axum::extract::Multipart {
    multipart_from(boundary, axum::body::Body::from(body)).await
}

/// Like [`multipart`], but the body arrives as a stream of `frame_size` chunks,
/// the way a large upload reaches a handler.
pub async fn multipart_in_frames(
    boundary: &str,
    body: Vec<u8>,
    frame_size: usize,
) -> axum::extract::Multipart {
    let frames: Vec<Result<bytes::Bytes, std::io::Error>> = body
        .chunks(frame_size)
        .map(|chunk| Ok(bytes::Bytes::copy_from_slice(chunk)))
        .collect();
    let body = axum::body::Body::from_stream(tokio_stream::iter(frames));
    multipart_from(boundary, body).await
}

async fn multipart_from(boundary: &str, body: axum::body::Body) -> axum::extract::Multipart {
    use axum::extract::FromRequest;

    let request = axum::http::Request::builder()
        .method("POST")
        .header(
            axum::http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(body)
        .expect("valid request");

    // No limit layer is installed, so axum's default body limit (2 MiB) applies.
    axum::extract::Multipart::from_request(request, &())
        .await
        .expect("multipart request")
}
