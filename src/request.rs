//! The inbound request as seen by a form: submitted fields, uploaded files and
//! the raw upload status of every file part.

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde_json::Value;

use crate::model::Attributes;

/// Raw outcome of receiving a file part, decided before the body is parsed into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Ok,
    /// The part was larger than the server accepts; its bytes were discarded.
    ExceedsServerLimit,
    /// The part ended before its declared content did.
    Partial,
}

/// A file received with the current request. Lives only as long as the request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    original_name: String,
    data: Bytes,
    status: UploadStatus,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            original_name: original_name.into(),
            data: data.into(),
            status: UploadStatus::Ok,
        }
    }

    /// A placeholder for a part that could not be received intact.
    pub fn failed(original_name: impl Into<String>, status: UploadStatus) -> Self {
        Self {
            original_name: original_name.into(),
            data: Bytes::new(),
            status,
        }
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Extension of the client-supplied name, as sent (may be empty).
    pub fn original_extension(&self) -> &str {
        Path::new(&self.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
    }

    /// Extension matching the magic bytes of the content, if they are recognised.
    pub fn guessed_extension(&self) -> Option<&'static str> {
        infer::get(&self.data).map(|kind| kind.extension())
    }

    pub fn has_image_content(&self) -> bool {
        infer::is_image(&self.data)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status == UploadStatus::Ok
    }

    /// Write the uploaded bytes to `dir/name`. Refuses to overwrite an existing file
    /// and leaves nothing behind when the write fails.
    pub fn move_to(&self, dir: &Path, name: &str) -> io::Result<PathBuf> {
        let target = dir.join(name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)?;
        let written = file.write_all(&self.data).and_then(|()| file.sync_all());
        drop(file);
        discard_on_error(&target, written)?;
        Ok(target)
    }
}

/// Remove a half-written `target` if `result` is an error.
fn discard_on_error<T>(target: &Path, result: io::Result<T>) -> io::Result<T> {
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(target) {
            tracing::warn!(path = %target.display(), error = %e, "Failed to remove partial upload");
        }
    }
    result
}

/// Fields and files submitted with one request.
#[derive(Debug, Clone, Default)]
pub struct FormRequest {
    fields: Attributes,
    files: HashMap<String, UploadedFile>,
}

impl FormRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a request from a JSON object body. Non-object bodies yield no fields.
    pub fn from_json(body: Value) -> Self {
        let fields = match body {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Self {
            fields,
            files: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_field(name, value);
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: UploadedFile) -> Self {
        self.insert_file(name, file);
        self
    }

    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.insert(name.into(), file);
    }

    /// All submitted non-file fields.
    pub fn all(&self) -> &Attributes {
        &self.fields
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether a file part was received for `name`, intact or not.
    pub fn has_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    pub fn upload_status(&self, name: &str) -> Option<UploadStatus> {
        self.files.get(name).map(UploadedFile::status)
    }

    /// Whether `name` carries a non-blank value or any file part.
    pub fn filled(&self, name: &str) -> bool {
        if self.has_file(name) {
            return true;
        }
        match self.fields.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_original_extension() {
        assert_eq!(UploadedFile::new("cat.JPG", "x").original_extension(), "JPG");
        assert_eq!(UploadedFile::new("archive.tar.gz", "x").original_extension(), "gz");
        assert_eq!(UploadedFile::new("README", "x").original_extension(), "");
    }

    #[test]
    fn test_filled() {
        let request = FormRequest::new()
            .with_field("name", "Foo")
            .with_field("blank", "   ")
            .with_field("nothing", Value::Null)
            .with_file("path", UploadedFile::new("a.png", "x"));

        assert!(request.filled("name"));
        assert!(!request.filled("blank"));
        assert!(!request.filled("nothing"));
        assert!(!request.filled("missing"));
        assert!(request.filled("path"));
    }

    #[test]
    fn test_from_json_object() {
        let request = FormRequest::from_json(json!({ "name": "Landscapes", "order": 2 }));
        assert_eq!(request.input("name"), Some(&json!("Landscapes")));
        assert_eq!(request.input("order"), Some(&json!(2)));
        assert!(FormRequest::from_json(json!([1, 2])).all().is_empty());
    }

    #[test]
    fn test_move_to_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let file = UploadedFile::new("a.png", "data");

        let path = file.move_to(dir.path(), "a.png").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
        assert!(file.move_to(dir.path(), "a.png").is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("half.png");
        std::fs::write(&target, b"ha").unwrap();

        let failed: io::Result<()> = Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(discard_on_error(&target, failed).is_err());
        assert!(!target.exists());

        let kept = dir.path().join("whole.png");
        std::fs::write(&kept, b"whole").unwrap();
        discard_on_error(&kept, Ok(())).unwrap();
        assert!(kept.exists());
    }

    #[test]
    fn test_content_sniffing() {
        let png = UploadedFile::new("cat.jpg", b"\x89PNG\r\n\x1a\n0000".to_vec());
        assert_eq!(png.guessed_extension(), Some("png"));
        assert!(png.has_image_content());

        let text = UploadedFile::new("cat.jpg", "just some notes");
        assert_eq!(text.guessed_extension(), None);
        assert!(!text.has_image_content());
    }
}
