//! On-disk lifecycle of the files attached to a record.

mod capability;

pub use capability::{FilesInfo, HasFileAttachments};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::model::Model;
use crate::request::UploadedFile;

#[derive(Debug, Error)]
pub enum FileWorksError {
    #[error("Invalid file configuration: {0}")]
    Config(String),
    #[error("No upload directory configured for field '{0}'")]
    UnknownField(String),
    #[error("No stored file name for field '{0}'")]
    MissingFileName(String),
    #[error("File extension cannot be empty")]
    EmptyExtension,
    #[error("Upload directory for field '{0}' cannot be empty")]
    EmptyUploadDir(String),
    #[error("Upload directory {} does not exist", .0.display())]
    MissingUploadDir(PathBuf),
    #[error("Failed to move upload to {}: {source}", .path.display())]
    Move {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} has not been saved as a readable file", .0.display())]
    Unreadable(PathBuf),
    #[error("{} was not deleted despite an attempt", .0.display())]
    NotDeleted(PathBuf),
    #[error("{} was not found or is not writable, nothing deleted", .0.display())]
    NotDetected(PathBuf),
}

/// Validated file configuration of one record type.
///
/// Operations take the record they act on; [`Attachments`] pairs a manager with
/// the record that vended it.
#[derive(Debug, Clone)]
pub struct FileManager {
    files_info: FilesInfo,
}

impl FileManager {
    /// Read and check the record's file configuration. No filesystem access happens here.
    pub fn new<R: HasFileAttachments>(record: &R) -> Result<Self, FileWorksError> {
        let files_info = record.files_info();

        if files_info.is_empty() {
            return Err(FileWorksError::Config(format!(
                "{} declares no file fields",
                R::TABLE
            )));
        }

        if let Some(field) = files_info.keys().find(|f| R::FILLABLE.contains(*f)) {
            return Err(FileWorksError::Config(format!(
                "file field '{field}' of {} must not be mass-assignable",
                R::TABLE
            )));
        }

        Ok(Self { files_info })
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.files_info.keys().copied()
    }

    pub fn upload_dir(&self, field: &str) -> Result<&Path, FileWorksError> {
        self.files_info
            .get(field)
            .map(PathBuf::as_path)
            .ok_or_else(|| FileWorksError::UnknownField(field.to_string()))
    }

    /// Upload directory joined with the file name currently stored on the record.
    pub fn resolve_path<R: Model>(&self, record: &R, field: &str) -> Result<PathBuf, FileWorksError> {
        let dir = self.upload_dir(field)?;
        match record.get_attribute(field) {
            Some(Value::String(name)) if !name.is_empty() => Ok(dir.join(name)),
            _ => Err(FileWorksError::MissingFileName(field.to_string())),
        }
    }

    /// Store `file` under a fresh name in the field's directory and point the record at it.
    pub fn create<R: Model>(
        &self,
        record: &mut R,
        field: &str,
        file: &UploadedFile,
    ) -> Result<String, FileWorksError> {
        let extension = file.original_extension();
        if extension.is_empty() {
            return Err(FileWorksError::EmptyExtension);
        }

        let dir = self.upload_dir(field)?;
        if dir.as_os_str().is_empty() {
            return Err(FileWorksError::EmptyUploadDir(field.to_string()));
        }
        if !dir.is_dir() {
            return Err(FileWorksError::MissingUploadDir(dir.to_path_buf()));
        }

        let file_name = generate_file_name(extension);
        let stored = file
            .move_to(dir, &file_name)
            .map_err(|source| FileWorksError::Move {
                path: dir.join(&file_name),
                source,
            })?;

        if !is_readable(&stored) {
            return Err(FileWorksError::Unreadable(stored));
        }

        record.set_attribute(field, Value::String(file_name.clone()));
        tracing::debug!(field, file = %file_name, "Stored attachment");

        Ok(file_name)
    }

    /// Delete the field's current file, then store `file` in its place.
    pub fn update<R: Model>(
        &self,
        record: &mut R,
        field: &str,
        file: &UploadedFile,
    ) -> Result<String, FileWorksError> {
        self.delete(&*record, field)?;
        self.create(record, field, file)
    }

    /// Remove the field's current file. Fails if there was nothing to remove.
    pub fn delete<R: Model>(&self, record: &R, field: &str) -> Result<(), FileWorksError> {
        let path = self.resolve_path(record, field)?;

        if !is_writable(&path) {
            return Err(FileWorksError::NotDetected(path));
        }

        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove attachment");
        }

        if is_readable(&path) {
            return Err(FileWorksError::NotDeleted(path));
        }

        tracing::debug!(field, path = %path.display(), "Deleted attachment");
        Ok(())
    }

    /// Delete every configured field's file, stopping at the first failure.
    pub fn delete_all<R: Model>(&self, record: &R) -> Result<(), FileWorksError> {
        for field in self.fields() {
            self.delete(record, field)?;
        }
        Ok(())
    }
}

/// A record together with its file manager.
pub struct Attachments<'a, R: HasFileAttachments> {
    record: &'a mut R,
    manager: Arc<FileManager>,
}

impl<'a, R: HasFileAttachments> Attachments<'a, R> {
    pub(crate) fn new(record: &'a mut R, manager: Arc<FileManager>) -> Self {
        Self { record, manager }
    }

    pub fn manager(&self) -> &FileManager {
        &self.manager
    }

    pub fn resolve_path(&self, field: &str) -> Result<PathBuf, FileWorksError> {
        self.manager.resolve_path(&*self.record, field)
    }

    pub fn create(&mut self, field: &str, file: &UploadedFile) -> Result<String, FileWorksError> {
        self.manager.create(&mut *self.record, field, file)
    }

    pub fn update(&mut self, field: &str, file: &UploadedFile) -> Result<String, FileWorksError> {
        self.manager.update(&mut *self.record, field, file)
    }

    pub fn delete(&self, field: &str) -> Result<(), FileWorksError> {
        self.manager.delete(&*self.record, field)
    }

    pub fn delete_all(&self) -> Result<(), FileWorksError> {
        self.manager.delete_all(&*self.record)
    }
}

/// `<3-digit random>-<unique token>.<lower-cased extension>`
fn generate_file_name(extension: &str) -> String {
    let id = uuid::Uuid::new_v4();
    let prefix = 100 + id.as_u128() % 900;
    format!("{prefix}-{}.{}", id.simple(), extension.to_lowercase())
}

fn is_readable(path: &Path) -> bool {
    File::open(path).is_ok()
}

fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && !m.permissions().readonly())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_file_name_shape() {
        for _ in 0..50 {
            let name = generate_file_name("JPG");
            let (prefix, rest) = name.split_once('-').unwrap();
            let (token, ext) = rest.split_once('.').unwrap();

            assert_eq!(prefix.len(), 3);
            assert!(prefix.chars().all(|c| c.is_ascii_digit()));
            assert!(!prefix.starts_with('0'));
            assert!(!token.is_empty());
            assert!(token.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
            assert_eq!(ext, "jpg");
        }
    }

    #[test]
    fn test_generated_file_names_differ() {
        assert_ne!(generate_file_name("png"), generate_file_name("png"));
    }
}
