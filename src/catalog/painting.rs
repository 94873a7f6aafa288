use std::cell::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;

use crate::file_works::{FileManager, FilesInfo, HasFileAttachments};
use crate::model::{Attributes, Model};
use crate::storage::models::key_from_value;

#[derive(Debug)]
pub struct Painting {
    id: Option<u64>,
    attributes: Attributes,
    upload_dir: PathBuf,
    files: OnceCell<Arc<FileManager>>,
}

impl Painting {
    /// An unsaved painting whose image goes to `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: None,
            attributes: Attributes::new(),
            upload_dir: upload_dir.into(),
            files: OnceCell::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.get_attribute("name").and_then(|v| v.as_str())
    }

    pub fn name_en(&self) -> Option<&str> {
        self.get_attribute("name_en").and_then(|v| v.as_str())
    }

    pub fn rubric_id(&self) -> Option<u64> {
        self.get_attribute("rubric_id").and_then(key_from_value)
    }

    /// Stored file name of the image.
    pub fn image(&self) -> Option<&str> {
        self.get_attribute("path").and_then(|v| v.as_str())
    }
}

impl Model for Painting {
    const TABLE: &'static str = "paintings";
    const FILLABLE: &'static [&'static str] = &["name", "name_en", "rubric_id"];

    fn key(&self) -> Option<u64> {
        self.id
    }

    fn set_key(&mut self, key: u64) {
        self.id = Some(key);
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }
}

impl HasFileAttachments for Painting {
    fn files_info(&self) -> FilesInfo {
        FilesInfo::from([("path", self.upload_dir.clone())])
    }

    fn file_manager_cell(&self) -> &OnceCell<Arc<FileManager>> {
        &self.files
    }
}
