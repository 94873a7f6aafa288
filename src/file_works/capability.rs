use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{Attachments, FileManager, FileWorksError};
use crate::model::Model;

/// File field name -> directory its uploads are stored in.
pub type FilesInfo = BTreeMap<&'static str, PathBuf>;

/// A record with file attachments.
///
/// File fields hold a server-generated file name. They must never be on the
/// record's mass-assignment allow-list; [`FileManager::new`] rejects such a configuration.
pub trait HasFileAttachments: Model + Sized {
    /// Which fields carry files, and where each field's files live.
    fn files_info(&self) -> FilesInfo;

    /// Slot memoizing the record's file manager.
    fn file_manager_cell(&self) -> &OnceCell<Arc<FileManager>>;

    /// File operations bound to this record. The manager is built and its
    /// configuration checked on first use.
    fn files(&mut self) -> Result<Attachments<'_, Self>, FileWorksError> {
        let cached = self.file_manager_cell().get().cloned();
        let manager = match cached {
            Some(manager) => manager,
            None => {
                let manager = Arc::new(FileManager::new(&*self)?);
                let _ = self.file_manager_cell().set(Arc::clone(&manager));
                manager
            }
        };

        Ok(Attachments::new(self, manager))
    }
}
