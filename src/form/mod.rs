//! Validate, stage uploads and persist one record per request.

mod definition;
mod error;

pub use definition::FormDefinition;
pub use error::FormError;

use std::collections::BTreeMap;

use crate::file_works::{FileWorksError, HasFileAttachments};
use crate::model::{Attributes, HasChildModels, Model};
use crate::request::{FormRequest, UploadStatus, UploadedFile};
use crate::storage::models::key_from_value;
use crate::storage::{Database, DatabaseError};
use crate::validation::{message_for, Rules, ValidationError, ValidationErrors, Validator};

/// Whether a workflow creates a new record or updates a bound one. Decided at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

type ParentLookup<C> = fn(&Database, u64) -> Result<Box<dyn HasChildModels<C>>, DatabaseError>;

enum ParentBinding<C: Model> {
    Resolved(Box<dyn HasChildModels<C>>),
    /// Resolved at persist time from the value of a request field.
    Lookup {
        field: String,
        resolve: ParentLookup<C>,
    },
}

type StoreUploads<M> = fn(&mut M, &BTreeMap<String, UploadedFile>, Mode) -> Result<(), FileWorksError>;

/// Hand staged uploads to the record's file manager. On update a field that
/// already holds a file is replaced; one that holds none gets a new file.
fn store_uploads<R: HasFileAttachments>(
    record: &mut R,
    files: &BTreeMap<String, UploadedFile>,
    mode: Mode,
) -> Result<(), FileWorksError> {
    let mut attachments = record.files()?;
    for (field, file) in files {
        match mode {
            Mode::Update if attachments.resolve_path(field).is_ok() => {
                attachments.update(field, file)?;
            }
            _ => {
                attachments.create(field, file)?;
            }
        }
    }
    Ok(())
}

fn lookup_parent<P, C>(db: &Database, key: u64) -> Result<Box<dyn HasChildModels<C>>, DatabaseError>
where
    P: Model + HasChildModels<C> + Default + 'static,
    C: Model,
{
    Ok(Box::new(db.find_or_fail(P::default(), key)?))
}

/// One form submission: a request, the form that interprets it, and the store it lands in.
pub struct FormWorkflow<'a, D: FormDefinition> {
    definition: &'a D,
    db: &'a Database,
    request: FormRequest,
    mode: Mode,
    model: Option<D::Model>,
    file_fields: Vec<String>,
    files: BTreeMap<String, UploadedFile>,
    store: Option<StoreUploads<D::Model>>,
    parent: Option<ParentBinding<D::Model>>,
    errors: Option<ValidationErrors>,
}

impl<'a, D: FormDefinition> FormWorkflow<'a, D> {
    pub fn new(definition: &'a D, db: &'a Database, request: FormRequest) -> Self {
        Self {
            definition,
            db,
            request,
            mode: Mode::Create,
            model: None,
            file_fields: Vec::new(),
            files: BTreeMap::new(),
            store: None,
            parent: None,
            errors: None,
        }
    }

    /// Declare one more request field that carries an upload.
    pub fn with_file(mut self, field: impl Into<String>) -> Self
    where
        D::Model: HasFileAttachments,
    {
        let field = field.into();
        if !self.file_fields.contains(&field) {
            self.file_fields.push(field);
        }
        self.store = Some(store_uploads::<D::Model>);
        self
    }

    /// Replace the set of upload fields.
    pub fn with_files<I, S>(mut self, fields: I) -> Self
    where
        D::Model: HasFileAttachments,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.file_fields.clear();
        for field in fields {
            self = self.with_file(field);
        }
        self
    }

    /// Update `model` instead of creating a new record. Selects the update rules.
    pub fn bind_existing_record(mut self, model: D::Model) -> Self {
        self.mode = Mode::Update;
        self.model = Some(model);
        self
    }

    /// Create the record through an already loaded parent.
    pub fn bind_parent<P>(mut self, parent: P) -> Self
    where
        P: HasChildModels<D::Model> + 'static,
    {
        self.parent = Some(ParentBinding::Resolved(Box::new(parent)));
        self
    }

    /// Create the record through the `P` whose key is submitted in `field`.
    /// Nothing is bound if the request lacks the field.
    pub fn bind_parent_by_key<P>(mut self, field: impl Into<String>) -> Self
    where
        P: Model + HasChildModels<D::Model> + Default + 'static,
    {
        self.parent = Some(ParentBinding::Lookup {
            field: field.into(),
            resolve: lookup_parent::<P, D::Model>,
        });
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn file_fields(&self) -> &[String] {
        &self.file_fields
    }

    /// The bound record, or the created one after a successful create.
    pub fn model(&self) -> Option<&D::Model> {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Option<D::Model> {
        self.model
    }

    /// Failures of the last `persist` call that returned `false`.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        self.errors.as_ref()
    }

    pub fn take_validation_errors(&mut self) -> Option<ValidationErrors> {
        self.errors.take()
    }

    /// Validate the request and create or update the record.
    ///
    /// Returns `Ok(false)` when the input is invalid; the failures are then
    /// available from [`Self::validation_errors`]. Upload, filesystem and store
    /// failures are errors. Files already written are not rolled back when a
    /// later step fails.
    pub fn persist(&mut self) -> Result<bool, FormError> {
        if !self.is_valid()? {
            return Ok(false);
        }

        self.stage_uploads()?;
        self.resolve_parent()?;

        match self.mode {
            Mode::Create => self.create_from_request()?,
            Mode::Update => self.update_existing()?,
        }

        Ok(true)
    }

    fn rules(&self) -> Rules {
        match self.mode {
            Mode::Create => self.definition.create_rules(),
            Mode::Update => self.definition.update_rules(),
        }
    }

    fn is_valid(&mut self) -> Result<bool, FormError> {
        self.errors = None;
        let messages = self.definition.messages();

        // Oversized parts never reach the rules: their bytes were dropped on intake.
        let mut oversized = ValidationErrors::new();
        for field in &self.file_fields {
            if self.request.upload_status(field) == Some(UploadStatus::ExceedsServerLimit) {
                let message = message_for(&messages, field, "uploaded", || {
                    format!("The {field} exceeds the maximum upload size allowed by the server.")
                });
                oversized.add(field, "uploaded", message);
            }
        }
        if !oversized.is_empty() {
            tracing::warn!(failed = oversized.len(), "Upload exceeds server limit");
            self.errors = Some(oversized);
            return Ok(false);
        }

        let rules = self.rules();
        match Validator::new(self.db).validate(&self.request, &rules, &messages) {
            Ok(()) => Ok(true),
            Err(ValidationError::Invalid(errors)) => {
                tracing::warn!(failed = errors.len(), mode = ?self.mode, "Form validation failed");
                self.errors = Some(errors);
                Ok(false)
            }
            Err(ValidationError::Rule(message)) => Err(FormError::Config(message)),
            Err(ValidationError::Presence(e)) => Err(e.into()),
        }
    }

    /// Collect the declared uploads present in the request. Absent ones are skipped.
    fn stage_uploads(&mut self) -> Result<(), FormError> {
        self.files.clear();

        for field in &self.file_fields {
            let Some(file) = self.request.file(field) else {
                continue;
            };
            if !file.is_valid() {
                return Err(FormError::Upload {
                    field: field.clone(),
                    status: file.status(),
                });
            }
            self.files.insert(field.clone(), file.clone());
        }

        Ok(())
    }

    fn resolve_parent(&mut self) -> Result<(), FormError> {
        let (field, resolve) = match &self.parent {
            Some(ParentBinding::Lookup { field, resolve }) => (field.clone(), *resolve),
            _ => return Ok(()),
        };

        let Some(value) = self.request.input(&field) else {
            tracing::debug!(field = %field, "No parent key submitted, creating without parent");
            self.parent = None;
            return Ok(());
        };

        let key = key_from_value(value)
            .ok_or_else(|| FormError::NotFound(format!("No parent for {field} = {value}")))?;
        let parent = resolve(self.db, key)?;

        tracing::debug!(field = %field, key, "Resolved parent record");
        self.parent = Some(ParentBinding::Resolved(parent));
        Ok(())
    }

    /// Submitted fields that the active rule set names.
    fn validated_fields(&self) -> Attributes {
        let rules = self.rules();
        self.request
            .all()
            .iter()
            .filter(|(name, _)| rules.contains_key(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn store_files(
        store: Option<StoreUploads<D::Model>>,
        files: &BTreeMap<String, UploadedFile>,
        mode: Mode,
        model: &mut D::Model,
    ) -> Result<(), FormError> {
        if files.is_empty() {
            return Ok(());
        }
        let store = store
            .ok_or_else(|| FormError::Config("uploads staged without a file capability".to_string()))?;
        store(model, files, mode)?;
        Ok(())
    }

    fn create_from_request(&mut self) -> Result<(), FormError> {
        let mut model = self.definition.make_model();
        Self::store_files(self.store, &self.files, self.mode, &mut model)?;

        model.fill(&self.validated_fields());

        let saved = match self.parent.as_mut() {
            Some(ParentBinding::Resolved(parent)) => parent.add_child_model(self.db, &mut model)?,
            _ => self.db.save(&mut model)?,
        };
        if !saved {
            return Err(FormError::Persistence(format!(
                "new {} record was rejected by the store",
                D::Model::TABLE
            )));
        }

        tracing::info!(table = D::Model::TABLE, id = ?model.key(), "Created record");
        self.model = Some(model);
        Ok(())
    }

    fn update_existing(&mut self) -> Result<(), FormError> {
        let validated = self.validated_fields();
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| FormError::Config("update without a bound record".to_string()))?;

        Self::store_files(self.store, &self.files, self.mode, model)?;
        model.fill(&validated);

        if !self.db.save(model)? {
            return Err(FormError::Persistence(format!(
                "{} record {:?} no longer exists",
                D::Model::TABLE,
                model.key()
            )));
        }

        tracing::info!(table = D::Model::TABLE, id = ?model.key(), "Updated record");
        Ok(())
    }
}
