use std::path::PathBuf;

use super::{Painting, Rubric};
use crate::form::FormDefinition;
use crate::validation::{Messages, Rules};

/// Create and edit paintings. The image arrives in the `path` field.
#[derive(Debug, Clone)]
pub struct PaintingForm {
    upload_dir: PathBuf,
}

impl PaintingForm {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }
}

impl FormDefinition for PaintingForm {
    type Model = Painting;

    fn make_model(&self) -> Painting {
        Painting::new(self.upload_dir.clone())
    }

    fn create_rules(&self) -> Rules {
        Rules::from([
            ("rubric_id", "required|numeric|exists:rubrics,id"),
            ("path", "required|image|mimes:jpg,jpeg,png,gif|max:400"),
            ("name", "required|unique:paintings,name"),
            ("name_en", "required"),
        ])
    }

    fn update_rules(&self) -> Rules {
        Rules::from([
            ("rubric_id", "required|numeric|exists:rubrics,id"),
            ("path", "sometimes|image|mimes:jpg,jpeg,png,gif|max:400"),
            ("name", "required"),
            ("name_en", "required"),
        ])
    }

    fn messages(&self) -> Messages {
        Messages::from([
            ("path.required", "An image has to be uploaded"),
            ("path.mimes", "The image must be a jpg, png or gif"),
            ("path.max", "The image may not be larger than 400KB"),
            ("path.uploaded", "The image exceeds the size the server accepts"),
            ("name.required", "A painting title is required"),
            ("name.unique", "A painting with this title already exists"),
            ("name_en.required", "An English title is required"),
            ("rubric_id.required", "A rubric has to be selected"),
            ("rubric_id.numeric", "The rubric must be picked from the list"),
            ("rubric_id.exists", "The rubric must be picked from the list"),
        ])
    }
}

/// Create and rename rubrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubricForm;

impl FormDefinition for RubricForm {
    type Model = Rubric;

    fn make_model(&self) -> Rubric {
        Rubric::default()
    }

    fn create_rules(&self) -> Rules {
        Rules::from([("name", "required|string|max:120|unique:rubrics,name")])
    }

    fn update_rules(&self) -> Rules {
        Rules::from([("name", "required|string|max:120")])
    }
}
