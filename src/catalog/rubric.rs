use serde_json::Value;

use super::Painting;
use crate::model::{Attributes, HasChildModels, Model};
use crate::storage::{Database, DatabaseError};

/// A category of paintings.
#[derive(Debug, Default)]
pub struct Rubric {
    id: Option<u64>,
    attributes: Attributes,
}

impl Rubric {
    pub fn name(&self) -> Option<&str> {
        self.get_attribute("name").and_then(|v| v.as_str())
    }
}

impl Model for Rubric {
    const TABLE: &'static str = "rubrics";
    const FILLABLE: &'static [&'static str] = &["name"];

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

impl HasChildModels<Painting> for Rubric {
    fn add_child_model(&mut self, db: &Database, child: &mut Painting) -> Result<bool, DatabaseError> {
        let Some(id) = self.key() else {
            return Ok(false);
        };
        child.set_attribute("rubric_id", Value::from(id));
        db.save(child)
    }
}
