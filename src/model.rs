//! Record capabilities shared by everything the store persists.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::storage::{Database, DatabaseError};

/// Attribute bag of a record, keyed by column name.
pub type Attributes = BTreeMap<String, Value>;

/// A persisted entity with named attributes.
///
/// Attributes are reached by name through [`Model::get_attribute`] and
/// [`Model::set_attribute`]; bulk assignment from untrusted input goes through
/// [`Model::fill`], which only touches the columns listed in [`Model::FILLABLE`].
pub trait Model: Send {
    /// Table the record is stored in.
    const TABLE: &'static str;

    /// Mass-assignment allow-list.
    const FILLABLE: &'static [&'static str];

    /// Primary key, `None` until the record has been saved once.
    fn key(&self) -> Option<u64>;

    fn set_key(&mut self, key: u64);

    fn attributes(&self) -> &Attributes;

    fn attributes_mut(&mut self) -> &mut Attributes;

    fn exists(&self) -> bool {
        self.key().is_some()
    }

    fn get_attribute(&self, name: &str) -> Option<&Value> {
        self.attributes().get(name)
    }

    fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes_mut().insert(name.to_string(), value);
    }

    /// Mass-assign `fields`, ignoring any name not on the allow-list.
    fn fill(&mut self, fields: &Attributes) {
        for name in Self::FILLABLE {
            if let Some(value) = fields.get(*name) {
                self.set_attribute(name, value.clone());
            }
        }
    }
}

/// A record that owns a collection of `C` and persists new children itself.
pub trait HasChildModels<C: Model>: Send {
    /// Attach `child` to this record and save it. Returns the store's save result.
    fn add_child_model(&mut self, db: &Database, child: &mut C) -> Result<bool, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Note {
        id: Option<u64>,
        attributes: Attributes,
    }

    impl Model for Note {
        const TABLE: &'static str = "notes";
        const FILLABLE: &'static [&'static str] = &["title", "body"];

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

    #[test]
    fn test_fill_respects_allow_list() {
        let mut note = Note::default();
        let fields: Attributes = [
            ("title".to_string(), json!("Hello")),
            ("owner_id".to_string(), json!(7)),
        ]
        .into_iter()
        .collect();

        note.fill(&fields);

        assert_eq!(note.get_attribute("title"), Some(&json!("Hello")));
        assert_eq!(note.get_attribute("owner_id"), None);
        assert_eq!(note.get_attribute("body"), None);
    }

    #[test]
    fn test_exists_tracks_key() {
        let mut note = Note::default();
        assert!(!note.exists());
        note.set_key(3);
        assert!(note.exists());
    }
}
