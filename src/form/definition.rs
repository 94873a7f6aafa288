use crate::model::Model;
use crate::validation::{Messages, Rules};

/// Declarative description of one entity form: what it builds and how input is checked.
pub trait FormDefinition {
    type Model: Model;

    /// A fresh, unsaved record of the form's type.
    fn make_model(&self) -> Self::Model;

    /// Rules applied when creating a record.
    fn create_rules(&self) -> Rules;

    /// Rules applied when updating a bound record.
    fn update_rules(&self) -> Rules;

    fn messages(&self) -> Messages {
        Messages::new()
    }
}
