//! The painting catalog: rubrics own paintings, paintings carry one image.

mod forms;
mod painting;
mod rubric;

pub use forms::{PaintingForm, RubricForm};
pub use painting::Painting;
pub use rubric::Rubric;
