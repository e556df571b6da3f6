//! Learner state I/O
//!
//! Learners flatten their parameters into a [`ModelState`], which is encoded
//! as JSON or YAML into whatever sink the artifact store provides.

mod format;
mod load;
mod model;
mod save;


pub use format::{ModelFormat, SaveConfig};
pub use load::load_state;
pub use model::{ModelMetadata, ModelState, ParameterInfo};
pub use save::save_state;
