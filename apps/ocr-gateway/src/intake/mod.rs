//! Upload intake
//!
//! Raw uploads as they arrive from the HTTP layer, the media-type allow-list,
//! and the validator that decides whether an upload may enter the pipeline.

mod types;
mod validator;

pub use types::{MediaType, UploadedImage};
pub use validator::{ValidationLimits, Validator};
