pub mod error;
pub mod huggingface;
pub mod traits;
pub mod util;

pub use error::{FailureClass, InferenceError};
pub use huggingface::{EntitySpan, HuggingFace, LabelScore};
pub use traits::InferenceBackend;
pub use util::{strip_control_chars, truncate_to_char_boundary};
