pub mod context;
pub mod error;

pub use context::Engine;
pub use error::{Error, NetworkError, OcrError, ParseError, RenderError, Result, TierError};
