pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod util;
pub mod variants;

pub use error::EngineError;
pub use model::LanguageModel;
pub use registry::Registry;
pub use variants::{Variant, WeightRoots};
