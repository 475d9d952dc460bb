pub mod ollama;
pub mod traits;
pub mod util;

pub use ollama::Ollama;
pub use traits::CompletionModel;
