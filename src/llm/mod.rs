pub mod backend;
pub mod openai;
pub mod prompt;

pub use backend::PatchBackend;
pub use openai::OpenAiBackend;
