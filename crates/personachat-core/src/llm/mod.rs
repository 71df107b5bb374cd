mod traits;
mod openai;
mod response;

pub use traits::ChatClient;
pub use openai::{OpenAiCompatClient, DEFAULT_TEMPERATURE};
pub use response::preprocess_response;
