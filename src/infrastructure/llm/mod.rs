mod openai;
mod sse;

pub use openai::OpenAiChat;
pub use sse::SseDecoder;
