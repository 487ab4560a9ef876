mod openai;

pub use openai::OpenAiEmbeddings;
