//! In-crate fakes shared by the unit tests.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::application::services::{
    AnswerGenerator, DocumentService, QaPipeline, RagService, TokenSink,
};
use crate::domain::{
    ports::{
        ChatModel, DocumentStore, EmbeddingService, PromptMessage, PromptRole, ProviderFactory,
        TokenCounter, TokenStream,
    },
    Credential, Document, DomainError, Embedding, SplitterConfig, TextSplitter,
};
use crate::infrastructure::InMemoryByteStore;

const VOCABULARY: [&str; 12] = [
    "apple", "apples", "orchard", "farm", "zorblax", "mineral", "purple", "mars", "train",
    "station", "noon", "late",
];

fn keywords(text: &str) -> Vec<&'static str> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    VOCABULARY
        .iter()
        .copied()
        .filter(|v| words.contains(v))
        .collect()
}

/// One unit per whitespace-separated word.
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn count(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/// Bag-of-keywords embeddings over a fixed vocabulary, with call accounting.
#[derive(Default)]
pub struct KeywordEmbeddings {
    batch_calls: AtomicUsize,
    query_calls: AtomicUsize,
    stalled: AtomicBool,
    embedded: Mutex<Vec<String>>,
}

impl KeywordEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector(text: &str) -> Embedding {
        let found = keywords(text);
        Embedding::new(
            VOCABULARY
                .iter()
                .map(|v| if found.contains(v) { 1.0 } else { 0.0 })
                .collect(),
        )
    }

    /// Later batch calls never return.
    pub fn stall_batches(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.embedded.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbeddings {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.embedded
            .lock()
            .unwrap()
            .extend(texts.iter().map(|t| t.to_string()));
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

/// Answers with the first context sentence sharing a keyword with the
/// question, or the fixed fallback. Streams one word per token.
#[derive(Default)]
pub struct FakeChatModel {
    fail_after: Mutex<Option<usize>>,
    stall_after: Mutex<Option<usize>>,
    last_system: Mutex<Option<String>>,
}

impl FakeChatModel {
    pub const FALLBACK: &'static str = "I don't know.";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(tokens: usize) -> Self {
        let model = Self::default();
        model.fail_after(tokens);
        model
    }

    pub fn fail_after(&self, tokens: usize) {
        *self.fail_after.lock().unwrap() = Some(tokens);
    }

    /// Streams `tokens` tokens, then never yields again.
    pub fn stall_after(&self, tokens: usize) {
        *self.stall_after.lock().unwrap() = Some(tokens);
    }

    pub fn last_system_prompt(&self) -> Option<String> {
        self.last_system.lock().unwrap().clone()
    }

    fn answer(system: &str, question: &str) -> String {
        let context = system.rsplit("Context: ").next().unwrap_or_default();
        let wanted = keywords(question);
        context
            .split_inclusive(['.', '\n'])
            .map(str::trim)
            .find(|sentence| keywords(sentence).iter().any(|k| wanted.contains(k)))
            .map(str::to_string)
            .unwrap_or_else(|| Self::FALLBACK.to_string())
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    async fn stream(&self, messages: &[PromptMessage]) -> Result<TokenStream, DomainError> {
        let system = messages
            .iter()
            .find(|m| m.role == PromptRole::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let question = messages
            .iter()
            .find(|m| m.role == PromptRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        *self.last_system.lock().unwrap() = Some(system.clone());

        let answer = Self::answer(&system, &question);
        let mut items: Vec<Result<String, DomainError>> = answer
            .split(' ')
            .enumerate()
            .map(|(i, word)| Ok(if i == 0 { word.to_string() } else { format!(" {word}") }))
            .collect();

        if let Some(n) = *self.stall_after.lock().unwrap() {
            items.truncate(n);
            return Ok(Box::pin(
                futures::stream::iter(items).chain(futures::stream::pending()),
            ));
        }

        if let Some(n) = *self.fail_after.lock().unwrap() {
            items.truncate(n);
            items.push(Err(DomainError::provider("stream interrupted")));
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model(&self) -> &str {
        "fake-chat"
    }
}

/// Hands out the shared fakes once a credential is present.
pub struct FakeProviders {
    pub embeddings: Arc<KeywordEmbeddings>,
    pub chat: Arc<FakeChatModel>,
}

impl ProviderFactory for FakeProviders {
    fn embeddings(&self, credential: &Credential) -> Result<Arc<dyn EmbeddingService>, DomainError> {
        credential.require()?;
        Ok(self.embeddings.clone())
    }

    fn chat_model(&self, credential: &Credential) -> Result<Arc<dyn ChatModel>, DomainError> {
        credential.require()?;
        Ok(self.chat.clone())
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDocumentStore {
    pub fn is_empty(&self) -> bool {
        self.files.lock().unwrap().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().unwrap().contains_key(name)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save_document(&self, doc: &Document) -> Result<(), DomainError> {
        self.files
            .lock()
            .unwrap()
            .insert(doc.name.clone(), doc.bytes.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub tokens: Vec<String>,
    pub completed: Option<String>,
    pub errors: usize,
}

impl TokenSink for RecordingSink {
    fn on_token(&mut self, token: &str) {
        self.tokens.push(token.to_string());
    }

    fn on_complete(&mut self, answer: &str) {
        self.completed = Some(answer.to_string());
    }

    fn on_error(&mut self, _error: &DomainError) {
        self.errors += 1;
    }
}

pub struct TestPipeline {
    pub pipeline: Arc<QaPipeline>,
    pub embeddings: Arc<KeywordEmbeddings>,
    pub chat: Arc<FakeChatModel>,
    pub cache: Arc<InMemoryByteStore>,
    top_k: usize,
}

impl TestPipeline {
    /// New services and provider counters over the same durable cache.
    pub fn restart(&self) -> TestPipeline {
        build(self.cache.clone(), self.top_k)
    }
}

/// Pipeline where each line of a document becomes one chunk.
pub fn test_pipeline(top_k: usize) -> TestPipeline {
    build(Arc::new(InMemoryByteStore::new()), top_k)
}

fn build(cache: Arc<InMemoryByteStore>, top_k: usize) -> TestPipeline {
    let embeddings = Arc::new(KeywordEmbeddings::new());
    let chat = Arc::new(FakeChatModel::new());
    let splitter = TextSplitter::new(
        SplitterConfig {
            separator: "\n".to_string(),
            chunk_size: 10,
            chunk_overlap: 0,
        },
        Arc::new(WordCounter),
    )
    .unwrap();

    let pipeline = QaPipeline::new(
        DocumentService::new(Arc::new(MemoryDocumentStore::default()), splitter),
        RagService::new(cache.clone(), top_k),
        AnswerGenerator::default(),
        Arc::new(FakeProviders {
            embeddings: embeddings.clone(),
            chat: chat.clone(),
        }),
    );

    TestPipeline {
        pipeline: Arc::new(pipeline),
        embeddings,
        chat,
        cache,
        top_k,
    }
}
