use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::application::services::{AnswerGenerator, DocumentService, RagService, TokenSink};
use crate::domain::{
    format_context,
    ports::{ChatModel, EmbeddingService, ProviderFactory},
    ChatHistory, ChatTurn, Credential, Document, DomainError, SessionState, VectorIndex,
};

pub const READY_MESSAGE: &str = "I've read your file. Ask me anything!";
pub const MISSING_KEY_WARNING: &str = "An API key is required.";

/// Services shared by every session.
pub struct QaPipeline {
    pub documents: DocumentService,
    pub rag: RagService,
    pub answers: AnswerGenerator,
    pub providers: Arc<dyn ProviderFactory>,
}

impl QaPipeline {
    pub fn new(
        documents: DocumentService,
        rag: RagService,
        answers: AnswerGenerator,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            documents,
            rag,
            answers,
            providers,
        }
    }
}

struct ActiveDocument {
    document: Document,
    index: Arc<VectorIndex>,
}

/// Resets a session whose upload was dropped mid-flight.
struct LoadingGuard<'a> {
    session: &'a mut ChatSession,
    settled: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(session_id = %self.session.id, "document load abandoned");
            self.session.reset();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub state: SessionState,
    pub document: Option<String>,
    pub chunks: usize,
    pub turns: usize,
    pub warning: Option<&'static str>,
    pub created_at: DateTime<Utc>,
}

/// Everything one interactive session owns: the credential, the loaded
/// document and its index, and the chat history.
///
/// ```text
/// NoDocument -> DocumentLoading -> DocumentReady <-> Answering
///      ^               |
///      +--- failure ---+  (history cleared)
/// ```
pub struct ChatSession {
    id: Uuid,
    pipeline: Arc<QaPipeline>,
    credential: Credential,
    state: SessionState,
    history: ChatHistory,
    active: Option<ActiveDocument>,
    created_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(pipeline: Arc<QaPipeline>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline,
            credential: Credential::default(),
            state: SessionState::NoDocument,
            history: ChatHistory::new(),
            active: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[ChatTurn] {
        self.history.all()
    }

    pub fn set_credential(&mut self, key: impl Into<String>) {
        self.credential = Credential::new(key);
        tracing::info!(session_id = %self.id, configured = self.credential.is_configured(), "credential updated");
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id,
            state: self.state,
            document: self.active.as_ref().map(|a| a.document.name.clone()),
            chunks: self.active.as_ref().map_or(0, |a| a.index.len()),
            turns: self.history.len(),
            warning: (!self.credential.is_configured()).then_some(MISSING_KEY_WARNING),
            created_at: self.created_at,
        }
    }

    /// Drops the document, its index and the history.
    pub fn reset(&mut self) {
        self.active = None;
        self.history.clear();
        self.state = SessionState::NoDocument;
    }

    /// Returns to `DocumentReady` after an answer was abandoned mid-stream.
    /// The question stays in the history without a reply.
    pub fn interrupt(&mut self) {
        if self.state == SessionState::Answering {
            tracing::info!(session_id = %self.id, "answer abandoned");
            self.state = SessionState::DocumentReady;
        }
    }

    /// Loads, embeds and indexes a document. On any failure, or if the
    /// returned future is dropped before it completes, the session returns
    /// to `NoDocument` with an empty history.
    #[instrument(skip(self, bytes), fields(session_id = %self.id, size = bytes.len()))]
    pub async fn upload(
        &mut self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<&'static str, DomainError> {
        let previous = self
            .active
            .take()
            .map(|a| (a.document.name, a.document.content_hash));
        self.state = SessionState::DocumentLoading;

        let mut loading = LoadingGuard {
            session: self,
            settled: false,
        };
        let result = loading.session.load(filename, bytes).await;
        loading.settled = true;
        let session = &mut *loading.session;

        match result {
            Ok(active) => {
                let unchanged = previous.as_ref().is_some_and(|(name, hash)| {
                    *name == active.document.name && *hash == active.document.content_hash
                });
                if !unchanged {
                    session.history.clear();
                }
                session.active = Some(active);
                session.state = SessionState::DocumentReady;
                Ok(READY_MESSAGE)
            }
            Err(e) => {
                tracing::warn!(error = %e, "document load failed");
                session.reset();
                Err(e)
            }
        }
    }

    async fn load(&self, filename: &str, bytes: Vec<u8>) -> Result<ActiveDocument, DomainError> {
        self.credential.require()?;
        let embeddings = self.pipeline.providers.embeddings(&self.credential)?;
        let (document, chunks) = self.pipeline.documents.ingest(filename, bytes).await?;
        let index = self
            .pipeline
            .rag
            .index_document(embeddings, &document, chunks)
            .await?;
        Ok(ActiveDocument { document, index })
    }

    /// Checks that `question` could be answered right now without touching
    /// any provider.
    pub fn check_question(&self, question: &str) -> Result<(), DomainError> {
        self.ready_index(question.trim()).map(|_| ())
    }

    fn ready_index(&self, question: &str) -> Result<Arc<VectorIndex>, DomainError> {
        if question.is_empty() {
            return Err(DomainError::validation("The question must not be empty."));
        }
        let index = match (&self.state, &self.active) {
            (SessionState::DocumentReady, Some(active)) => active.index.clone(),
            _ => {
                return Err(DomainError::validation(
                    "Upload a document before asking a question.",
                ))
            }
        };
        self.credential.require()?;
        Ok(index)
    }

    /// Answers a question from the active document, streaming into `sink`.
    /// A failed answer leaves the history and the document in place.
    #[instrument(skip(self, sink), fields(session_id = %self.id))]
    pub async fn ask(
        &mut self,
        question: &str,
        sink: &mut dyn TokenSink,
    ) -> Result<String, DomainError> {
        let question = question.trim();
        let index = self.ready_index(question)?;
        let embeddings = self.pipeline.providers.embeddings(&self.credential)?;
        let model = self.pipeline.providers.chat_model(&self.credential)?;

        self.history.append(ChatTurn::human(question));
        self.state = SessionState::Answering;
        let result = self
            .answer(embeddings.as_ref(), model.as_ref(), &index, question, sink)
            .await;
        self.state = SessionState::DocumentReady;

        match result {
            Ok(answer) => {
                self.history.append(ChatTurn::ai(answer.as_str()));
                Ok(answer)
            }
            Err(e) => {
                tracing::warn!(error = %e, "answer failed");
                Err(e)
            }
        }
    }

    async fn answer(
        &self,
        embeddings: &dyn EmbeddingService,
        model: &dyn ChatModel,
        index: &VectorIndex,
        question: &str,
        sink: &mut dyn TokenSink,
    ) -> Result<String, DomainError> {
        let results = self.pipeline.rag.retrieve(embeddings, index, question).await?;
        let context = format_context(&results);
        self.pipeline
            .answers
            .generate(model, &context, question, sink)
            .await
    }
}
