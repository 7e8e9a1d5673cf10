use crate::chunking::{split_text, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::models::join_chunk_text;
use crate::prompts::{self, PromptTemplate};
use crate::traits::LanguageModel;
use crate::vector_index::VectorIndex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_K: usize = 4;

/// Question answering over a single document: chunk, embed, retrieve, prompt.
pub struct DocumentQa<E, L>
where
    E: Embedder,
    L: LanguageModel,
{
    embedder: E,
    model: L,
    chunking: ChunkingConfig,
    top_k: usize,
}

impl<E, L> DocumentQa<E, L>
where
    E: Embedder,
    L: LanguageModel,
{
    pub fn new(embedder: E, model: L) -> Self {
        Self {
            embedder,
            model,
            chunking: ChunkingConfig::question_answering(),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub async fn index(&self, text: &str) -> Result<VectorIndex, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::MissingInput("document has no text".to_string()));
        }

        let chunks = split_text(text, self.chunking)?;
        tracing::info!(chunks = chunks.len(), "indexing document for question answering");
        Ok(VectorIndex::build(chunks, &self.embedder).await?)
    }

    pub async fn answer(
        &self,
        index: &VectorIndex,
        question: &str,
    ) -> Result<String, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::MissingInput("question is empty".to_string()));
        }

        let hits = index.search(&self.embedder, question, self.top_k).await?;
        let context = join_chunk_text(&hits, "\n\n");
        let prompt = PromptTemplate::new(prompts::QUESTION_ANSWERING)
            .render(&[("context", context.as_str()), ("question", question)])?;

        Ok(self.model.complete(&prompt).await?)
    }

    pub async fn ask(&self, text: &str, question: &str) -> Result<String, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::MissingInput("question is empty".to_string()));
        }
        let index = self.index(text).await?;
        self.answer(&index, question).await
    }
}

/// Whole-document reports produced by a single prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    BidSummary,
    SubmissionChecklist,
    ContractRisks,
}

impl ReportKind {
    pub fn template(&self) -> PromptTemplate {
        PromptTemplate::new(match self {
            ReportKind::BidSummary => prompts::BID_SUMMARY,
            ReportKind::SubmissionChecklist => prompts::SUBMISSION_CHECKLIST,
            ReportKind::ContractRisks => prompts::CONTRACT_RISKS,
        })
    }

    /// Field name of the report in JSON responses.
    pub fn response_key(&self) -> &'static str {
        match self {
            ReportKind::BidSummary => "summary",
            ReportKind::SubmissionChecklist => "checklist",
            ReportKind::ContractRisks => "risks",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::BidSummary => "Bid requirements",
            ReportKind::SubmissionChecklist => "Submission checklist",
            ReportKind::ContractRisks => "Contract risks",
        }
    }
}

pub async fn analyze<L>(model: &L, kind: ReportKind, text: &str) -> Result<String, PipelineError>
where
    L: LanguageModel + ?Sized,
{
    if text.trim().is_empty() {
        return Err(PipelineError::MissingInput("document has no text".to_string()));
    }

    let prompt = kind.template().render(&[("document", text)])?;
    tracing::info!(?kind, model = model.model(), "generating report");
    let report = model.complete(&prompt).await?;
    Ok(report.trim().to_string())
}

pub async fn chat<L>(model: &L, question: &str) -> Result<String, PipelineError>
where
    L: LanguageModel + ?Sized,
{
    if question.trim().is_empty() {
        return Err(PipelineError::MissingInput("question is empty".to_string()));
    }
    Ok(model.complete(question).await?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records prompts and answers with a canned reply.
    #[derive(Default)]
    pub(crate) struct RecordingModel {
        pub reply: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl RecordingModel {
        pub(crate) fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().map(|guard| guard.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        fn model(&self) -> &str {
            "recording"
        }

        async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            Ok(self.reply.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        fn model(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ServiceError> {
            Err(ServiceError::backend("gemini", "503 Service Unavailable"))
        }
    }

    const RFP_TEXT: &str = "Proposals are due on 14 March at 17:00 through the county portal. \
        Bidders must hold an active ISO 9001 certificate and provide three references. \
        Payment is made within 45 days of an approved invoice.";

    #[tokio::test]
    async fn qa_prompt_contains_retrieved_context_and_question() {
        let qa = DocumentQa::new(
            CharacterNgramEmbedder::default(),
            RecordingModel::replying("The deadline is 14 March."),
        )
        .with_chunking(ChunkingConfig::new(80, 10).unwrap())
        .with_top_k(3);

        let answer = qa
            .ask(RFP_TEXT, "When are proposals due through the portal?")
            .await
            .unwrap();
        assert_eq!(answer, "The deadline is 14 March.");

        let prompts = qa.model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Question:\nWhen are proposals due through the portal?"));
        assert!(prompts[0].contains("Proposals are due on 14 March"));
        assert!(!prompts[0].contains("{context}"));
    }

    #[tokio::test]
    async fn qa_rejects_empty_question_before_calling_services() {
        let qa = DocumentQa::new(CharacterNgramEmbedder::default(), RecordingModel::default());
        let result = qa.ask(RFP_TEXT, "   ").await;
        assert!(matches!(result, Err(PipelineError::MissingInput(_))));
        assert!(qa.model.prompts().is_empty());
    }

    #[tokio::test]
    async fn qa_rejects_blank_document() {
        let qa = DocumentQa::new(CharacterNgramEmbedder::default(), RecordingModel::default());
        assert!(matches!(
            qa.ask("\n\n", "anything?").await,
            Err(PipelineError::MissingInput(_))
        ));
    }

    #[tokio::test]
    async fn report_uses_kind_template() {
        let model = RecordingModel::replying("  BIASED CLAUSES:\n- none\n");
        let report = analyze(&model, ReportKind::ContractRisks, "The client may terminate at will.")
            .await
            .unwrap();

        assert_eq!(report, "BIASED CLAUSES:\n- none");
        let prompts = model.prompts();
        assert!(prompts[0].starts_with("You are an expert contract analyzer."));
        assert!(prompts[0].contains("The client may terminate at will."));
    }

    #[tokio::test]
    async fn service_failure_is_propagated() {
        let result = analyze(&FailingModel, ReportKind::BidSummary, RFP_TEXT).await;
        assert!(matches!(result, Err(PipelineError::Service(_))));
    }

    #[tokio::test]
    async fn chat_forwards_question_verbatim() {
        let model = RecordingModel::replying("Hello!");
        assert_eq!(chat(&model, "What is an RFP?").await.unwrap(), "Hello!");
        assert_eq!(model.prompts(), vec!["What is an RFP?".to_string()]);
        assert!(chat(&model, "").await.is_err());
    }

    #[test]
    fn response_keys_match_endpoints() {
        assert_eq!(ReportKind::BidSummary.response_key(), "summary");
        assert_eq!(ReportKind::SubmissionChecklist.response_key(), "checklist");
        assert_eq!(ReportKind::ContractRisks.response_key(), "risks");
    }
}
