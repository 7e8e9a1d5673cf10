//! Company profile vs. RFP review.
//!
//! Both documents are split into small windows and indexed separately. A fixed
//! retrieval query pulls the most relevant pieces of each, and four prompts turn
//! them into an eligibility verdict, a gap analysis, a submission checklist and
//! a risk review.

use crate::chunking::{split_text, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::models::join_chunk_text;
use crate::prompts::{self, PromptTemplate};
use crate::traits::LanguageModel;
use crate::vector_index::{IndexStore, VectorIndex};
use serde::{Deserialize, Serialize};

pub const COMPANY_QUERY: &str = "company certifications, registration, past performance";
pub const RFP_QUERY: &str = "eligibility criteria, mandatory qualifications";
pub const RETRIEVAL_K: usize = 3;

pub const COMPANY_INDEX: &str = "company";
pub const RFP_INDEX: &str = "rfp";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RfpReview {
    pub eligibility: String,
    pub gap_analysis: String,
    pub submission_checklist: String,
    pub risks: String,
}

impl RfpReview {
    /// Section titles paired with their text, in display order.
    pub fn sections(&self) -> [(&'static str, &str); 4] {
        [
            ("Eligibility & compliance", self.eligibility.as_str()),
            ("Criteria & gap analysis", self.gap_analysis.as_str()),
            ("Submission checklist", self.submission_checklist.as_str()),
            ("Risk review", self.risks.as_str()),
        ]
    }
}

/// Retrieved excerpts that feed the review prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfpContext {
    pub company: String,
    pub rfp: String,
}

pub struct RfpReviewer<E, L>
where
    E: Embedder,
    L: LanguageModel,
{
    embedder: E,
    model: L,
    chunking: ChunkingConfig,
    store: Option<IndexStore>,
    guidelines: Option<String>,
}

impl<E, L> RfpReviewer<E, L>
where
    E: Embedder,
    L: LanguageModel,
{
    pub fn new(embedder: E, model: L) -> Self {
        Self {
            embedder,
            model,
            chunking: ChunkingConfig::profile_matching(),
            store: None,
            guidelines: None,
        }
    }

    /// Persist both indexes under `store` and reload them before querying.
    pub fn with_store(mut self, store: IndexStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Historical evaluation guidelines added to the gap-analysis prompt.
    pub fn with_guidelines(mut self, guidelines: impl Into<String>) -> Self {
        let guidelines = guidelines.into();
        self.guidelines = (!guidelines.trim().is_empty()).then_some(guidelines);
        self
    }

    async fn build_index(&self, name: &str, text: &str) -> Result<VectorIndex, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::MissingInput(format!("{name} document has no text")));
        }

        let chunks = split_text(text, self.chunking)?;
        let index = VectorIndex::build(chunks, &self.embedder).await?;

        match &self.store {
            Some(store) => {
                store.save(name, &index).await?;
                Ok(store.load(name).await?)
            }
            None => Ok(index),
        }
    }

    pub async fn retrieve(
        &self,
        company_text: &str,
        rfp_text: &str,
    ) -> Result<RfpContext, PipelineError> {
        let company_index = self.build_index(COMPANY_INDEX, company_text).await?;
        let rfp_index = self.build_index(RFP_INDEX, rfp_text).await?;

        let company_hits = company_index
            .search(&self.embedder, COMPANY_QUERY, RETRIEVAL_K)
            .await?;
        let rfp_hits = rfp_index.search(&self.embedder, RFP_QUERY, RETRIEVAL_K).await?;

        tracing::debug!(
            company_hits = company_hits.len(),
            rfp_hits = rfp_hits.len(),
            "retrieved rfp review context"
        );

        Ok(RfpContext {
            company: join_chunk_text(&company_hits, "\n"),
            rfp: join_chunk_text(&rfp_hits, "\n"),
        })
    }

    pub async fn review(&self, company_text: &str, rfp_text: &str) -> Result<RfpReview, PipelineError> {
        let context = self.retrieve(company_text, rfp_text).await?;
        self.review_context(&context).await
    }

    pub async fn review_context(&self, context: &RfpContext) -> Result<RfpReview, PipelineError> {
        let guidelines = self
            .guidelines
            .as_deref()
            .map(|text| format!("\nUse the following historical evaluation guidelines to support your decision:\n{text}\n"))
            .unwrap_or_default();

        let both = [
            ("rfp_chunk", context.rfp.as_str()),
            ("company_chunk", context.company.as_str()),
            ("guidelines", guidelines.as_str()),
        ];

        let eligibility = self.run(prompts::RFP_ELIGIBILITY, &both).await?;
        let gap_analysis = self.run(prompts::RFP_GAP_ANALYSIS, &both).await?;
        let submission_checklist = self.run(prompts::RFP_SUBMISSION_CHECKLIST, &both).await?;
        let risks = self.run(prompts::RFP_RISKS, &both).await?;

        Ok(RfpReview {
            eligibility,
            gap_analysis,
            submission_checklist,
            risks,
        })
    }

    async fn run(&self, template: &str, values: &[(&str, &str)]) -> Result<String, PipelineError> {
        let prompt = PromptTemplate::new(template).render(values)?;
        Ok(self.model.complete(&prompt).await?)
    }
}
