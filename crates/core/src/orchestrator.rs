use crate::context::assemble_context;
use crate::embeddings::Embedder;
use crate::models::{
    Answer, EmbeddingPrefixes, QueryContext, RetrievalOptions, ScoredCandidate, SourceSection,
};
use crate::ranking::rank_candidates;
use crate::reference::{normalize_question, parse_section_ref};
use crate::traits::{LanguageModel, VectorIndex};
use crate::SearchError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Question-answering pipeline over explicitly constructed service handles.
/// Build one at startup and share it by reference; queries hold no state.
pub struct LawAssistant<E, V, L>
where
    E: Embedder,
    V: VectorIndex,
    L: LanguageModel,
{
    embedder: E,
    index: V,
    model: L,
    prefixes: EmbeddingPrefixes,
    options: RetrievalOptions,
}

async fn with_timeout<T, F>(operation: &str, limit: Duration, future: F) -> Result<T, SearchError>
where
    F: Future<Output = Result<T, SearchError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout {
            operation: operation.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

impl<E, V, L> LawAssistant<E, V, L>
where
    E: Embedder + Send + Sync,
    V: VectorIndex + Send + Sync,
    L: LanguageModel + Send + Sync,
{
    pub fn new(embedder: E, index: V, model: L) -> Self {
        Self {
            embedder,
            index,
            model,
            prefixes: EmbeddingPrefixes::default(),
            options: RetrievalOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RetrievalOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_prefixes(mut self, prefixes: EmbeddingPrefixes) -> Self {
        self.prefixes = prefixes;
        self
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    /// Embeds the normalized question and searches the index, bounded by the
    /// search timeout.
    pub async fn retrieve(
        &self,
        normalized_question: &str,
    ) -> Result<Vec<ScoredCandidate>, SearchError> {
        let query_text = format!("{}{}", self.prefixes.query, normalized_question);
        with_timeout("similarity search", self.options.search_timeout, async {
            let query_vector = self.embedder.embed(&query_text).await?;
            self.index.search(&query_vector, self.options.search_k).await
        })
        .await
    }

    /// Sole public entry point. Every failure is folded into the returned
    /// `Answer`; nothing propagates to the caller.
    pub async fn answer_question(&self, question: &str) -> Answer {
        let mut query = QueryContext {
            normalized_question: normalize_question(question),
            ..QueryContext::default()
        };

        if query.normalized_question.is_empty() {
            return Answer::error("question is empty");
        }

        query.section_ref = match parse_section_ref(&query.normalized_question) {
            Ok(section_ref) => section_ref,
            Err(pattern_error) => {
                error!(error = %pattern_error, "section reference pattern failed to compile");
                return Answer::error(pattern_error);
            }
        };
        debug!(
            section_ref = query.section_ref.as_deref().unwrap_or("None"),
            "parsed section reference"
        );

        let candidates = match self.retrieve(&query.normalized_question).await {
            Ok(candidates) => candidates,
            Err(search_error) => {
                warn!(error = %search_error, "similarity search failed");
                return Answer::error(search_error);
            }
        };
        debug!(candidates = candidates.len(), "similarity search returned");

        if candidates.is_empty() {
            return Answer::no_relevant_section();
        }

        query.ranked = rank_candidates(&candidates, query.section_ref.as_deref(), &self.options);
        let (prompt, cited) = assemble_context(&query.ranked, question);
        query.prompt = prompt;

        let completion = with_timeout(
            "llm completion",
            self.options.llm_timeout,
            self.model.complete(&query.prompt),
        )
        .await;

        match completion {
            Ok(answer) => Answer {
                result: answer.trim().to_string(),
                source_sections: cited.iter().map(SourceSection::from).collect(),
            },
            Err(llm_error) => {
                error!(error = %llm_error, "LLM invocation failed");
                Answer {
                    result: format!("LLM Error: {llm_error}"),
                    source_sections: Vec::new(),
                }
            }
        }
    }
}
