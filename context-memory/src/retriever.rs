//! Few-shot example retrieval.
//!
//! The corpus is embedded once when the retriever is built and never
//! mutated afterwards. Each refresh embeds the live conversation, ranks the
//! corpus by cosine similarity and replaces the selection wholesale.
//!
//! ## Ranking
//!
//! The selection holds the `fewshot` most similar entries; on equal
//! similarity the entry that appears earlier in the corpus is kept. The
//! chosen entries are ordered by ascending similarity, ties in corpus
//! order, so the most similar example comes last and lands closest to the
//! live conversation in the assembled prompt.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::capability::Embedder;
use super::errors::CapabilityError;
use super::similarity::cosine_similarity;
use super::turn::{query_text, Turn};

/// Default number of examples selected per refresh.
pub const DEFAULT_FEWSHOT: usize = 5;

/// A corpus transcript with its precomputed embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub embedding: Vec<f32>,
    pub turns: Vec<Turn>,
}

/// Read an example corpus file: a JSON list of transcripts, each a list of
/// `{role, content}` records.
///
/// A missing or unparsable file yields an empty corpus. Transcripts that do
/// not decode are skipped individually.
pub fn load_corpus_file(path: &Path) -> Vec<Vec<Turn>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "no example corpus found");
            return Vec::new();
        }
    };
    parse_corpus(&data).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "example corpus is not a JSON list");
        Vec::new()
    })
}

/// Decode a corpus document, skipping malformed transcripts.
pub fn parse_corpus(json: &str) -> Result<Vec<Vec<Turn>>, serde_json::Error> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut transcripts = Vec::with_capacity(raw.len());
    for (idx, value) in raw.into_iter().enumerate() {
        match serde_json::from_value::<Vec<Turn>>(value) {
            Ok(turns) => transcripts.push(turns),
            Err(e) => warn!(index = idx, error = %e, "skipping malformed example transcript"),
        }
    }
    Ok(transcripts)
}

/// Corpus position paired with its similarity to the query.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    similarity: f64,
    index: usize,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier corpus position wins ties.
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| other.index.cmp(&self.index))
    }
}

/// Static example corpus plus the current selection.
#[derive(Debug, Clone)]
pub struct ExampleRetriever {
    corpus: Vec<Example>,
    fewshot: usize,
    selected: Vec<usize>,
}

impl Default for ExampleRetriever {
    fn default() -> Self {
        Self::from_examples(Vec::new(), DEFAULT_FEWSHOT)
    }
}

impl ExampleRetriever {
    /// Wrap an already-embedded corpus.
    pub fn from_examples(corpus: Vec<Example>, fewshot: usize) -> Self {
        Self {
            corpus,
            fewshot,
            selected: Vec::new(),
        }
    }

    /// Embed every transcript and keep the ones that succeed.
    pub async fn build(
        transcripts: Vec<Vec<Turn>>,
        embedder: &dyn Embedder,
        fewshot: usize,
    ) -> Self {
        let total = transcripts.len();
        let mut corpus = Vec::with_capacity(total);
        for (idx, turns) in transcripts.into_iter().enumerate() {
            let text = query_text(&turns);
            match embedder.embed(&text).await {
                Ok(embedding) => corpus.push(Example { embedding, turns }),
                Err(e) => warn!(index = idx, error = %e, "dropping example that failed to embed"),
            }
        }
        info!(loaded = corpus.len(), total, "example corpus ready");
        Self::from_examples(corpus, fewshot)
    }

    /// Indices of the top `fewshot` corpus entries for `query`, by
    /// ascending similarity with ties in corpus order.
    pub fn select(&self, query: &[f32]) -> Vec<usize> {
        if self.fewshot == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(self.fewshot + 1);
        for (index, example) in self.corpus.iter().enumerate() {
            let mut similarity = cosine_similarity(&example.embedding, query);
            if similarity.is_nan() {
                similarity = f64::NEG_INFINITY;
            }
            let candidate = Ranked { similarity, index };

            if heap.len() < self.fewshot {
                heap.push(Reverse(candidate));
            } else if heap.peek().is_some_and(|Reverse(worst)| candidate > *worst) {
                heap.pop();
                heap.push(Reverse(candidate));
            }
        }

        let mut top: Vec<Ranked> = heap.into_iter().map(|Reverse(r)| r).collect();
        top.sort_by(|a, b| {
            a.similarity
                .total_cmp(&b.similarity)
                .then_with(|| a.index.cmp(&b.index))
        });
        top.into_iter().map(|r| r.index).collect()
    }

    /// Re-rank the corpus against `turns` and replace the selection.
    ///
    /// Returns the number of selected examples. An empty corpus selects
    /// nothing without calling the embedder.
    pub async fn refresh(
        &mut self,
        turns: &[Turn],
        embedder: &dyn Embedder,
    ) -> Result<usize, CapabilityError> {
        if self.corpus.is_empty() || self.fewshot == 0 {
            self.selected.clear();
            return Ok(0);
        }

        let text = query_text(turns);
        let embedding = embedder.embed(&text).await?;
        self.selected = self.select(&embedding);

        for example in self.selected() {
            if let Some(first) = example.turns.first() {
                debug!(first_turn = %first.content, "selected example");
            }
        }
        Ok(self.selected.len())
    }

    /// Currently selected examples in selection order.
    pub fn selected(&self) -> Vec<&Example> {
        self.selected
            .iter()
            .filter_map(|&idx| self.corpus.get(idx))
            .collect()
    }

    pub fn corpus(&self) -> &[Example] {
        &self.corpus
    }

    pub fn fewshot(&self) -> usize {
        self.fewshot
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }
}
