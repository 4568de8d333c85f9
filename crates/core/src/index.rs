use crate::chunking::{chunk_passages, ChunkingConfig};
use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{IndexError, RetrievalError};
use crate::models::{Document, RetrievalResult, ScoredPassage};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct IndexedPassage {
    document_id: String,
    source_name: String,
    chunk_index: u64,
    text: String,
    embedding: Vec<f32>,
}

pub struct VectorIndex<E> {
    embedder: E,
    dimensions: usize,
    entries: Vec<IndexedPassage>,
}

impl<E> VectorIndex<E>
where
    E: Embedder + Send + Sync,
{
    pub async fn build(
        documents: &[Document],
        embedder: E,
        chunking: &ChunkingConfig,
    ) -> Result<Self, IndexError> {
        let dimensions = embedder.dimensions();
        let mut entries = Vec::new();
        let mut cursor = 0u64;

        for document in documents {
            for passage in chunk_passages(&document.text, chunking) {
                let embedding = embedder.embed(&passage).await?;
                if embedding.len() != dimensions {
                    return Err(IndexError::DimensionMismatch {
                        expected: dimensions,
                        got: embedding.len(),
                    });
                }

                entries.push(IndexedPassage {
                    document_id: document.id.clone(),
                    source_name: document.source_name.clone(),
                    chunk_index: cursor,
                    text: passage,
                    embedding,
                });
                cursor += 1;
            }
        }

        Ok(Self {
            embedder,
            dimensions,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn query(&self, text: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(RetrievalResult {
                query: text.to_string(),
                passages: Vec::new(),
            });
        }

        let query_vector = self.embedder.embed(text).await?;
        if query_vector.len() != self.dimensions {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimensions,
                got: query_vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(ordinal, entry)| (ordinal, cosine_similarity(&query_vector, &entry.embedding)))
            .collect();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
        scored.truncate(k);

        let passages = scored
            .into_iter()
            .map(|(ordinal, score)| {
                let entry = &self.entries[ordinal];
                ScoredPassage {
                    document_id: entry.document_id.clone(),
                    source_name: entry.source_name.clone(),
                    chunk_index: entry.chunk_index,
                    text: entry.text.clone(),
                    score,
                }
            })
            .collect();

        Ok(RetrievalResult {
            query: text.to_string(),
            passages,
        })
    }
}

pub struct IndexCache<E> {
    slot: RwLock<Option<Arc<VectorIndex<E>>>>,
}

impl<E> IndexCache<E> {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }
}

impl<E> Default for IndexCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> IndexCache<E>
where
    E: Embedder + Send + Sync,
{
    pub async fn get_or_build<F, Fut>(&self, build: F) -> Result<Arc<VectorIndex<E>>, IndexError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<VectorIndex<E>, IndexError>>,
    {
        if let Some(index) = self.slot.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.slot.write().await;
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }

        let index = Arc::new(build().await?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::EmbedError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn dimensions(&self) -> usize {
            8
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Err(EmbedError::MalformedResponse("embedder offline".to_string()))
        }
    }

    struct WrongSizeEmbedder;

    #[async_trait]
    impl Embedder for WrongSizeEmbedder {
        fn dimensions(&self) -> usize {
            8
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![1.0, 2.0])
        }
    }

    // right-sized vector on the first call, short ones afterwards
    struct DriftingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for DriftingEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![1.0, 0.0, 0.0, 0.0])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }
    }

    fn document(id: &str, name: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            source_name: name.to_string(),
            text: text.to_string(),
        }
    }

    fn test_chunking() -> ChunkingConfig {
        ChunkingConfig {
            max_chars: 200,
            overlap_chars: 20,
            min_chars: 1,
        }
    }

    #[tokio::test]
    async fn empty_index_answers_without_consulting_the_embedder() {
        let index = VectorIndex::build(&[], FailingEmbedder, &test_chunking())
            .await
            .unwrap();

        let result = index.query("anything", 4).await.unwrap();

        assert_eq!(result.query, "anything");
        assert!(result.passages.is_empty());
    }

    #[tokio::test]
    async fn closest_passage_ranks_first() {
        let documents = vec![
            document("a", "pumps.txt", "Hydraulic pumps convert torque into flow."),
            document("b", "birds.txt", "Migratory birds navigate by the stars."),
        ];
        let index = VectorIndex::build(
            &documents,
            CharacterNgramEmbedder::default(),
            &test_chunking(),
        )
        .await
        .unwrap();

        let result = index.query("hydraulic pump flow", 2).await.unwrap();

        assert_eq!(result.passages.len(), 2);
        assert_eq!(result.passages[0].source_name, "pumps.txt");
        assert!(result.passages[0].score >= result.passages[1].score);
    }

    #[tokio::test]
    async fn repeated_queries_rank_identically() {
        let documents = vec![
            document("a", "one.txt", "Alpha beta gamma delta."),
            document("b", "two.txt", "Beta gamma delta epsilon."),
            document("c", "three.txt", "Gamma delta epsilon zeta."),
        ];
        let index = VectorIndex::build(
            &documents,
            CharacterNgramEmbedder::default(),
            &test_chunking(),
        )
        .await
        .unwrap();

        let first = index.query("beta gamma", 3).await.unwrap();
        let second = index.query("beta gamma", 3).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn equal_scores_keep_insertion_order() {
        let documents = vec![
            document("a", "copy-a.txt", "Identical passage text."),
            document("b", "copy-b.txt", "Identical passage text."),
        ];
        let index = VectorIndex::build(
            &documents,
            CharacterNgramEmbedder::default(),
            &test_chunking(),
        )
        .await
        .unwrap();

        let result = index.query("identical passage", 2).await.unwrap();

        assert_eq!(result.passages[0].chunk_index, 0);
        assert_eq!(result.passages[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn top_k_caps_the_result() {
        let documents = vec![
            document("a", "one.txt", "First passage."),
            document("b", "two.txt", "Second passage."),
            document("c", "three.txt", "Third passage."),
        ];
        let index = VectorIndex::build(
            &documents,
            CharacterNgramEmbedder::default(),
            &test_chunking(),
        )
        .await
        .unwrap();

        assert_eq!(index.len(), 3);
        let result = index.query("passage", 2).await.unwrap();
        assert_eq!(result.passages.len(), 2);
    }

    #[tokio::test]
    async fn wrong_embedding_size_fails_the_build() {
        let documents = vec![document("a", "one.txt", "Some text to embed.")];

        let result = VectorIndex::build(&documents, WrongSizeEmbedder, &test_chunking()).await;

        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch {
                expected: 8,
                got: 2
            })
        ));
    }

    #[tokio::test]
    async fn wrong_query_embedding_size_fails_the_query() {
        let documents = vec![document("a", "one.txt", "Some text to embed.")];
        let index = VectorIndex::build(
            &documents,
            DriftingEmbedder {
                calls: AtomicUsize::new(0),
            },
            &test_chunking(),
        )
        .await
        .unwrap();

        let result = index.query("anything", 2).await;

        assert!(matches!(
            result,
            Err(RetrievalError::DimensionMismatch {
                expected: 4,
                got: 2
            })
        ));
    }

    #[tokio::test]
    async fn cache_builds_at_most_once() {
        let cache = IndexCache::new();
        let builds = AtomicUsize::new(0);

        let first = cache
            .get_or_build(|| async {
                builds.fetch_add(1, Ordering::SeqCst);
                VectorIndex::build(&[], CharacterNgramEmbedder::default(), &test_chunking()).await
            })
            .await
            .unwrap();
        let second = cache
            .get_or_build(|| async {
                builds.fetch_add(1, Ordering::SeqCst);
                VectorIndex::build(&[], CharacterNgramEmbedder::default(), &test_chunking()).await
            })
            .await
            .unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn concurrent_first_callers_share_one_build() {
        let cache = Arc::new(IndexCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let make_task = |cache: Arc<IndexCache<CharacterNgramEmbedder>>,
                         builds: Arc<AtomicUsize>| async move {
            cache
                .get_or_build(|| async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    VectorIndex::build(&[], CharacterNgramEmbedder::default(), &test_chunking())
                        .await
                })
                .await
                .unwrap()
        };

        let (first, second) = tokio::join!(
            make_task(Arc::clone(&cache), Arc::clone(&builds)),
            make_task(Arc::clone(&cache), Arc::clone(&builds))
        );

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn invalidate_forces_a_rebuild() {
        let cache = IndexCache::new();
        let builds = AtomicUsize::new(0);

        cache
            .get_or_build(|| async {
                builds.fetch_add(1, Ordering::SeqCst);
                VectorIndex::build(&[], CharacterNgramEmbedder::default(), &test_chunking()).await
            })
            .await
            .unwrap();

        cache.invalidate().await;

        cache
            .get_or_build(|| async {
                builds.fetch_add(1, Ordering::SeqCst);
                VectorIndex::build(&[], CharacterNgramEmbedder::default(), &test_chunking()).await
            })
            .await
            .unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }
}
