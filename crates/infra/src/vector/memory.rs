//! In-process vector store.
//!
//! Brute-force scoring over every point of a collection. Used by tests and
//! by local runs that have no external store configured.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use vectorsync_core::VectorStoreApi;
use vectorsync_domain::{
    CollectionInfo, CollectionSpec, Distance, FieldCondition, MatchValue, PayloadValue,
    RecordPayload, Result, VectorFilter, VectorMatch, VectorRecord, VectorSyncError,
};

struct Collection {
    spec: CollectionSpec,
    points: BTreeMap<String, VectorRecord>,
}

/// Vector store kept entirely in memory.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in `collection`, zero when it does not exist.
    pub fn len(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, |c| c.points.len())
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

fn missing(collection: &str) -> VectorSyncError {
    VectorSyncError::NotFound(format!("collection '{collection}'"))
}

#[async_trait]
impl VectorStoreApi for InMemoryVectorStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<bool> {
        let mut collections = self.collections.write();
        if collections.contains_key(&spec.name) {
            return Ok(false);
        }
        collections
            .insert(spec.name.clone(), Collection { spec: spec.clone(), points: BTreeMap::new() });
        Ok(true)
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<usize> {
        let mut collections = self.collections.write();
        let target = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        if let Some(bad) = records.iter().find(|r| r.values.len() != target.spec.dimensions) {
            return Err(VectorSyncError::InvalidInput(format!(
                "point '{}' has {} dimensions, collection expects {}",
                bad.id,
                bad.values.len(),
                target.spec.dimensions
            )));
        }
        for record in records {
            target.points.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write();
        let target = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        for id in ids {
            target.points.remove(id);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorMatch>> {
        let collections = self.collections.read();
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;

        let mut matches: Vec<VectorMatch> = target
            .points
            .values()
            .filter(|p| filter.map_or(true, |f| matches_filter(&p.metadata, f)))
            .map(|p| VectorMatch {
                id: p.id.clone(),
                score: score(target.spec.distance, vector, &p.values),
                payload: Some(p.metadata.clone()),
            })
            .filter(|m| score_threshold.map_or(true, |t| m.score >= t))
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn retrieve(&self, collection: &str, ids: &[String]) -> Result<Vec<VectorRecord>> {
        let collections = self.collections.read();
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(ids.iter().filter_map(|id| target.points.get(id).cloned()).collect())
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        let collections = self.collections.read();
        let target = collections.get(collection).ok_or_else(|| missing(collection))?;
        let count = target.points.len() as u64;
        Ok(CollectionInfo {
            name: collection.to_string(),
            status: "green".to_string(),
            points_count: count,
            indexed_vectors_count: count,
            segments_count: 1,
            dimensions: target.spec.dimensions,
        })
    }

    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}

//==============================================================================
// Scoring
//==============================================================================

/// Higher is more similar for every metric; euclidean distance `d` maps
/// to `1 / (1 + d)`.
fn score(distance: Distance, a: &[f32], b: &[f32]) -> f32 {
    match distance {
        Distance::Cosine => cosine_sim(a, b),
        Distance::Dot => dot(a, b),
        Distance::Euclid => {
            if a.len() != b.len() {
                return 0.0;
            }
            let d: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
            1.0 / (1.0 + d)
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity; 0.0 for mismatched lengths or a zero vector.
pub fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (mag_a * mag_b)
}

//==============================================================================
// Filter evaluation
//==============================================================================

fn matches_filter(payload: &RecordPayload, filter: &VectorFilter) -> bool {
    filter.must.iter().all(|c| matches_condition(payload, c))
        && !filter.must_not.iter().any(|c| matches_condition(payload, c))
}

/// A condition on an absent field never matches.
fn matches_condition(payload: &RecordPayload, condition: &FieldCondition) -> bool {
    let Some(field) = payload.field(condition.key()) else {
        return false;
    };
    match condition {
        FieldCondition::Match { value, .. } => value_matches(&field, value),
        FieldCondition::MatchAny { values, .. } => values.iter().any(|v| value_matches(&field, v)),
        FieldCondition::Range { gte, lte, .. } => {
            let number = match field {
                PayloadValue::Int(n) => n as f64,
                PayloadValue::Float(f) => f,
                _ => return false,
            };
            gte.map_or(true, |min| number >= min) && lte.map_or(true, |max| number <= max)
        }
    }
}

fn value_matches(field: &PayloadValue<'_>, value: &MatchValue) -> bool {
    match (field, value) {
        (PayloadValue::Int(a), MatchValue::Int(b)) => a == b,
        (PayloadValue::Ints(items), MatchValue::Int(b)) => items.contains(b),
        (PayloadValue::Bool(a), MatchValue::Bool(b)) => a == b,
        (PayloadValue::Text(a), MatchValue::Text(b)) => *a == b.as_str(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use vectorsync_domain::{IndexParams, SourceRecord};

    use super::*;

    fn spec(dimensions: usize) -> CollectionSpec {
        CollectionSpec {
            name: "records".into(),
            dimensions,
            distance: Distance::Cosine,
            index: IndexParams::default(),
        }
    }

    fn point(id: i64, values: Vec<f32>, stage: i64, tags: Vec<i64>) -> VectorRecord {
        let mut record = SourceRecord::new(id, format!("Lead {id}"));
        record.stage = Some(vectorsync_domain::NamedRef::new(stage, "Stage"));
        record.tag_ids = tags;
        record.expected_revenue = Some(id as f64 * 1000.0);
        VectorRecord::new(values, RecordPayload::from_record(&record, String::new(), 1, Utc::now()))
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert!((cosine_sim(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_sim(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_sim(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_sim(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn upsert_requires_collection_and_matching_dimensions() {
        let store = InMemoryVectorStore::new();
        let err = store.upsert("records", &[point(1, vec![1.0, 0.0], 1, vec![])]).await;
        assert!(matches!(err, Err(VectorSyncError::NotFound(_))));

        assert!(store.ensure_collection(&spec(2)).await.expect("created"));
        assert!(!store.ensure_collection(&spec(2)).await.expect("exists"));

        let err = store.upsert("records", &[point(1, vec![1.0, 0.0, 0.0], 1, vec![])]).await;
        assert!(matches!(err, Err(VectorSyncError::InvalidInput(_))));
        assert!(store.is_empty("records"));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_point() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(&spec(2)).await.expect("created");
        store.upsert("records", &[point(1, vec![1.0, 0.0], 1, vec![])]).await.expect("first");
        store.upsert("records", &[point(1, vec![0.0, 1.0], 2, vec![])]).await.expect("second");

        let stored = store.retrieve("records", &["lead-1".into()]).await.expect("retrieve");
        assert_eq!(store.len("records"), 1);
        assert_eq!(stored[0].values, vec![0.0, 1.0]);
        assert_eq!(stored[0].metadata.stage_id, Some(2));
    }

    #[tokio::test]
    async fn search_ranks_and_filters() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(&spec(2)).await.expect("created");
        store
            .upsert(
                "records",
                &[
                    point(1, vec![1.0, 0.0], 1, vec![7]),
                    point(2, vec![0.9, 0.1], 2, vec![7, 8]),
                    point(3, vec![0.0, 1.0], 1, vec![8]),
                ],
            )
            .await
            .expect("upsert");

        let all = store.search("records", &[1.0, 0.0], 10, None, None).await.expect("search");
        let ids: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["lead-1", "lead-2", "lead-3"]);

        let filter = VectorFilter {
            must: vec![FieldCondition::MatchAny { key: "tag_ids".into(), values: vec![MatchValue::Int(8)] }],
            must_not: vec![FieldCondition::Match { key: "stage_id".into(), value: MatchValue::Int(1) }],
        };
        let hits = store.search("records", &[1.0, 0.0], 10, Some(&filter), None).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "lead-2");

        let thresholded =
            store.search("records", &[1.0, 0.0], 10, None, Some(0.5)).await.expect("search");
        assert_eq!(thresholded.len(), 2);
    }

    #[tokio::test]
    async fn range_condition_skips_points_without_the_field() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(&spec(2)).await.expect("created");
        let mut bare = point(4, vec![1.0, 0.0], 1, vec![]);
        bare.metadata.expected_revenue = None;
        store
            .upsert("records", &[point(1, vec![1.0, 0.0], 1, vec![]), point(3, vec![1.0, 0.0], 1, vec![]), bare])
            .await
            .expect("upsert");

        let filter = VectorFilter {
            must: vec![FieldCondition::Range { key: "expected_revenue".into(), gte: Some(2000.0), lte: None }],
            must_not: vec![],
        };
        let hits = store.search("records", &[1.0, 0.0], 10, Some(&filter), None).await.expect("search");
        assert_eq!(hits.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), ["lead-3"]);
    }

    #[tokio::test]
    async fn delete_and_info() {
        let store = InMemoryVectorStore::new();
        store.ensure_collection(&spec(2)).await.expect("created");
        store
            .upsert("records", &[point(1, vec![1.0, 0.0], 1, vec![]), point(2, vec![0.0, 1.0], 1, vec![])])
            .await
            .expect("upsert");
        store.delete("records", &["lead-1".into(), "lead-9".into()]).await.expect("delete");

        let info = store.collection_info("records").await.expect("info");
        assert_eq!(info.points_count, 1);
        assert_eq!(info.dimensions, 2);
    }
}
