//! Semantic clustering: groups concepts into topics.
//!
//! The primary path embeds every concept and agglomeratively merges the most
//! similar clusters until the topic count lands in the configured band. The
//! stage never fails the pipeline: any backend error degrades to the
//! heuristic concept-type grouping in [`fallback_by_type`].

use tracing::warn;
use uuid::Uuid;

use revio_core::{defaults, Concept, ConceptType, EmbeddingBackend, Topic};

use crate::cleaner::{is_stopword, tokenize};

/// What the clustering stage produced: the topics, and whether the
/// embedding path was taken (the fallback grouping needs no model).
pub struct ClusterOutcome {
    pub topics: Vec<Topic>,
    pub used_embeddings: bool,
}

/// Group concepts into 2..=9 topics (fewer only when there are fewer
/// concepts than the minimum).
///
/// Infallible: embedding errors are logged and answered with the
/// concept-type fallback grouping.
pub async fn cluster_concepts(
    concepts: &[Concept],
    backend: &dyn EmbeddingBackend,
) -> ClusterOutcome {
    if concepts.is_empty() {
        return ClusterOutcome {
            topics: Vec::new(),
            used_embeddings: false,
        };
    }
    if concepts.len() == 1 {
        return ClusterOutcome {
            topics: vec![make_topic(&[&concepts[0]])],
            used_embeddings: false,
        };
    }

    let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(concepts.len());
    for concept in concepts {
        let text = format!("{}: {}", concept.term, concept.short_definition);
        match backend.embed(&text).await {
            Ok(v) => embeddings.push(v),
            Err(e) => {
                warn!(error = %e, "Embedding failed, falling back to type grouping");
                return ClusterOutcome {
                    topics: fallback_by_type(concepts),
                    used_embeddings: false,
                };
            }
        }
    }

    ClusterOutcome {
        topics: agglomerate(concepts, embeddings),
        used_embeddings: true,
    }
}

/// Agglomerative merge: every concept starts as its own cluster; the most
/// similar pair (by centroid cosine) merges until the count is within the
/// maximum and no pair clears the similarity threshold above the minimum.
fn agglomerate(concepts: &[Concept], embeddings: Vec<Vec<f32>>) -> Vec<Topic> {
    struct Cluster {
        members: Vec<usize>,
        centroid: Vec<f32>,
    }

    let mut clusters: Vec<Cluster> = embeddings
        .into_iter()
        .enumerate()
        .map(|(i, centroid)| Cluster {
            members: vec![i],
            centroid,
        })
        .collect();

    loop {
        if clusters.len() <= defaults::CLUSTER_MIN_TOPICS {
            break;
        }

        // Best pair by centroid similarity; ties resolve to the earliest
        // pair so clustering is deterministic.
        let mut best: Option<(usize, usize, f32)> = None;
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let sim = cosine_similarity(&clusters[a].centroid, &clusters[b].centroid);
                if best.is_none_or(|(_, _, s)| sim > s) {
                    best = Some((a, b, sim));
                }
            }
        }

        let Some((a, b, sim)) = best else { break };
        let over_max = clusters.len() > defaults::CLUSTER_MAX_TOPICS;
        if !over_max && sim < defaults::CLUSTER_SIMILARITY_THRESHOLD {
            break;
        }

        let absorbed = clusters.swap_remove(b);
        let target = &mut clusters[a];
        target.members.extend(absorbed.members);
        target.centroid = mean_vector(&target.centroid, &absorbed.centroid);
    }

    // Emit topics in the order of each cluster's earliest member, so output
    // order follows source order.
    let mut ordered: Vec<&Cluster> = clusters.iter().collect();
    ordered.sort_by_key(|c| c.members.iter().min().copied().unwrap_or(usize::MAX));

    ordered
        .into_iter()
        .map(|cluster| {
            let mut members: Vec<&Concept> =
                cluster.members.iter().map(|i| &concepts[*i]).collect();
            members.sort_by(|a, b| {
                b.importance
                    .partial_cmp(&a.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            make_topic(&members)
        })
        .collect()
}

/// Heuristic grouping by concept type, in a fixed display order. Used when
/// embeddings are unavailable; never fails.
pub fn fallback_by_type(concepts: &[Concept]) -> Vec<Topic> {
    const ORDER: [ConceptType; 6] = [
        ConceptType::Definition,
        ConceptType::Comparison,
        ConceptType::TypeList,
        ConceptType::Process,
        ConceptType::Example,
        ConceptType::Simple,
    ];

    let mut topics = Vec::new();
    for concept_type in ORDER {
        let members: Vec<&Concept> = concepts
            .iter()
            .filter(|c| c.concept_type == concept_type)
            .collect();
        if members.is_empty() {
            continue;
        }
        topics.push(Topic {
            id: Uuid::new_v4(),
            title: concept_type.label().to_string(),
            category: String::new(),
            concept_ids: members.iter().map(|c| c.id).collect(),
        });
    }
    topics
}

/// Cosine similarity of two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn mean_vector(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| (x + y) / 2.0).collect()
}

/// Synthesize a topic from its member concepts: title from the most
/// frequent salient token among member terms, falling back to the highest
/// importance member's term.
fn make_topic(members: &[&Concept]) -> Topic {
    let title = if members.len() == 1 {
        members[0].term.clone()
    } else {
        synthesize_title(members)
    };

    Topic {
        id: Uuid::new_v4(),
        title,
        category: String::new(),
        concept_ids: members.iter().map(|c| c.id).collect(),
    }
}

fn synthesize_title(members: &[&Concept]) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for concept in members {
        for token in tokenize(&concept.term) {
            if is_stopword(&token) || token.len() < 3 {
                continue;
            }
            match counts.iter_mut().find(|(t, _)| *t == token) {
                Some((_, n)) => *n += 1,
                None => counts.push((token, 1)),
            }
        }
    }

    // First-seen order breaks frequency ties deterministically.
    let best = counts.iter().max_by_key(|(_, n)| *n);
    match best {
        Some((token, n)) if *n >= 2 => title_case(token),
        _ => members[0].term.clone(),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
