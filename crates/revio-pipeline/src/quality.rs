//! Quality validation: deterministic scoring of an assembled document.
//!
//! Four pure scorers (accuracy, clarity, separation, structure) each rate
//! the document on a 0..=10 scale; the overall score is their fixed-weight
//! combination. Scoring reads only the document's sections, so validating
//! the same document twice always yields identical metrics.

use std::collections::HashSet;

use revio_core::{defaults, ConceptType, FormattedBlock, QualityMetrics, ReviewerDocument, TopicSection};

/// Placeholder fragments that indicate an unusable definition.
const PLACEHOLDER_MARKERS: &[&str] = &["todo", "tbd", "lorem ipsum", "???", "placeholder"];

/// Extraction junk the cleaner should have removed: replacement characters,
/// soft hyphens, stray pipes, surviving ellipsis runs.
const NOISE_MARKERS: &[&str] = &["\u{FFFD}", "\u{00AD}", "|", "..."];

/// Score a document on the four quality dimensions.
///
/// Pure and idempotent: metrics depend only on the document's topic
/// sections, never on previously attached metrics.
pub fn validate(doc: &ReviewerDocument) -> QualityMetrics {
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if doc.topics.is_empty() {
        issues.push("document has no topics".to_string());
        return QualityMetrics {
            issues,
            ..QualityMetrics::default()
        };
    }

    let accuracy = score_accuracy(&doc.topics, &mut issues, &mut recommendations);
    let clarity = score_clarity(&doc.topics, &mut issues, &mut recommendations);
    let separation = score_separation(&doc.topics, &mut issues, &mut recommendations);
    let structure = score_structure(&doc.topics, &mut recommendations);

    let overall = round1(
        accuracy * defaults::QUALITY_WEIGHT_ACCURACY
            + clarity * defaults::QUALITY_WEIGHT_CLARITY
            + separation * defaults::QUALITY_WEIGHT_SEPARATION
            + structure * defaults::QUALITY_WEIGHT_STRUCTURE,
    );

    QualityMetrics {
        accuracy,
        clarity,
        separation,
        structure,
        overall,
        issues,
        recommendations,
    }
}

/// Accuracy: penalizes definitions too thin to carry meaning and
/// placeholder text that slipped through extraction.
fn score_accuracy(
    topics: &[TopicSection],
    issues: &mut Vec<String>,
    recommendations: &mut Vec<String>,
) -> f32 {
    let mut score: f32 = 10.0;

    for block in blocks(topics) {
        let primary = primary_line(block);
        if word_count(primary) < 3 {
            score -= 1.0;
            issues.push(format!("definition for '{}' is too thin", block.heading));
        }
        let lower = block.lines.join(" ").to_lowercase();
        if PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m)) {
            score -= 1.5;
            issues.push(format!("placeholder text under '{}'", block.heading));
        }
    }

    if score < 10.0 {
        recommendations.push("expand thin definitions with supporting detail".to_string());
    }
    round1(score.clamp(0.0, 10.0))
}

/// Clarity: rewards study-sized definitions (10-30 words); penalizes run-on
/// lines, overlength lines, residual extraction noise, and blocks with
/// almost no content.
fn score_clarity(
    topics: &[TopicSection],
    issues: &mut Vec<String>,
    recommendations: &mut Vec<String>,
) -> f32 {
    let mut score: f32 = 8.0;
    let mut block_count = 0usize;
    let mut study_sized = 0usize;

    for block in blocks(topics) {
        block_count += 1;
        if (10..=30).contains(&word_count(primary_line(block))) {
            study_sized += 1;
        }
        if block.lines.iter().any(|l| word_count(l) > 40) {
            score -= 0.5;
            issues.push(format!("run-on line under '{}'", block.heading));
        }
        if block
            .lines
            .iter()
            .any(|l| l.chars().count() > defaults::COMPRESS_MAX_CHARS)
        {
            score -= 1.0;
            issues.push(format!("overlength line under '{}'", block.heading));
        }
        if block.lines.iter().any(|l| has_residual_noise(l)) {
            score -= 0.5;
            issues.push(format!(
                "residual extraction noise under '{}'",
                block.heading
            ));
        }
        let total_words: usize = block.lines.iter().map(|l| word_count(l)).sum();
        if total_words < 2 {
            score -= 0.5;
            issues.push(format!("'{}' has almost no content", block.heading));
        }
    }

    // Reward documents whose definitions mostly read at study size.
    if block_count > 0 && study_sized * 2 >= block_count {
        score += 2.0;
    }

    if score < 8.0 {
        recommendations.push("split long sentences into separate lines".to_string());
    }
    round1(score.clamp(0.0, 10.0))
}

fn has_residual_noise(line: &str) -> bool {
    NOISE_MARKERS.iter().any(|m| line.contains(m))
}

/// Separation: penalizes merged entries, duplicate headings, and
/// overcrowded topics.
fn score_separation(
    topics: &[TopicSection],
    issues: &mut Vec<String>,
    recommendations: &mut Vec<String>,
) -> f32 {
    let mut score: f32 = 10.0;
    let mut seen_headings: HashSet<String> = HashSet::new();

    for block in blocks(topics) {
        // Comparisons legitimately name two things; any other heading that
        // conjoins two terms is a merged entry the detector should have
        // split.
        if block.concept_type != ConceptType::Comparison
            && (block.heading.contains(" and ") || block.heading.contains(" & "))
        {
            score -= 1.0;
            issues.push(format!("merged entry: '{}'", block.heading));
            recommendations.push(format!("split '{}' into separate concepts", block.heading));
        }
        if !seen_headings.insert(block.heading.to_lowercase()) {
            score -= 1.0;
            issues.push(format!("duplicate heading: '{}'", block.heading));
        }
    }

    for topic in topics {
        if topic.concepts.len() > 8 {
            score -= 0.5;
            recommendations.push(format!("topic '{}' is overcrowded", topic.title));
        }
    }

    round1(score.clamp(0.0, 10.0))
}

/// Structure: rewards topical organization, list-style layout, and
/// consistent iconography.
fn score_structure(topics: &[TopicSection], recommendations: &mut Vec<String>) -> f32 {
    let mut score: f32 = 6.0;

    if topics.len() >= defaults::CLUSTER_MIN_TOPICS {
        score += 2.0;
    } else {
        recommendations.push("group concepts into more than one topic".to_string());
    }

    let list_lines = blocks(topics)
        .flat_map(|b| b.lines.iter())
        .filter(|l| is_list_style(l))
        .count();
    if list_lines >= 3 {
        score += 1.0;
    }

    let icons_consistent = topics
        .iter()
        .all(|t| t.concepts.iter().all(|b| b.icon == t.icon));
    if icons_consistent {
        score += 1.0;
    }

    round1(score.clamp(0.0, 10.0))
}

fn blocks(topics: &[TopicSection]) -> impl Iterator<Item = &FormattedBlock> {
    topics.iter().flat_map(|t| t.concepts.iter())
}

fn primary_line(block: &FormattedBlock) -> &str {
    block.lines.first().map(String::as_str).unwrap_or("")
}

fn is_list_style(line: &str) -> bool {
    line.starts_with("- ")
        || line.starts_with("**")
        || line
            .split_once(". ")
            .is_some_and(|(n, _)| n.chars().all(|c| c.is_ascii_digit()) && !n.is_empty())
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn round1(x: f32) -> f32 {
    (x * 10.0).round() / 10.0
}
