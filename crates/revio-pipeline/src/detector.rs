//! Concept detection: parses cleaned text into typed, atomic concepts.
//!
//! An ordered set of pure pattern matchers runs over each candidate text
//! unit, first-match-wins, with a `Simple` fallback for unmatched but
//! importance-worthy spans:
//!
//! 1. Merged-term splitter: "Data and Information: ..." becomes two
//!    concepts instead of one merged entry.
//! 2. Comparison: "X vs Y", "X versus Y", "difference between X and Y".
//! 3. Type-list: "Types of X: A, B, C" (umbrella concept plus one concept
//!    per subtype).
//! 4. Process: "Process of X: step → step → step".
//! 5. Definition: "X is/means/refers to Y" and "X: Y".
//! 6. Fallback: importance-worthy spans become `Simple` concepts.
//!
//! Detection is deterministic given identical input: importance is a pure
//! function of sentence position, definitional cues, and relative length.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use revio_core::{
    defaults, ComparisonSide, ComparisonSides, Concept, ConceptType, SourceSpan,
};

use crate::cleaner::{is_stopword, split_sentences, tokenize};

static COMPARISON_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.{1,60}?)\s+(?:vs\.?|versus)\s+(.{1,60})$").expect("valid regex"));

static DIFFERENCE_BETWEEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:the\s+)?difference\s+between\s+(.{1,60}?)\s+and\s+(.{1,60}?)(?:\s+is\s+(?:that\s+)?(.+))?$")
        .expect("valid regex")
});

static TYPE_LIST_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:the\s+)?(?:types|kinds|forms|categories|classes)\s+of\s+(.{1,60})$")
        .expect("valid regex")
});

static PROCESS_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:the\s+)?(?:process|stages|steps|phases|cycle)\s+of\s+(.{1,60})$")
        .expect("valid regex")
});

static DEFINITION_SENTENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<term>[A-Z][A-Za-z0-9'()\- ]{0,60}?)\s+(?:is defined as|refers to|is|are|means|describes)\s+(?P<def>.{3,})$",
    )
    .expect("valid regex")
});

static EXAMPLE_CUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:e\.g\.|for example|such as|for instance)[,:]?\s*(.+)").expect("valid regex"));

/// Detect typed concepts in cleaned text.
///
/// No two returned concepts share a case-insensitively identical term; the
/// first occurrence wins.
pub fn detect_concepts(clean_text: &str) -> Vec<Concept> {
    let units = candidate_units(clean_text);
    let total = units.len().max(1);

    let mut concepts: Vec<Concept> = Vec::new();
    let mut seen_terms: HashSet<String> = HashSet::new();

    for (idx, unit) in units.iter().enumerate() {
        let importance = importance_score(&unit.text, idx, total);

        let drafts = match_unit(&unit.text, importance)
            .unwrap_or_else(|| match_fallback(&unit.text, importance));

        for mut concept in drafts {
            let key = concept.term.to_lowercase();
            if key.is_empty() || seen_terms.contains(&key) {
                continue;
            }
            seen_terms.insert(key);
            concept.source_span = Some(unit.span);
            concepts.push(concept);
        }
    }

    link_subtype_relations(&mut concepts);
    concepts
}

struct Unit {
    text: String,
    span: SourceSpan,
}

/// Split cleaned text into candidate units: one per line for "Term: body"
/// lines, one per sentence otherwise.
fn candidate_units(text: &str) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut offset = 0usize;

    for line in text.lines() {
        let start = offset;
        offset += line.len() + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let span = SourceSpan {
            start,
            end: start + line.len(),
        };

        if trimmed.contains(':') {
            units.push(Unit {
                text: trimmed.to_string(),
                span,
            });
        } else {
            for sentence in split_sentences(trimmed) {
                units.push(Unit {
                    text: sentence,
                    span,
                });
            }
        }
    }
    units
}

/// Run the ordered matchers over one unit. `None` means no pattern matched.
fn match_unit(unit: &str, importance: f32) -> Option<Vec<Concept>> {
    // "Term: body" shape feeds the structured matchers.
    if let Some((term_part, body)) = split_colon(unit) {
        // Merged-term splitter runs before the other matchers.
        if let Some(split) = split_merged_term(&term_part, &body, importance) {
            return Some(split);
        }
        if let Some(c) = match_comparison(&term_part, Some(&body), importance) {
            return Some(vec![c]);
        }
        if let Some(cs) = match_type_list(&term_part, &body, importance) {
            return Some(cs);
        }
        if let Some(c) = match_process(&term_part, &body, importance) {
            return Some(vec![c]);
        }
        // Plain "Term: definition".
        if word_count(&term_part) <= 6 && !body.is_empty() {
            return Some(vec![new_concept(
                term_part,
                ConceptType::Definition,
                &body,
                importance,
            )]);
        }
        return None;
    }

    if let Some(caps) = DIFFERENCE_BETWEEN.captures(unit) {
        let left = caps[1].trim().to_string();
        let right = caps[2].trim().to_string();
        let body = caps.get(3).map(|m| m.as_str().trim().to_string());
        return Some(vec![build_comparison(left, right, body, importance)]);
    }

    if COMPARISON_TERM.is_match(unit) && word_count(unit) <= 10 {
        return match_comparison(unit, None, importance).map(|c| vec![c]);
    }

    if let Some(caps) = DEFINITION_SENTENCE.captures(unit) {
        let term = caps["term"].trim().to_string();
        let def = caps["def"].trim().to_string();
        if word_count(&term) <= 6 {
            return Some(vec![new_concept(
                term,
                ConceptType::Definition,
                &def,
                importance,
            )]);
        }
    }

    None
}

/// Fallback: any unmatched but importance-worthy span becomes a `Simple`
/// concept with its best-effort sentence as definition.
fn match_fallback(unit: &str, importance: f32) -> Vec<Concept> {
    if importance < 0.35 || word_count(unit) < 4 {
        return Vec::new();
    }
    let term = fallback_term(unit);
    if term.is_empty() {
        return Vec::new();
    }
    vec![new_concept(term, ConceptType::Simple, unit, importance)]
}

/// Split "Term: body", rejecting bodies that are empty or terms that are
/// whole sentences.
fn split_colon(unit: &str) -> Option<(String, String)> {
    let (term, body) = unit.split_once(':')?;
    let term = term.trim();
    let body = body.trim();
    if term.is_empty() || body.is_empty() || word_count(term) > 8 {
        return None;
    }
    Some((term.to_string(), body.to_string()))
}

/// Merged-term splitter: a candidate term joining two noun phrases with a
/// top-level coordinating conjunction becomes two concepts rather than one
/// merged entry ("Data and Information" → "Data", "Information").
fn split_merged_term(term: &str, body: &str, importance: f32) -> Option<Vec<Concept>> {
    // "vs" terms are comparisons, not merged entries.
    if COMPARISON_TERM.is_match(term) || TYPE_LIST_TERM.is_match(term) {
        return None;
    }

    let (left, right) = split_top_level_conjunction(term)?;

    // Each side must independently look like a standalone noun phrase.
    if word_count(&left) > 4 || word_count(&right) > 4 {
        return None;
    }

    // Parallel descriptions ("raw facts vs processed facts") are assigned
    // side-by-side; otherwise both concepts share the full body.
    let (left_def, right_def) = match split_parallel_body(body) {
        Some((a, b)) => (a, b),
        None => (body.to_string(), body.to_string()),
    };

    Some(vec![
        new_concept(left, ConceptType::Definition, &left_def, importance),
        new_concept(right, ConceptType::Definition, &right_def, importance),
    ])
}

/// Split a term on a top-level "and"/"&" joining two capitalized phrases.
fn split_top_level_conjunction(term: &str) -> Option<(String, String)> {
    for sep in [" and ", " & "] {
        if let Some((left, right)) = term.split_once(sep) {
            let left = left.trim();
            let right = right.trim();
            if !left.is_empty()
                && !right.is_empty()
                && starts_uppercase(left)
                && starts_uppercase(right)
            {
                return Some((left.to_string(), right.to_string()));
            }
        }
    }
    None
}

/// Split a body into two parallel descriptions ("A vs B", "A; B").
fn split_parallel_body(body: &str) -> Option<(String, String)> {
    for sep in [" vs. ", " vs ", " versus ", "; "] {
        if let Some((a, b)) = body.split_once(sep) {
            let a = a.trim();
            let b = b.trim();
            if !a.is_empty() && !b.is_empty() {
                return Some((a.to_string(), b.to_string()));
            }
        }
    }
    None
}

fn match_comparison(term_part: &str, body: Option<&str>, importance: f32) -> Option<Concept> {
    let caps = COMPARISON_TERM.captures(term_part)?;
    let left_name = caps[1].trim().to_string();
    let right_name = caps[2].trim().to_string();

    let body = body.map(str::to_string);
    Some(build_comparison(left_name, right_name, body, importance))
}

fn build_comparison(
    left_name: String,
    right_name: String,
    body: Option<String>,
    importance: f32,
) -> Concept {
    let (left_desc, right_desc) = match body.as_deref().and_then(split_parallel_body) {
        Some((a, b)) => (a, b),
        None => {
            let shared = body.unwrap_or_default();
            (shared.clone(), shared)
        }
    };

    let term = format!("{} vs {}", left_name, right_name);
    let summary = if left_desc.is_empty() {
        format!("How {} differs from {}", left_name, right_name)
    } else {
        format!(
            "{}: {}; {}: {}",
            left_name, left_desc, right_name, right_desc
        )
    };

    let mut concept = new_concept(term, ConceptType::Comparison, &summary, importance);
    concept.comparison = Some(ComparisonSides {
        left: ComparisonSide {
            name: left_name,
            description: left_desc,
        },
        right: ComparisonSide {
            name: right_name,
            description: right_desc,
        },
    });
    concept
}

fn match_type_list(term_part: &str, body: &str, importance: f32) -> Option<Vec<Concept>> {
    let caps = TYPE_LIST_TERM.captures(term_part)?;
    let umbrella = caps[1].trim().to_string();

    let subtypes: Vec<String> = body
        .split(|c| c == ',' || c == ';')
        .flat_map(|part| part.split(" and "))
        .map(|s| s.trim().trim_end_matches('.').to_string())
        .filter(|s| !s.is_empty())
        .collect();

    // A type-list needs at least two enumerated subtypes.
    if subtypes.len() < 2 {
        return None;
    }

    let mut out = Vec::with_capacity(subtypes.len() + 1);
    let list_def = format!("Types of {}: {}", umbrella, subtypes.join(", "));
    let mut umbrella_concept =
        new_concept(umbrella.clone(), ConceptType::TypeList, &list_def, importance);
    umbrella_concept.subtypes = subtypes.clone();
    out.push(umbrella_concept);

    for subtype in &subtypes {
        let def = format!("A type of {}.", umbrella);
        out.push(new_concept(
            subtype.clone(),
            ConceptType::Simple,
            &def,
            (importance - 0.1).max(0.0),
        ));
    }
    Some(out)
}

fn match_process(term_part: &str, body: &str, importance: f32) -> Option<Concept> {
    let caps = PROCESS_TERM.captures(term_part)?;
    let name = caps[1].trim().to_string();
    Some(new_concept(name, ConceptType::Process, body, importance))
}

/// Link subtype concepts to their umbrella type-list concept (both ways).
fn link_subtype_relations(concepts: &mut [Concept]) {
    let umbrellas: Vec<(usize, Uuid, Vec<String>)> = concepts
        .iter()
        .enumerate()
        .filter(|(_, c)| c.concept_type == ConceptType::TypeList)
        .map(|(i, c)| {
            (
                i,
                c.id,
                c.subtypes.iter().map(|s| s.to_lowercase()).collect(),
            )
        })
        .collect();

    for (umbrella_idx, umbrella_id, subtype_names) in umbrellas {
        let mut child_ids = Vec::new();
        for concept in concepts.iter_mut() {
            if subtype_names.contains(&concept.term.to_lowercase()) {
                concept.related_ids.push(umbrella_id);
                child_ids.push(concept.id);
            }
        }
        concepts[umbrella_idx].related_ids.extend(child_ids);
    }
}

/// Heuristic importance: earlier units score higher, definitional cues and
/// longer spans add a bounded bonus. Deterministic given identical input.
fn importance_score(unit: &str, idx: usize, total: usize) -> f32 {
    let position = 1.0 - (idx as f32 / total as f32) * 0.5;
    let cue = if unit.contains(':')
        || DEFINITION_SENTENCE.is_match(unit)
        || COMPARISON_TERM.is_match(unit)
    {
        0.15
    } else {
        0.0
    };
    let length = (word_count(unit) as f32 / 100.0).min(0.15);
    (position * 0.7 + cue + length).clamp(0.0, 1.0)
}

fn new_concept(term: String, concept_type: ConceptType, definition: &str, importance: f32) -> Concept {
    let (definition, examples) = extract_examples(definition);

    Concept {
        id: Uuid::new_v4(),
        term,
        concept_type,
        short_definition: truncate_words(&definition, defaults::SHORT_DEFINITION_MAX_WORDS),
        full_definition: truncate_words(&definition, defaults::FULL_DEFINITION_MAX_WORDS),
        examples,
        subtypes: Vec::new(),
        comparison: None,
        related_ids: Vec::new(),
        importance,
        source_span: None,
    }
}

/// Pull "e.g. ..." / "for example ..." fragments out of a definition.
fn extract_examples(definition: &str) -> (String, Vec<String>) {
    if let Some(caps) = EXAMPLE_CUE.captures(definition) {
        let example_text = caps[1].trim().trim_end_matches('.').to_string();
        let cleaned = EXAMPLE_CUE.replace(definition, "").trim().trim_end_matches(&[',', '('][..]).trim().to_string();
        let examples: Vec<String> = example_text
            .split(',')
            .map(|e| e.trim().trim_end_matches(')').to_string())
            .filter(|e| !e.is_empty())
            .take(defaults::MAX_EXAMPLES)
            .collect();
        let base = if cleaned.is_empty() {
            definition.to_string()
        } else {
            cleaned
        };
        (base, examples)
    } else {
        (definition.to_string(), Vec::new())
    }
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        text.trim().to_string()
    } else {
        words[..max_words].join(" ")
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn starts_uppercase(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_uppercase())
}

/// Best-effort term for a fallback concept: the first few content words.
fn fallback_term(unit: &str) -> String {
    let words: Vec<String> = tokenize(unit)
        .into_iter()
        .filter(|w| !is_stopword(w))
        .take(3)
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => w,
            }
        })
        .collect();
    words.join(" ")
}
