//! Text cleaning: normalizes noisy extracted input into clean prose.
//!
//! Input text typically comes from OCR or slide extraction and carries stray
//! bullet glyphs, ellipses, hyphenation broken across line breaks, and
//! near-duplicate sentences from repeated headers/footers. Cleaning is a
//! pure function; it removes noise but never summarizes or shortens
//! meaning-bearing content.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use revio_core::{defaults, Error, Result};

/// Hyphenation broken across a line break: "alloca-\ntion" → "allocation".
static BROKEN_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z])-\s*\n\s*([a-z])").expect("valid regex"));

/// Stray bullet glyphs and list markers at line starts.
static LEADING_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[•◦▪●○‣*·–—-]+\s*").expect("valid regex"));

/// Ellipsis runs (ASCII or Unicode), common scan artifacts.
static ELLIPSIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\.\s*){3,}|…+").expect("valid regex"));

/// Runs of spaces and tabs.
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));

/// Replacement characters and other non-text junk OCR emits.
static JUNK_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{FFFD}\u{00AD}|]+").expect("valid regex"));

/// Normalize noisy input into clean prose.
///
/// Returns `Error::ExtractionFailure` when nothing usable remains after
/// cleaning; the orchestrator treats that as a permanent extraction failure
/// rather than retrying.
pub fn clean(raw: &str) -> Result<String> {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");

    let text = BROKEN_HYPHEN.replace_all(&text, "$1$2");
    let text = JUNK_CHARS.replace_all(&text, " ");
    let text = LEADING_BULLET.replace_all(&text, "");
    let text = ELLIPSIS.replace_all(&text, ". ");
    let text = SPACE_RUN.replace_all(&text, " ");

    // Re-flow: keep line structure (one candidate unit per line matters to
    // the detector) but drop blank-line runs.
    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }

    // Remove near-duplicate sentences (repeated headers, OCR echo).
    let deduped = dedup_sentences(&lines.join("\n"));

    let cleaned = deduped.trim().to_string();
    if cleaned.is_empty() {
        return Err(Error::ExtractionFailure(
            "no usable text after cleaning".to_string(),
        ));
    }
    Ok(cleaned)
}

/// Greedily keep the highest-importance sentences until the character budget
/// is met. Sentences are scored by term frequency and position; selected
/// sentences are emitted in their original order, and a sentence is never
/// cut mid-way unless even the single best sentence exceeds the budget.
pub fn compress_definition(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.len() <= max_chars {
        return text.to_string();
    }

    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return truncate_at_word(text, max_chars);
    }

    let freqs = word_frequencies(text);
    let n = sentences.len();

    // (score, original index)
    let mut ranked: Vec<(f32, usize)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let tf: f32 = tokenize(s).iter().filter_map(|w| freqs.get(w.as_str())).sum::<u32>() as f32
                / (s.len().max(1) as f32);
            let position = 1.0 - (i as f32 / n as f32) * 0.5;
            (tf * position, i)
        })
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<usize> = Vec::new();
    let mut used = 0usize;
    for (_, idx) in &ranked {
        let len = sentences[*idx].len() + 1;
        if used + len <= max_chars {
            kept.push(*idx);
            used += len;
        }
    }

    if kept.is_empty() {
        // Even the best sentence is over budget; truncate it at a word
        // boundary as a last resort.
        return truncate_at_word(&sentences[ranked[0].1], max_chars);
    }

    kept.sort_unstable();
    kept.iter()
        .map(|i| sentences[*i].as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split text into sentences on terminal punctuation and line breaks.
///
/// Shared by the cleaner, the detector, and the quality scorers so all
/// stages agree on sentence boundaries.
pub fn split_sentences(text: &str) -> Vec<String> {
    static BOUNDARY: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?m)[.!?]\s+|[.!?]$|\n").expect("valid regex"));

    let mut out = Vec::new();
    let mut last = 0;
    for m in BOUNDARY.find_iter(text) {
        let end = m.end();
        let piece = text[last..end].trim().trim_end_matches('\n');
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        last = end;
    }
    let tail = text[last..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Lowercased word tokens, punctuation stripped.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn word_frequencies(text: &str) -> std::collections::HashMap<String, u32> {
    let mut freqs = std::collections::HashMap::new();
    for word in tokenize(text) {
        if !is_stopword(&word) {
            *freqs.entry(word).or_insert(0) += 1;
        }
    }
    freqs
}

pub(crate) fn is_stopword(word: &str) -> bool {
    matches!(
        word,
        "a" | "an" | "the" | "of" | "in" | "on" | "at" | "to" | "for" | "and" | "or" | "is"
            | "are" | "was" | "were" | "be" | "been" | "it" | "its" | "this" | "that" | "with"
            | "as" | "by" | "from" | "which" | "can" | "may" | "will" | "has" | "have" | "had"
            | "not" | "but" | "into" | "than" | "then" | "also" | "such" | "these" | "those"
    )
}

fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut cut = 0;
    for (idx, _) in text.char_indices() {
        if idx > max_chars {
            break;
        }
        cut = idx;
    }
    match text[..cut].rfind(' ') {
        Some(space) if space > 0 => text[..space].trim_end().to_string(),
        _ => text[..cut].to_string(),
    }
}

/// Remove sentences that are near-duplicates of an earlier sentence,
/// measured by token-overlap (Jaccard) on lowercase word sets.
fn dedup_sentences(text: &str) -> String {
    let mut seen: Vec<HashSet<String>> = Vec::new();
    let mut kept: Vec<String> = Vec::new();

    for line in text.lines() {
        for sentence in split_sentences(line) {
            let tokens: HashSet<String> = tokenize(&sentence).into_iter().collect();
            if tokens.is_empty() {
                continue;
            }
            let duplicate = seen.iter().any(|prev| {
                let inter = prev.intersection(&tokens).count() as f32;
                let union = prev.union(&tokens).count() as f32;
                union > 0.0 && inter / union >= defaults::DUPLICATE_OVERLAP_THRESHOLD
            });
            if !duplicate {
                seen.push(tokens);
                kept.push(sentence);
            }
        }
        // Preserve the line as a unit boundary for the detector.
        if let Some(last) = kept.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }
    }

    kept.iter()
        .map(|s| s.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_bullets_and_ellipses() {
        let raw = "• Array is a contiguous block of memory…\n▪ Stack is a LIFO structure";
        let out = clean(raw).unwrap();
        assert!(!out.contains('•'));
        assert!(!out.contains('▪'));
        assert!(!out.contains('…'));
        assert!(out.contains("Array is a contiguous block of memory"));
        assert!(out.contains("Stack is a LIFO structure"));
    }

    #[test]
    fn clean_joins_broken_hyphenation() {
        let raw = "Linked lists use dynamic alloca-\ntion for their nodes.";
        let out = clean(raw).unwrap();
        assert!(out.contains("allocation"));
        assert!(!out.contains("alloca-"));
    }

    #[test]
    fn clean_collapses_whitespace() {
        let raw = "A  stack    is a LIFO\t\tstructure.";
        let out = clean(raw).unwrap();
        assert!(out.contains("A stack is a LIFO structure."));
    }

    #[test]
    fn clean_removes_near_duplicate_sentences() {
        let raw = "Photosynthesis converts light into chemical energy.\n\
                   Photosynthesis converts light into chemical energy.\n\
                   Respiration releases that energy.";
        let out = clean(raw).unwrap();
        let count = out.matches("Photosynthesis converts light").count();
        assert_eq!(count, 1);
        assert!(out.contains("Respiration releases that energy"));
    }

    #[test]
    fn clean_empty_input_is_extraction_failure() {
        let err = clean("  • … ▪  \n\n").unwrap_err();
        assert!(matches!(err, Error::ExtractionFailure(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn clean_does_not_shorten_meaningful_content() {
        let raw = "Mitosis is the process of cell division producing two identical daughter cells.";
        let out = clean(raw).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn compress_short_text_unchanged() {
        let text = "A short definition.";
        assert_eq!(compress_definition(text, 300), text);
    }

    #[test]
    fn compress_respects_budget_and_sentence_boundaries() {
        let text = "Osmosis is the movement of water across a membrane. \
                    It moves from low to high solute concentration. \
                    The process requires no energy input. \
                    Many textbooks illustrate it with a U-shaped tube experiment. \
                    Plant cells rely on osmosis for turgor pressure.";
        let out = compress_definition(text, 120);
        assert!(out.len() <= 120);
        // Output must end at a sentence boundary, not mid-word.
        assert!(out.ends_with('.'), "got: {out}");
    }

    #[test]
    fn compress_is_deterministic() {
        let text = "Entropy measures disorder. It always increases in closed systems. \
                    Heat flows from hot to cold bodies as a consequence.";
        assert_eq!(
            compress_definition(text, 80),
            compress_definition(text, 80)
        );
    }

    #[test]
    fn split_sentences_basic() {
        let s = split_sentences("One sentence. Another one! A third?");
        assert_eq!(s.len(), 3);
        assert_eq!(s[0], "One sentence.");
    }
}
