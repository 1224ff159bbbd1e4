//! Structured formatting: renders typed concepts into presentation blocks
//! and assembles topic sections into the final reviewer document.
//!
//! Formatting is pure: a block is a deterministic function of its concept.
//! Each concept type has its own template; the category keyword table drives
//! section iconography.

use chrono::Utc;
use uuid::Uuid;

use revio_core::{
    defaults, Concept, ConceptType, FormattedBlock, GenerationMetadata, QualityMetrics,
    ReviewerDocument, Topic, TopicSection,
};

/// Keyword table mapping topic text to a display category. First matching
/// category wins; unmatched text falls back to `general`.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "life-sciences",
        &[
            "cell", "biology", "photosynthesis", "enzyme", "dna", "gene", "organism", "mitosis",
            "meiosis", "protein", "membrane", "osmosis", "respiration", "anatomy",
        ],
    ),
    (
        "computing",
        &[
            "algorithm", "array", "stack", "queue", "memory", "software", "network", "database",
            "data structure", "linked list", "code", "compiler", "hash",
        ],
    ),
    (
        "law",
        &[
            "contract", "statute", "tort", "legal", "court", "liability", "clause", "plaintiff",
            "jurisdiction", "negligence",
        ],
    ),
    (
        "business",
        &[
            "market", "revenue", "asset", "liabilit", "inflation", "economic", "finance",
            "supply", "demand", "cost", "profit", "investment",
        ],
    ),
];

/// Display category for a topic, derived from its title and member terms.
pub fn category_for(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| lower.contains(k)) {
            return category;
        }
    }
    "general"
}

/// Render one concept into its presentation block using the template for its
/// type. Pure; identical concepts always format identically.
pub fn format_concept(concept: &Concept, icon: &str) -> FormattedBlock {
    let (heading, lines) = match concept.concept_type {
        ConceptType::Comparison => format_comparison(concept),
        ConceptType::TypeList => format_type_list(concept),
        ConceptType::Process => format_process(concept),
        ConceptType::Example => format_example(concept),
        ConceptType::Definition | ConceptType::Simple => format_definition(concept),
    };

    FormattedBlock {
        concept_id: concept.id,
        concept_type: concept.concept_type,
        heading,
        lines,
        icon: icon.to_string(),
    }
}

fn format_definition(concept: &Concept) -> (String, Vec<String>) {
    let mut lines = vec![concept.short_definition.clone()];
    if concept.full_definition != concept.short_definition {
        lines.push(concept.full_definition.clone());
    }
    push_examples(concept, &mut lines);
    (concept.term.clone(), lines)
}

/// Comparison template. The side names are emphasized exactly once each, on
/// their own side line; the heading and the key-difference line use the
/// plain names.
fn format_comparison(concept: &Concept) -> (String, Vec<String>) {
    let Some(sides) = &concept.comparison else {
        // A comparison without sides degrades to the definition template.
        return format_definition(concept);
    };

    let heading = format!("{} vs {}", sides.left.name, sides.right.name);
    let mut lines = vec![
        format!("**{}**: {}", sides.left.name, sides.left.description),
        format!("**{}**: {}", sides.right.name, sides.right.description),
    ];
    if sides.left.description != sides.right.description
        && !sides.left.description.is_empty()
        && !sides.right.description.is_empty()
    {
        lines.push(format!(
            "Key difference: {} is characterized by {}, while {} is characterized by {}",
            sides.left.name,
            sides.left.description,
            sides.right.name,
            sides.right.description
        ));
    }
    push_examples(concept, &mut lines);
    (heading, lines)
}

fn format_type_list(concept: &Concept) -> (String, Vec<String>) {
    let mut lines = vec![concept.short_definition.clone()];
    for subtype in &concept.subtypes {
        lines.push(format!("- {}", subtype));
    }
    push_examples(concept, &mut lines);
    (concept.term.clone(), lines)
}

/// Process template: the definition body is split into ordered step lines on
/// arrows or list separators.
fn format_process(concept: &Concept) -> (String, Vec<String>) {
    let body = &concept.full_definition;
    let steps: Vec<&str> = if body.contains('→') {
        body.split('→').map(str::trim).filter(|s| !s.is_empty()).collect()
    } else if body.contains(',') {
        body.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
    } else {
        Vec::new()
    };

    let mut lines = if steps.len() >= 2 {
        steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect()
    } else {
        vec![concept.short_definition.clone()]
    };
    push_examples(concept, &mut lines);
    (concept.term.clone(), lines)
}

fn format_example(concept: &Concept) -> (String, Vec<String>) {
    let mut lines = Vec::new();
    if !concept.short_definition.is_empty() {
        lines.push(concept.short_definition.clone());
    }
    for example in &concept.examples {
        lines.push(format!("- {}", example));
    }
    if lines.is_empty() {
        lines.push(concept.full_definition.clone());
    }
    (concept.term.clone(), lines)
}

fn push_examples(concept: &Concept, lines: &mut Vec<String>) {
    if !concept.examples.is_empty() {
        lines.push(format!("e.g. {}", concept.examples.join(", ")));
    }
}

/// Assembles topics and concepts into an immutable [`ReviewerDocument`].
///
/// The builder resolves topic categories, formats every member concept, and
/// produces the plain-text rendering. Quality metrics are attached after
/// validation; the builder seeds them empty.
pub struct ReviewerDocumentBuilder {
    material_id: Uuid,
    topics: Vec<Topic>,
    concepts: Vec<Concept>,
    models_used: Vec<String>,
}

impl ReviewerDocumentBuilder {
    pub fn new(material_id: Uuid) -> Self {
        Self {
            material_id,
            topics: Vec::new(),
            concepts: Vec::new(),
            models_used: Vec::new(),
        }
    }

    pub fn topics(mut self, topics: Vec<Topic>) -> Self {
        self.topics = topics;
        self
    }

    pub fn concepts(mut self, concepts: Vec<Concept>) -> Self {
        self.concepts = concepts;
        self
    }

    /// Record backend model identifiers used during this run.
    pub fn models_used(mut self, models: Vec<String>) -> Self {
        self.models_used = models;
        self
    }

    pub fn build(self) -> ReviewerDocument {
        let mut sections = Vec::with_capacity(self.topics.len());

        for topic in &self.topics {
            let member_terms: Vec<&str> = topic
                .concept_ids
                .iter()
                .filter_map(|id| self.concepts.iter().find(|c| c.id == *id))
                .map(|c| c.term.as_str())
                .collect();
            let category_text = format!("{} {}", topic.title, member_terms.join(" "));
            let category = if topic.category.is_empty() {
                category_for(&category_text).to_string()
            } else {
                topic.category.clone()
            };

            let blocks: Vec<FormattedBlock> = topic
                .concept_ids
                .iter()
                .filter_map(|id| self.concepts.iter().find(|c| c.id == *id))
                .map(|c| format_concept(c, &category))
                .collect();

            sections.push(TopicSection {
                title: topic.title.clone(),
                icon: category,
                concepts: blocks,
            });
        }

        let rendered_text = render_text(&sections);

        ReviewerDocument {
            material_id: self.material_id,
            topics: sections,
            rendered_text,
            quality: QualityMetrics::default(),
            metadata: GenerationMetadata {
                pipeline_version: defaults::PIPELINE_VERSION.to_string(),
                models_used: self.models_used,
                generated_at: Utc::now(),
            },
        }
    }
}

/// Plain-text rendering of the assembled sections.
fn render_text(sections: &[TopicSection]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&format!("# {}\n\n", section.title));
        for block in &section.concepts {
            out.push_str(&block.heading);
            out.push('\n');
            for line in &block.lines {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use revio_core::{ComparisonSide, ComparisonSides};

    fn concept(term: &str, concept_type: ConceptType, def: &str) -> Concept {
        Concept {
            id: Uuid::new_v4(),
            term: term.to_string(),
            concept_type,
            short_definition: def.to_string(),
            full_definition: def.to_string(),
            examples: Vec::new(),
            subtypes: Vec::new(),
            comparison: None,
            related_ids: Vec::new(),
            importance: 0.5,
            source_span: None,
        }
    }

    #[test]
    fn category_keyword_table() {
        assert_eq!(category_for("Cell Biology"), "life-sciences");
        assert_eq!(category_for("Linked List operations"), "computing");
        assert_eq!(category_for("Contract formation"), "law");
        assert_eq!(category_for("Supply and demand"), "business");
        assert_eq!(category_for("Renaissance painting"), "general");
    }

    #[test]
    fn definition_block() {
        let c = concept("Stack", ConceptType::Definition, "a LIFO data structure");
        let block = format_concept(&c, "computing");
        assert_eq!(block.heading, "Stack");
        assert_eq!(block.lines, vec!["a LIFO data structure"]);
        assert_eq!(block.icon, "computing");
    }

    #[test]
    fn comparison_block_emphasizes_each_side_exactly_once() {
        let mut c = concept("Array vs Linked List", ConceptType::Comparison, "");
        c.comparison = Some(ComparisonSides {
            left: ComparisonSide {
                name: "Array".to_string(),
                description: "contiguous memory".to_string(),
            },
            right: ComparisonSide {
                name: "Linked List".to_string(),
                description: "dynamic allocation".to_string(),
            },
        });
        let block = format_concept(&c, "computing");
        assert_eq!(block.heading, "Array vs Linked List");

        let all = block.lines.join("\n");
        assert_eq!(all.matches("**Array**").count(), 1);
        assert_eq!(all.matches("**Linked List**").count(), 1);
        assert!(all.contains("Key difference:"));
    }

    #[test]
    fn comparison_without_identical_sides_skips_key_difference() {
        let mut c = concept("A vs B", ConceptType::Comparison, "");
        c.comparison = Some(ComparisonSides {
            left: ComparisonSide {
                name: "A".to_string(),
                description: "shared".to_string(),
            },
            right: ComparisonSide {
                name: "B".to_string(),
                description: "shared".to_string(),
            },
        });
        let block = format_concept(&c, "general");
        assert!(!block.lines.join("\n").contains("Key difference:"));
    }

    #[test]
    fn type_list_block_enumerates_subtypes() {
        let mut c = concept("contracts", ConceptType::TypeList, "Types of contracts");
        c.subtypes = vec!["express".to_string(), "implied".to_string()];
        let block = format_concept(&c, "law");
        assert_eq!(block.lines[1], "- express");
        assert_eq!(block.lines[2], "- implied");
    }

    #[test]
    fn process_block_numbers_steps() {
        let c = concept(
            "photosynthesis",
            ConceptType::Process,
            "light absorption → electron transport → carbon fixation",
        );
        let block = format_concept(&c, "life-sciences");
        assert_eq!(
            block.lines,
            vec![
                "1. light absorption",
                "2. electron transport",
                "3. carbon fixation"
            ]
        );
    }

    #[test]
    fn examples_appear_in_block() {
        let mut c = concept("Polymer", ConceptType::Definition, "a large molecule");
        c.examples = vec!["rubber".to_string(), "nylon".to_string()];
        let block = format_concept(&c, "general");
        assert!(block.lines.last().unwrap().contains("rubber, nylon"));
    }

    #[test]
    fn formatting_is_deterministic() {
        let c = concept("Osmosis", ConceptType::Definition, "movement of water");
        assert_eq!(format_concept(&c, "life-sciences"), format_concept(&c, "life-sciences"));
    }

    #[test]
    fn builder_assembles_sections_and_rendered_text() {
        let c1 = concept("Array", ConceptType::Definition, "contiguous block of memory");
        let c2 = concept("Stack", ConceptType::Definition, "a LIFO data structure");
        let topic = Topic {
            id: Uuid::new_v4(),
            title: "Data Structures".to_string(),
            category: String::new(),
            concept_ids: vec![c1.id, c2.id],
        };

        let doc = ReviewerDocumentBuilder::new(Uuid::nil())
            .topics(vec![topic])
            .concepts(vec![c1, c2])
            .build();

        assert_eq!(doc.topics.len(), 1);
        let section = &doc.topics[0];
        assert_eq!(section.icon, "computing");
        assert_eq!(section.concepts.len(), 2);
        // Section icon propagates to every block.
        assert!(section.concepts.iter().all(|b| b.icon == "computing"));
        assert!(doc.rendered_text.starts_with("# Data Structures"));
        assert!(doc.rendered_text.contains("Stack"));
        assert_eq!(doc.metadata.pipeline_version, defaults::PIPELINE_VERSION);
    }

    #[test]
    fn builder_preserves_concept_order_within_topic() {
        let c1 = concept("First", ConceptType::Simple, "one");
        let c2 = concept("Second", ConceptType::Simple, "two");
        let topic = Topic {
            id: Uuid::new_v4(),
            title: "Order".to_string(),
            category: "general".to_string(),
            concept_ids: vec![c2.id, c1.id],
        };
        let doc = ReviewerDocumentBuilder::new(Uuid::nil())
            .topics(vec![topic])
            .concepts(vec![c1, c2])
            .build();
        assert_eq!(doc.topics[0].concepts[0].heading, "Second");
        assert_eq!(doc.topics[0].concepts[1].heading, "First");
    }
}
