//! Heuristic concept graph over embedded content chunks.
//!
//! Concepts come from a fixed mathematics taxonomy matched against normalised
//! chunk text; typed edges come from relationship phrases found between two
//! concept mentions, from the chunk's own metadata and, when syllabus data is
//! supplied, from the syllabus subtopics that mention a concept.

use crate::error::IngestError;
use crate::models::ContentChunk;
use crate::syllabus::SyllabusData;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

type Taxonomy = &'static [(&'static str, &'static [(&'static str, &'static [&'static str])])];

const MATH_CONCEPTS: Taxonomy = &[
    (
        "functions",
        &[
            (
                "basic_concepts",
                &[
                    "function", "domain", "range", "one-to-one function", "inverse function",
                    "composite function", "mapping",
                ],
            ),
            (
                "trigonometric",
                &[
                    "sine", "cosine", "tangent", "sin", "cos", "tan", "arcsin", "arccos", "arctan",
                    "inverse sine", "inverse cosine", "inverse tangent", "trigonometric function",
                    "trig function", "trig", "trigonometry",
                ],
            ),
            ("reciprocal", &["cosecant", "secant", "cotangent", "csc", "sec", "cot"]),
            (
                "characteristics",
                &[
                    "symmetry", "intersections", "turning points", "asymptotes", "periodicity",
                    "amplitude", "frequency",
                ],
            ),
            ("properties", &["injective", "surjective", "bijective", "monotonic", "even", "odd"]),
        ],
    ),
    (
        "graphs",
        &[
            (
                "transformations",
                &[
                    "translation", "scaling", "reflection", "rotation", "dilation", "compression",
                ],
            ),
            (
                "features",
                &[
                    "intercepts", "asymptotes", "stationary points", "inflection points",
                    "critical points", "extrema",
                ],
            ),
            (
                "types",
                &[
                    "linear", "quadratic", "cubic", "exponential", "logarithmic", "trigonometric",
                    "rational", "piecewise",
                ],
            ),
            (
                "analysis",
                &[
                    "continuity", "differentiability", "concavity", "convexity", "monotonicity",
                ],
            ),
        ],
    ),
    (
        "calculus",
        &[
            (
                "limits",
                &[
                    "limit", "continuity", "differentiability", "one-sided limit", "infinite limit",
                    "limit at infinity",
                ],
            ),
            (
                "derivatives",
                &[
                    "derivative", "gradient", "rate of change", "chain rule", "product rule",
                    "quotient rule", "implicit differentiation",
                ],
            ),
            (
                "integration",
                &[
                    "integral", "antiderivative", "definite integral", "indefinite integral",
                    "area under curve", "riemann sum",
                ],
            ),
            (
                "applications",
                &[
                    "optimization", "rate of change", "area", "volume", "velocity", "acceleration",
                    "related rates",
                ],
            ),
        ],
    ),
    (
        "algebra",
        &[
            (
                "equations",
                &[
                    "linear equation", "quadratic equation", "simultaneous equations",
                    "inequalities", "absolute value equation",
                ],
            ),
            (
                "polynomials",
                &[
                    "polynomial", "factorization", "remainder theorem", "factor theorem",
                    "rational root theorem", "synthetic division",
                ],
            ),
            (
                "complex",
                &[
                    "complex number", "imaginary number", "modulus", "argument", "conjugate",
                    "polar form", "de moivre's theorem",
                ],
            ),
            (
                "matrices",
                &[
                    "matrix", "determinant", "inverse", "eigenvalue", "eigenvector",
                    "linear transformation",
                ],
            ),
        ],
    ),
    (
        "vectors",
        &[
            (
                "basic",
                &[
                    "vector", "scalar", "magnitude", "direction", "unit vector", "position vector",
                ],
            ),
            (
                "operations",
                &[
                    "addition", "subtraction", "scalar multiplication", "dot product",
                    "cross product", "projection",
                ],
            ),
            (
                "applications",
                &[
                    "position vector", "displacement", "velocity", "acceleration", "force", "work",
                    "moment",
                ],
            ),
            (
                "geometry",
                &[
                    "line", "plane", "distance", "angle between vectors", "parallel",
                    "perpendicular",
                ],
            ),
        ],
    ),
    (
        "sequences",
        &[
            (
                "types",
                &[
                    "arithmetic sequence", "geometric sequence", "convergence", "divergence",
                    "monotonic", "bounded",
                ],
            ),
            (
                "series",
                &[
                    "arithmetic series", "geometric series", "sum to infinity", "partial sum",
                    "convergence test",
                ],
            ),
            (
                "applications",
                &[
                    "compound interest", "growth", "decay", "population model",
                    "financial mathematics",
                ],
            ),
        ],
    ),
    (
        "angles",
        &[
            (
                "special",
                &[
                    "30°", "45°", "60°", "90°", "180°", "360°", "30 degrees", "45 degrees",
                    "60 degrees", "special angles",
                ],
            ),
            (
                "types",
                &[
                    "acute", "obtuse", "right", "reference angle", "basic angle", "principal angle",
                    "coterminal angles",
                ],
            ),
            ("measurements", &["degrees", "radians", "π", "pi", "arc length", "sector area"]),
            (
                "relationships",
                &[
                    "complementary", "supplementary", "adjacent", "vertical", "corresponding",
                    "alternate",
                ],
            ),
        ],
    ),
];

const RELATIONSHIP_PATTERNS: &[(&str, &str)] = &[
    ("is a type of", "is_a"),
    ("is part of", "part_of"),
    ("belongs to", "belongs_to"),
    ("is a subset of", "subset_of"),
    ("is a special case of", "special_case_of"),
    ("is defined as", "defines"),
    ("is equal to", "equals"),
    ("is related to", "related_to"),
    ("is the inverse of", "inverse_of"),
    ("is the reciprocal of", "reciprocal_of"),
    ("is equivalent to", "equivalent_to"),
    ("implies", "implies"),
    ("leads to", "leads_to"),
    ("can be derived from", "derived_from"),
    ("is used to calculate", "calculates"),
    ("requires understanding of", "requires"),
    ("is used in", "used_in"),
    ("is applied to", "applied_to"),
    ("is a prerequisite for", "prerequisite_for"),
    ("builds upon", "builds_upon"),
    ("extends", "extends"),
    ("generalizes", "generalizes"),
    ("is tested in", "tested_in"),
    ("is assessed through", "assessed_through"),
    ("is part of the syllabus", "syllabus_part"),
    ("is a key concept in", "key_concept_in"),
    ("is commonly tested in", "commonly_tested_in"),
];

const SYLLABUS_PART: &str = "syllabus_part";

const TRIG_FUNCTIONS: &[&str] = &["sine", "cosine", "tangent", "sin", "cos", "tan"];
const ANGLE_TYPES: &[&str] = &["acute", "obtuse", "right", "reference angle", "basic angle"];

/// Normalises symbols and whitespace and lowercases, so taxonomy terms match
/// PDF text regardless of typography.
pub fn clean_text(text: &str) -> String {
    let replaced = text
        .replace('°', " degrees")
        .replace('π', "pi")
        .replace('×', "x")
        .replace('÷', "/")
        .replace(['\u{2212}', '\u{2013}', '\u{2014}'], "-")
        .replace('\u{f0b7}', "")
        .replace('\u{f028}', "(")
        .replace('\u{f029}', ")")
        .replace('\u{f03d}', "=");

    replaced.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptMention {
    pub name: &'static str,
    pub category: &'static str,
    pub subcategory: &'static str,
    /// `(related concept or syllabus title, relationship type)`
    pub related: Vec<(String, &'static str)>,
}

/// Taxonomy terms present in `text`, with relationships read from the text
/// between each pair of mentions. A concept named in a syllabus subtopic is
/// also linked to that subtopic and its topic.
pub fn extract_concepts(text: &str, syllabi: &[SyllabusData]) -> Vec<ConceptMention> {
    let cleaned = clean_text(text);
    let mut concepts = Vec::new();

    for &(category, subcategories) in MATH_CONCEPTS {
        for &(subcategory, terms) in subcategories {
            for &term in terms {
                if cleaned.contains(&clean_text(term)) {
                    concepts.push(ConceptMention {
                        name: term,
                        category,
                        subcategory,
                        related: Vec::new(),
                    });
                }
            }
        }
    }

    let positions: Vec<Option<usize>> = concepts
        .iter()
        .map(|concept| cleaned.find(&clean_text(concept.name)))
        .collect();

    for from in 0..concepts.len() {
        for to in 0..concepts.len() {
            if from == to || concepts[from] == concepts[to] {
                continue;
            }
            let between = match (positions[from], positions[to]) {
                (Some(start), Some(end)) if start < end => &cleaned[start..end],
                _ => continue,
            };
            let target = concepts[to].name;
            for &(phrase, relation) in RELATIONSHIP_PATTERNS {
                if between.contains(phrase) {
                    concepts[from].related.push((target.to_string(), relation));
                }
            }
        }
    }

    if !syllabi.is_empty() {
        for concept in &mut concepts {
            link_syllabus(concept, syllabi);
        }
    }

    concepts
}

/// Subtopic content and included items are searched; excluded items are not.
fn link_syllabus(concept: &mut ConceptMention, syllabi: &[SyllabusData]) {
    let name = clean_text(concept.name);
    for topic in syllabi.iter().flat_map(|syllabus| &syllabus.topics) {
        for subtopic in &topic.subtopics {
            let covered: Vec<&str> = subtopic
                .content
                .iter()
                .chain(&subtopic.include)
                .map(String::as_str)
                .collect();
            if clean_text(&covered.join(" ")).contains(&name) {
                concept.related.push((topic.title.clone(), SYLLABUS_PART));
                concept.related.push((subtopic.title.clone(), SYLLABUS_PART));
            }
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub node_types: BTreeMap<String, usize>,
    pub edge_types: BTreeMap<String, usize>,
    pub concept_categories: BTreeMap<String, usize>,
}

/// Directed graph with at most one node per id and one edge per ordered
/// pair. Re-adding either overwrites its attributes.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<(String, String), usize>,
}

impl KnowledgeGraph {
    /// Builds the graph from `chunks`. `syllabi` may be empty, which skips
    /// the syllabus edges.
    pub fn from_chunks(chunks: &[ContentChunk], syllabi: &[SyllabusData]) -> Self {
        let mut graph = Self::default();
        for chunk in chunks {
            graph.add_chunk(chunk, syllabi);
        }
        info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "knowledge graph built");
        graph
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index.get(id).map(|&index| &self.nodes[index])
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&GraphEdge> {
        self.edge_index
            .get(&(source.to_string(), target.to_string()))
            .map(|&index| &self.edges[index])
    }

    fn add_node(
        &mut self,
        id: &str,
        kind: &str,
        category: Option<&str>,
        subcategory: Option<&str>,
    ) {
        let node = GraphNode {
            id: id.to_string(),
            kind: Some(kind.to_string()),
            category: category.map(str::to_string),
            subcategory: subcategory.map(str::to_string),
        };
        match self.node_index.get(id) {
            Some(&index) => self.nodes[index] = node,
            None => {
                self.node_index.insert(id.to_string(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    fn ensure_node(&mut self, id: &str) {
        if !self.node_index.contains_key(id) {
            self.node_index.insert(id.to_string(), self.nodes.len());
            self.nodes.push(GraphNode {
                id: id.to_string(),
                kind: None,
                category: None,
                subcategory: None,
            });
        }
    }

    fn add_edge(&mut self, source: &str, target: &str, kind: &str) {
        self.ensure_node(source);
        self.ensure_node(target);
        let key = (source.to_string(), target.to_string());
        let edge = GraphEdge {
            source: key.0.clone(),
            target: key.1.clone(),
            kind: kind.to_string(),
        };
        match self.edge_index.get(&key) {
            Some(&index) => self.edges[index] = edge,
            None => {
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(edge);
            }
        }
    }

    pub fn add_chunk(&mut self, chunk: &ContentChunk, syllabi: &[SyllabusData]) {
        let chunk_id = chunk.id.as_str();
        let metadata = &chunk.metadata;
        self.add_node(chunk_id, "chunk", None, None);

        let field = |key: &str| metadata.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());

        if let Some(source) = field("source") {
            self.add_node(source, "source", None, None);
            self.add_edge(source, chunk_id, "is_source_of");
        }
        if let Some(kind) = field("type") {
            self.add_node(kind, "content_type", None, None);
            self.add_edge(chunk_id, kind, "has_type");
        }

        let topics: Vec<&str> = metadata
            .get("topics")
            .and_then(Value::as_array)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        for topic in &topics {
            self.add_node(topic, "topic", None, None);
            self.add_edge(chunk_id, topic, "covers_topic");
        }

        let concepts = extract_concepts(chunk.text(), syllabi);
        debug!(chunk = chunk_id, concepts = concepts.len(), "concepts found");
        for concept in &concepts {
            self.add_node(
                concept.name,
                "concept",
                Some(concept.category),
                Some(concept.subcategory),
            );
            self.add_edge(concept.name, chunk_id, "appears_in");
            for (related, relation) in &concept.related {
                if *relation == SYLLABUS_PART && !self.has_node(related) {
                    self.add_node(related, "syllabus_topic", None, None);
                }
                self.add_edge(concept.name, related, relation);
            }
        }

        if topics.iter().any(|topic| topic.contains("trigonometry")) {
            self.link_trigonometry();
        }
    }

    fn has_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    fn link_trigonometry(&mut self) {
        for &first in TRIG_FUNCTIONS {
            for &second in TRIG_FUNCTIONS {
                if first != second && self.has_node(first) && self.has_node(second) {
                    self.add_edge(first, second, "related_to");
                }
            }
        }
        for &angle in ANGLE_TYPES {
            if !self.has_node(angle) {
                continue;
            }
            for &function in TRIG_FUNCTIONS {
                if self.has_node(function) {
                    self.add_edge(angle, function, "used_in");
                }
            }
        }
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            ..GraphStats::default()
        };
        for node in &self.nodes {
            if let Some(kind) = &node.kind {
                *stats.node_types.entry(kind.clone()).or_default() += 1;
                if kind == "concept" {
                    let category = node.category.clone().unwrap_or_else(|| "unknown".to_string());
                    *stats.concept_categories.entry(category).or_default() += 1;
                }
            }
        }
        for edge in &self.edges {
            *stats.edge_types.entry(edge.kind.clone()).or_default() += 1;
        }
        stats
    }

    pub fn to_json(&self) -> Value {
        json!({
            "nodes": self.nodes,
            "edges": self.edges,
            "stats": self.stats(),
        })
    }

    pub fn write_json(&self, path: &Path) -> Result<(), IngestError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.to_json())?)?;
        Ok(())
    }
}
