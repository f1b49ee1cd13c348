//! Concept tree generation and normalization.
//!
//! The model is asked for a small JSON hierarchy of related topics, but its
//! output is treated as untrusted: anything malformed degrades to a one-node
//! tree instead of an error. Parent references arrive as free-form strings
//! (a label, the topic, or an id the model invented) and are resolved to our
//! own node ids exactly once, here, so the rest of the program only ever
//! follows id links.

use super::client::{ChatMessage, ChatRequest, GenerationClient, GenerationError, ResponseFormat};
use crate::util::strip_control_chars;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

const TREE_SYSTEM_PROMPT: &str = "You map Bitcoin concepts into compact exploration trees. \
You answer with a single JSON object and nothing else.";

/// Labels longer than this are cut; the tree panel is narrow.
const MAX_LABEL_CHARS: usize = 80;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// One node of a concept tree. `parent_id` is the id of another node in the
/// same tree, or `None` for the single root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptNode {
    pub id: String,
    pub label: String,
    pub parent_id: Option<String>,
    pub summary: String,
}

impl ConceptNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

fn fresh_node_id() -> String {
    format!("node-{}", NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Id of the synthesized root for `topic`.
///
/// Derived from the topic rather than freshly allocated, so repeated
/// fallbacks for the same section keep the same id and the selection
/// survives a reload.
fn fallback_root_id(topic: &str) -> String {
    let mut slug = String::with_capacity(topic.len());
    let mut last_dash = true;
    for c in topic.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "root".to_string()
    } else {
        format!("root-{}", slug)
    }
}

/// The single-node tree used whenever the model's answer is unusable.
pub fn fallback_root(topic: &str) -> ConceptNode {
    ConceptNode {
        id: fallback_root_id(topic),
        label: topic.to_string(),
        parent_id: None,
        summary: format!("Exploring {} through Bitcoin's lens.", topic),
    }
}

/// User prompt asking for the JSON tree.
pub fn build_tree_prompt(topic: &str) -> String {
    format!(
        r#"Build a concept tree for exploring the Bitcoin topic "{topic}".

Return JSON shaped exactly like:
{{"nodes": [{{"label": "...", "parent": null, "summary": "..."}}, ...]}}

Rules:
1. Exactly one root node whose label is "{topic}" and whose parent is null.
2. 3-5 branch nodes whose parent is the root label.
3. 1-3 leaf nodes under each branch whose parent is that branch's label.
4. Labels are short noun phrases (2-5 words), unique within the tree.
5. Each summary is one plain sentence, no markdown.
6. Output the JSON object only."#
    )
}

impl GenerationClient {
    /// Generate a concept tree for `topic`.
    ///
    /// Only transport and non-success status failures are errors. A response
    /// that cannot be read as a tree yields [`fallback_root`].
    pub async fn generate_tree(&self, topic: &str) -> Result<Vec<ConceptNode>, GenerationError> {
        let request = ChatRequest {
            model: self.model(),
            messages: vec![
                ChatMessage::system(TREE_SYSTEM_PROMPT),
                ChatMessage::user(build_tree_prompt(topic)),
            ],
            stream: false,
            temperature: self.tree_temperature(),
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };

        match self.complete(&request).await {
            Ok(content) => Ok(parse_concept_tree(&content, topic)),
            Err(GenerationError::Decode(reason)) => {
                tracing::warn!(topic = %topic, reason = %reason, "Tree response unreadable, using fallback");
                Ok(vec![fallback_root(topic)])
            }
            Err(e) => Err(e),
        }
    }
}

/// A raw entry that passed sanitization, before parent resolution.
struct Candidate {
    id: String,
    upstream_id: Option<String>,
    label: String,
    parent_ref: Option<String>,
    summary: String,
}

/// Normalize model output into a tree with exactly one root.
///
/// Accepts `{"nodes": [...]}` or a bare array, optionally inside a markdown
/// code fence. Entries need a non-empty string `label`; `parentId` or `parent`
/// names the parent. The first surviving entry without a parent is the root,
/// later parentless entries hang off the topic. Every node gets a fresh id;
/// upstream ids are consulted only to resolve parent references. When no root
/// survives, [`fallback_root`] is prepended. Unparseable input yields
/// `[fallback_root(topic)]`.
pub fn parse_concept_tree(raw: &str, topic: &str) -> Vec<ConceptNode> {
    let Some(entries) = extract_entries(raw) else {
        tracing::debug!(topic = %topic, "Tree response is not a node list, using fallback");
        return vec![fallback_root(topic)];
    };

    let mut candidates: Vec<Candidate> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let Some(label) = string_field(obj, "label") else {
            continue;
        };

        let parent = string_field(obj, "parentId").or_else(|| string_field(obj, "parent"));
        let parent_ref = match parent {
            Some(p) => Some(p),
            None if candidates.is_empty() => None,
            None => Some(topic.to_string()),
        };

        candidates.push(Candidate {
            id: fresh_node_id(),
            upstream_id: string_field(obj, "id"),
            label: clip_label(&label),
            parent_ref,
            summary: obj
                .get("summary")
                .and_then(Value::as_str)
                .map(|s| strip_control_chars(s.trim()).into_owned())
                .unwrap_or_default(),
        });
    }

    if candidates.is_empty() {
        tracing::debug!(topic = %topic, entries = entries.len(), "No valid tree entries, using fallback");
        return vec![fallback_root(topic)];
    }

    let mut nodes: Vec<ConceptNode> = Vec::with_capacity(candidates.len() + 1);
    let root_index = candidates.iter().position(|c| c.parent_ref.is_none());
    let (root_id, root_label) = match root_index {
        Some(i) => (candidates[i].id.clone(), candidates[i].label.clone()),
        None => {
            let root = fallback_root(topic);
            let pair = (root.id.clone(), root.label.clone());
            nodes.push(root);
            pair
        }
    };

    for (i, candidate) in candidates.iter().enumerate() {
        let parent_id = match &candidate.parent_ref {
            None => None,
            Some(reference) => Some(resolve_parent(
                reference,
                i,
                &candidates,
                topic,
                &root_id,
                &root_label,
            )),
        };
        nodes.push(ConceptNode {
            id: candidate.id.clone(),
            label: candidate.label.clone(),
            parent_id,
            summary: candidate.summary.clone(),
        });
    }

    reattach_unreachable(&mut nodes, &root_id);
    nodes
}

/// Map a free-form parent reference to a node id.
///
/// Order: topic or root label, another entry's upstream id, another entry's
/// label (case-insensitive). Anything unresolved hangs off the root.
fn resolve_parent(
    reference: &str,
    own_index: usize,
    candidates: &[Candidate],
    topic: &str,
    root_id: &str,
    root_label: &str,
) -> String {
    if same_label(reference, topic) || same_label(reference, root_label) {
        return root_id.to_string();
    }

    let others = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != own_index)
        .map(|(_, c)| c);

    if let Some(parent) = others
        .clone()
        .find(|c| c.upstream_id.as_deref() == Some(reference))
    {
        return parent.id.clone();
    }

    if let Some(parent) = others.clone().find(|c| same_label(&c.label, reference)) {
        return parent.id.clone();
    }

    root_id.to_string()
}

/// Unicode case-insensitive label equality.
fn same_label(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// Parent links may form cycles (A under B, B under A). Walk from the root and
/// hang the first unreached node of each detached component off the root.
fn reattach_unreachable(nodes: &mut [ConceptNode], root_id: &str) {
    let mut children: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, node) in nodes.iter().enumerate() {
        if let Some(parent) = &node.parent_id {
            children.entry(parent.clone()).or_default().push(i);
        }
    }

    let mut reached: HashSet<usize> = HashSet::with_capacity(nodes.len());
    let mut queue: VecDeque<String> = VecDeque::new();
    if let Some(i) = nodes.iter().position(|n| n.id == root_id) {
        reached.insert(i);
    }
    queue.push_back(root_id.to_string());

    loop {
        while let Some(id) = queue.pop_front() {
            for &child in children.get(&id).map(Vec::as_slice).unwrap_or_default() {
                if reached.insert(child) {
                    queue.push_back(nodes[child].id.clone());
                }
            }
        }

        let Some(detached) = (0..nodes.len()).find(|i| !reached.contains(i)) else {
            break;
        };
        tracing::debug!(label = %nodes[detached].label, "Re-attaching detached tree node to root");

        if let Some(old_parent) = nodes[detached].parent_id.replace(root_id.to_string()) {
            if let Some(siblings) = children.get_mut(&old_parent) {
                siblings.retain(|&c| c != detached);
            }
        }
        reached.insert(detached);
        queue.push_back(nodes[detached].id.clone());
    }
}

fn extract_entries(raw: &str) -> Option<Vec<Value>> {
    let body = strip_code_fence(raw.trim());
    if body.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(body).ok()? {
        Value::Array(entries) => Some(entries),
        Value::Object(mut map) => match map.remove("nodes") {
            Some(Value::Array(entries)) => Some(entries),
            _ => None,
        },
        _ => None,
    }
}

/// Drop a surrounding ```json ... ``` fence if present.
fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => return "",
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| strip_control_chars(s).into_owned())
}

fn clip_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_string();
    }
    label.chars().take(MAX_LABEL_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn roots(nodes: &[ConceptNode]) -> usize {
        nodes.iter().filter(|n| n.is_root()).count()
    }

    fn by_label<'a>(nodes: &'a [ConceptNode], label: &str) -> &'a ConceptNode {
        nodes
            .iter()
            .find(|n| n.label == label)
            .unwrap_or_else(|| panic!("no node labeled {label}"))
    }

    /// Structure without the generated ids: (label, parent label, summary).
    fn shape(nodes: &[ConceptNode]) -> Vec<(String, Option<String>, String)> {
        nodes
            .iter()
            .map(|n| {
                let parent = n.parent_id.as_ref().map(|p| {
                    nodes
                        .iter()
                        .find(|m| &m.id == p)
                        .map(|m| m.label.clone())
                        .unwrap_or_default()
                });
                (n.label.clone(), parent, n.summary.clone())
            })
            .collect()
    }

    #[test]
    fn test_not_json_yields_fallback() {
        let nodes = parse_concept_tree("not json", "Mining");
        assert_eq!(
            nodes,
            vec![ConceptNode {
                id: "root-mining".to_string(),
                label: "Mining".to_string(),
                parent_id: None,
                summary: "Exploring Mining through Bitcoin's lens.".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_and_wrong_shapes_yield_fallback() {
        for raw in ["", "   ", "42", "\"nodes\"", "{\"nodes\": 3}", "{\"items\": []}", "[]", "[1, 2]"] {
            let nodes = parse_concept_tree(raw, "Taproot");
            assert_eq!(nodes.len(), 1, "input {raw:?}");
            assert_eq!(nodes[0].label, "Taproot");
            assert!(nodes[0].is_root());
        }
    }

    #[test]
    fn test_malformed_input_is_idempotent() {
        let a = parse_concept_tree("{oops", "Halving");
        let b = parse_concept_tree("{oops", "Halving");
        assert_eq!(shape(&a), shape(&b));
        assert_eq!(a[0].id, b[0].id);
    }

    #[test]
    fn test_well_formed_tree() {
        let raw = r#"{"nodes": [
            {"label": "Mining", "parent": null, "summary": "Securing the chain."},
            {"label": "Hash Rate", "parent": "Mining", "summary": "Total work."},
            {"label": "ASICs", "parent": "Hash Rate", "summary": "Special chips."},
            {"label": "Pools", "parentId": "Mining", "summary": "Shared variance."}
        ]}"#;
        let nodes = parse_concept_tree(raw, "Mining");

        assert_eq!(nodes.len(), 4);
        assert_eq!(roots(&nodes), 1);
        let root = by_label(&nodes, "Mining");
        let hash_rate = by_label(&nodes, "Hash Rate");
        assert_eq!(hash_rate.parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(
            by_label(&nodes, "ASICs").parent_id.as_deref(),
            Some(hash_rate.id.as_str())
        );
        assert_eq!(
            by_label(&nodes, "Pools").parent_id.as_deref(),
            Some(root.id.as_str())
        );
    }

    #[test]
    fn test_bare_array_accepted() {
        let raw = r#"[{"label": "Root"}, {"label": "Leaf", "parent": "Root"}]"#;
        let nodes = parse_concept_tree(raw, "Topic");
        assert_eq!(nodes.len(), 2);
        assert!(by_label(&nodes, "Root").is_root());
    }

    #[test]
    fn test_code_fence_tolerated() {
        let raw = "```json\n{\"nodes\": [{\"label\": \"Seeds\"}]}\n```";
        let nodes = parse_concept_tree(raw, "Self-Custody");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].label, "Seeds");
    }

    #[test]
    fn test_invalid_entries_discarded() {
        let raw = r#"{"nodes": [
            {"label": "Root"},
            {"label": ""},
            {"label": 7},
            "string entry",
            {"summary": "no label"},
            {"label": "  Kept  ", "parent": "Root"}
        ]}"#;
        let nodes = parse_concept_tree(raw, "T");
        let labels: Vec<&str> = nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Root", "Kept"]);
    }

    #[test]
    fn test_parentless_entries_after_first_point_at_root() {
        let raw = r#"[{"label": "A"}, {"label": "B"}, {"label": "C"}]"#;
        let nodes = parse_concept_tree(raw, "Topic");
        assert_eq!(roots(&nodes), 1);
        let root_id = by_label(&nodes, "A").id.clone();
        assert_eq!(by_label(&nodes, "B").parent_id.as_deref(), Some(root_id.as_str()));
        assert_eq!(by_label(&nodes, "C").parent_id.as_deref(), Some(root_id.as_str()));
    }

    #[test]
    fn test_topic_reference_matched_without_ascii_bias() {
        for topic in ["Mining", "Ökonomie"] {
            let raw = serde_json::json!([
                {"label": "Bitcoin"},
                {"label": topic, "parent": "Bitcoin"},
                {"label": "Fees", "parent": topic.to_uppercase()},
                {"label": "Halving", "parent": topic.to_lowercase()}
            ])
            .to_string();
            let nodes = parse_concept_tree(&raw, topic);

            let root_id = by_label(&nodes, "Bitcoin").id.as_str();
            assert_eq!(by_label(&nodes, "Fees").parent_id.as_deref(), Some(root_id), "topic {topic}");
            assert_eq!(by_label(&nodes, "Halving").parent_id.as_deref(), Some(root_id), "topic {topic}");
        }
    }

    #[test]
    fn test_missing_root_prepends_fallback() {
        let raw = r#"[{"label": "A", "parent": "Segwit"}, {"label": "B", "parent": "A"}]"#;
        let nodes = parse_concept_tree(raw, "Segwit");
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].label, "Segwit");
        assert!(nodes[0].is_root());
        assert_eq!(nodes[1].parent_id.as_deref(), Some(nodes[0].id.as_str()));
        assert_eq!(nodes[2].parent_id.as_deref(), Some(nodes[1].id.as_str()));
    }

    #[test]
    fn test_upstream_ids_resolve_but_are_not_reused() {
        let raw = r#"[
            {"id": "n1", "label": "Root"},
            {"id": "n2", "label": "Child", "parentId": "n1"},
            {"id": "n3", "label": "Grandchild", "parentId": "n2"}
        ]"#;
        let nodes = parse_concept_tree(raw, "Topic");
        assert!(nodes.iter().all(|n| !["n1", "n2", "n3"].contains(&n.id.as_str())));
        let child = by_label(&nodes, "Child");
        assert_eq!(
            by_label(&nodes, "Grandchild").parent_id.as_deref(),
            Some(child.id.as_str())
        );
    }

    #[test]
    fn test_duplicate_labels_get_distinct_ids() {
        let raw = r#"[{"label": "Root"}, {"label": "Fees", "parent": "Root"}, {"label": "Fees", "parent": "Root"}]"#;
        let nodes = parse_concept_tree(raw, "Topic");
        assert_eq!(nodes.len(), 3);
        assert_ne!(nodes[1].id, nodes[2].id);
    }

    #[test]
    fn test_cycle_reattached_to_root() {
        let raw = r#"[{"label": "Root"}, {"label": "A", "parent": "B"}, {"label": "B", "parent": "A"}]"#;
        let nodes = parse_concept_tree(raw, "Topic");
        let root = by_label(&nodes, "Root");
        let a = by_label(&nodes, "A");
        let b = by_label(&nodes, "B");
        // A is first in input order, so it is the one moved under the root
        assert_eq!(a.parent_id.as_deref(), Some(root.id.as_str()));
        assert_eq!(b.parent_id.as_deref(), Some(a.id.as_str()));
    }

    #[test]
    fn test_self_reference_reattached() {
        let raw = r#"[{"label": "Root"}, {"label": "Loop", "parent": "Loop"}]"#;
        let nodes = parse_concept_tree(raw, "Topic");
        let root = by_label(&nodes, "Root");
        assert_eq!(
            by_label(&nodes, "Loop").parent_id.as_deref(),
            Some(root.id.as_str())
        );
    }

    #[test]
    fn test_fallback_root_id_slug() {
        assert_eq!(fallback_root_id("51% Attacks"), "root-51-attacks");
        assert_eq!(fallback_root_id("!!!"), "root");
    }

    #[test]
    fn test_escape_sequences_removed_from_labels() {
        let raw = r#"[{"label": "\u001b[31mRed", "summary": "\u001b]0;x\u0007ok"}]"#;
        let nodes = parse_concept_tree(raw, "Topic");
        assert_eq!(nodes[0].label, "Red");
        assert_eq!(nodes[0].summary, "ok");
    }

    fn arb_entry() -> impl Strategy<Value = serde_json::Value> {
        let label = prop_oneof![
            Just(serde_json::Value::Null),
            Just(serde_json::json!("")),
            "[A-D]{1,2}".prop_map(serde_json::Value::String),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
        ];
        let parent = prop_oneof![
            Just(None),
            Just(Some(serde_json::Value::Null)),
            Just(Some(serde_json::json!("Topic"))),
            "[A-D]{1,2}".prop_map(|s| Some(serde_json::Value::String(s))),
        ];
        (label, parent, any::<bool>()).prop_map(|(label, parent, use_parent_id)| {
            let mut obj = serde_json::Map::new();
            obj.insert("label".to_string(), label);
            if let Some(p) = parent {
                let key = if use_parent_id { "parentId" } else { "parent" };
                obj.insert(key.to_string(), p);
            }
            serde_json::Value::Object(obj)
        })
    }

    proptest! {
        #[test]
        fn prop_exactly_one_root(entries in proptest::collection::vec(arb_entry(), 0..12), wrap in any::<bool>()) {
            let raw = if wrap {
                serde_json::json!({ "nodes": entries }).to_string()
            } else {
                serde_json::Value::Array(entries).to_string()
            };
            let nodes = parse_concept_tree(&raw, "Topic");
            prop_assert_eq!(roots(&nodes), 1);
        }

        #[test]
        fn prop_every_parent_exists_and_reaches_root(entries in proptest::collection::vec(arb_entry(), 0..12)) {
            let raw = serde_json::Value::Array(entries).to_string();
            let nodes = parse_concept_tree(&raw, "Topic");
            let ids: HashMap<&str, &ConceptNode> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
            prop_assert_eq!(ids.len(), nodes.len());
            for node in &nodes {
                let mut current = node;
                let mut steps = 0;
                while let Some(parent) = &current.parent_id {
                    prop_assert!(ids.contains_key(parent.as_str()));
                    current = ids[parent.as_str()];
                    steps += 1;
                    prop_assert!(steps <= nodes.len());
                }
            }
        }

        #[test]
        fn prop_arbitrary_text_never_panics(raw in ".{0,200}") {
            let nodes = parse_concept_tree(&raw, "Topic");
            prop_assert!(!nodes.is_empty());
            prop_assert_eq!(roots(&nodes), 1);
        }
    }
}
