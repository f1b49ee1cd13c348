//! Per-section concept tree state.
//!
//! Each section gets its own [`TreeState`] the first time its tree is opened.
//! Loads and node expansions are independent operations with independent
//! flags, and neither ever touches another section's state.

use crate::generation::{fallback_root, ConceptNode, GenerationError};
use std::collections::HashMap;

/// Rendered rows stop at grandchildren of the root.
pub const MAX_TREE_DEPTH: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct TreeState {
    pub nodes: Vec<ConceptNode>,
    pub loading: bool,
    pub error: Option<String>,
    pub expanded: bool,
    pub selected_node_id: Option<String>,
    /// A node expansion (new section) is in flight.
    pub action_loading: bool,
    pub action_error: Option<String>,
    load_generation: u64,
}

/// One visible line of the tree panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub node: ConceptNode,
    pub depth: usize,
}

impl TreeState {
    pub fn root(&self) -> Option<&ConceptNode> {
        self.nodes.iter().find(|n| n.is_root())
    }

    pub fn node(&self, id: &str) -> Option<&ConceptNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn selected_node(&self) -> Option<&ConceptNode> {
        self.selected_node_id.as_deref().and_then(|id| self.node(id))
    }

    fn children<'a>(&'a self, parent_id: &'a str) -> impl Iterator<Item = &'a ConceptNode> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.parent_id.as_deref() == Some(parent_id))
    }

    /// Depth-first rows: the root, its children, and their children.
    ///
    /// A stand-in root built from `topic` is used if the tree has none.
    pub fn rows(&self, topic: &str) -> Vec<TreeRow> {
        let root = self.root().cloned().unwrap_or_else(|| fallback_root(topic));
        let mut rows = Vec::with_capacity(self.nodes.len().max(1));
        self.push_rows(root, 0, &mut rows);
        rows
    }

    fn push_rows(&self, node: ConceptNode, depth: usize, rows: &mut Vec<TreeRow>) {
        let id = node.id.clone();
        rows.push(TreeRow { node, depth });
        if depth >= MAX_TREE_DEPTH {
            return;
        }
        for child in self.children(&id) {
            self.push_rows(child.clone(), depth + 1, rows);
        }
    }
}

/// A tree load the caller must run and report back through
/// [`TreeController::finish_load`] with the same `generation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFetch {
    pub section_id: String,
    pub topic: String,
    pub generation: u64,
}

/// Generate a new section about a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandRequest {
    pub section_id: String,
    /// The node label, used verbatim as the new section's topic.
    pub topic: String,
    pub recent_topics: Vec<String>,
}

#[derive(Debug, Default)]
pub struct TreeController {
    states: HashMap<String, TreeState>,
}

impl TreeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, section_id: &str) -> Option<&TreeState> {
        self.states.get(section_id)
    }

    pub fn is_expanded(&self, section_id: &str) -> bool {
        self.states.get(section_id).is_some_and(|s| s.expanded)
    }

    /// Collapse an open tree, reopen a cached one, or start the first load.
    pub fn toggle(&mut self, section_id: &str, topic: &str) -> Option<TreeFetch> {
        if let Some(state) = self.states.get_mut(section_id) {
            if state.expanded {
                state.expanded = false;
                return None;
            }
            if !state.nodes.is_empty() {
                state.expanded = true;
                state.error = None;
                return None;
            }
        }
        Some(self.load(section_id, topic))
    }

    /// Start a (re)load. Any load already in flight for this section becomes
    /// stale.
    pub fn load(&mut self, section_id: &str, topic: &str) -> TreeFetch {
        let state = self.states.entry(section_id.to_string()).or_default();
        state.loading = true;
        state.error = None;
        state.expanded = true;
        state.load_generation += 1;

        tracing::debug!(section_id, topic, generation = state.load_generation, "Loading concept tree");

        TreeFetch {
            section_id: section_id.to_string(),
            topic: topic.to_string(),
            generation: state.load_generation,
        }
    }

    /// Apply a load result. Returns `false` when the result was ignored
    /// because a newer load for the section has started.
    pub fn finish_load(
        &mut self,
        section_id: &str,
        generation: u64,
        result: Result<Vec<ConceptNode>, GenerationError>,
    ) -> bool {
        let Some(state) = self.states.get_mut(section_id) else {
            tracing::warn!(section_id, "Tree result for unknown section");
            return false;
        };
        if generation != state.load_generation {
            tracing::debug!(
                section_id,
                generation,
                current = state.load_generation,
                "Discarding stale tree result"
            );
            return false;
        }

        state.loading = false;
        match result {
            Ok(nodes) => {
                state.selected_node_id = nodes
                    .iter()
                    .find(|n| n.is_root())
                    .or_else(|| nodes.first())
                    .map(|n| n.id.clone());
                state.nodes = nodes;
                state.error = None;
            }
            Err(e) => {
                tracing::warn!(section_id, error = %e, "Concept tree load failed");
                state.error = Some(format!("Concept map unavailable. {}", e.user_message()));
            }
        }
        true
    }

    pub fn select_node(&mut self, section_id: &str, node_id: &str) {
        if let Some(state) = self.states.get_mut(section_id) {
            state.selected_node_id = Some(node_id.to_string());
            state.action_error = None;
        }
    }

    /// Move the selection one rendered row down.
    pub fn select_next(&mut self, section_id: &str, topic: &str) {
        self.step_selection(section_id, topic, 1);
    }

    /// Move the selection one rendered row up.
    pub fn select_prev(&mut self, section_id: &str, topic: &str) {
        self.step_selection(section_id, topic, -1);
    }

    fn step_selection(&mut self, section_id: &str, topic: &str, delta: isize) {
        let Some(state) = self.states.get(section_id) else {
            return;
        };
        if state.nodes.is_empty() {
            return;
        }

        let rows = state.rows(topic);
        let current = state
            .selected_node_id
            .as_deref()
            .and_then(|id| rows.iter().position(|r| r.node.id == id));
        let next = match current {
            Some(i) => i.saturating_add_signed(delta).min(rows.len() - 1),
            None => 0,
        };

        let node_id = rows[next].node.id.clone();
        self.select_node(section_id, &node_id);
    }

    /// Begin turning the selected node into a new section. `None` while an
    /// expansion for this section is already in flight.
    pub fn expand_selected(
        &mut self,
        section_id: &str,
        recent_topics: Vec<String>,
    ) -> Option<ExpandRequest> {
        let state = self.states.get_mut(section_id)?;
        if state.action_loading {
            return None;
        }
        let label = state.selected_node()?.label.clone();

        state.action_loading = true;
        state.action_error = None;
        tracing::debug!(section_id, topic = %label, "Expanding concept node");

        Some(ExpandRequest {
            section_id: section_id.to_string(),
            topic: label,
            recent_topics,
        })
    }

    /// Clear the in-flight flag; on failure record the action error. The new
    /// section itself is appended by the caller.
    pub fn finish_expand<T>(&mut self, section_id: &str, result: &Result<T, GenerationError>) {
        let Some(state) = self.states.get_mut(section_id) else {
            return;
        };
        state.action_loading = false;
        if let Err(e) = result {
            tracing::warn!(section_id, error = %e, "Concept node expansion failed");
            state.action_error = Some(format!("Expansion failed. {}", e.user_message()));
        }
    }
}
