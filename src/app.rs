use crate::config::Config;
use crate::controller::{
    ContentSection, FeedController, LoadingState, TreeController, TreeState,
};
use crate::generation::{ConceptNode, GeneratedText, GenerationClient, GenerationError};
use crate::keybindings::KeybindingRegistry;
use crate::tasks;
use crate::theme::StyleMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::style::Style;
use std::borrow::Cow;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Capacity of the task → UI event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Seconds a status bar message stays visible.
const STATUS_TTL_SECS: u64 = 3;

// ============================================================================
// Focus and Events
// ============================================================================

/// Which panel receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Feed,
    Tree,
}

/// Results reported by background tasks.
#[derive(Debug)]
pub enum AppEvent {
    /// A feed extension finished (successfully or not).
    FeedGenerated {
        result: Result<GeneratedText, GenerationError>,
    },
    /// A concept tree load finished. `generation` identifies which load.
    TreeLoaded {
        section_id: String,
        generation: u64,
        result: Result<Vec<ConceptNode>, GenerationError>,
    },
    /// A concept node was turned into a new section (or failed to be).
    NodeExpanded {
        section_id: String,
        topic: String,
        result: Result<GeneratedText, GenerationError>,
    },
}

// ============================================================================
// Feed Layout
// ============================================================================

/// Geometry of the feed panel as last rendered.
///
/// Written by the renderer; read by scrolling and the proximity trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedLayout {
    /// Rendered feed rows, including the loading/error footer.
    pub total_lines: usize,
    /// Rows visible in the feed panel.
    pub viewport_height: usize,
    /// Row index of each section's divider, in section order.
    pub section_starts: Vec<usize>,
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub config: Config,
    pub client: GenerationClient,

    pub feed: FeedController,
    pub trees: TreeController,

    pub theme: StyleMap,
    pub keybindings: KeybindingRegistry,

    // UI state
    pub focus: Focus,
    pub show_help: bool,
    pub scroll_offset: usize,
    pub selected_section: usize,
    pub layout: FeedLayout,
    pub needs_redraw: bool,
    pub spinner_frame: usize,
    pub status_message: Option<(Cow<'static, str>, Instant)>,

    rng: StdRng,
}

impl App {
    pub fn new(config: Config, client: GenerationClient) -> Self {
        let mut keybindings = KeybindingRegistry::new();
        for warning in keybindings.apply_overrides(&config.keybindings) {
            tracing::warn!(warning = %warning, "Keybinding override ignored");
        }

        Self {
            feed: FeedController::new(config.recent_topic_window),
            trees: TreeController::new(),
            theme: StyleMap::for_name(&config.theme),
            keybindings,
            focus: Focus::Feed,
            show_help: false,
            scroll_offset: 0,
            selected_section: 0,
            layout: FeedLayout::default(),
            needs_redraw: true,
            spinner_frame: 0,
            status_message: None,
            rng: StdRng::from_entropy(),
            config,
            client,
        }
    }

    // ------------------------------------------------------------------------
    // Feed
    // ------------------------------------------------------------------------

    /// Kick off the first section when the feed is empty.
    pub fn start(&mut self, tx: &mpsc::Sender<AppEvent>) {
        if self.feed.sections().is_empty() {
            self.request_more(tx);
        }
    }

    /// Start a feed extension unless one is in flight. Returns whether a task
    /// was spawned.
    pub fn request_more(&mut self, tx: &mpsc::Sender<AppEvent>) -> bool {
        let Some(fetch) = self.feed.request_more(&mut self.rng) else {
            return false;
        };
        tasks::spawn_feed_fetch(
            self.client.clone(),
            fetch,
            self.config.min_loading(),
            tx.clone(),
        );
        self.needs_redraw = true;
        true
    }

    /// Retry after a failed extension. No-op unless the feed is in `Error`.
    pub fn retry_feed(&mut self, tx: &mpsc::Sender<AppEvent>) -> bool {
        let Some(fetch) = self.feed.retry(&mut self.rng) else {
            return false;
        };
        tasks::spawn_feed_fetch(
            self.client.clone(),
            fetch,
            self.config.min_loading(),
            tx.clone(),
        );
        self.needs_redraw = true;
        true
    }

    /// Whether the viewport is within `lookahead_lines` of the feed's end.
    pub fn near_feed_end(&self) -> bool {
        if self.layout.viewport_height == 0 {
            return false;
        }
        let trigger_line = self
            .layout
            .total_lines
            .saturating_sub(self.config.lookahead_lines);
        trigger_line <= self.scroll_offset + self.layout.viewport_height
    }

    /// Proximity trigger. Fires only from `Idle`: a failed load waits for an
    /// explicit retry instead of looping.
    pub fn maybe_extend_feed(&mut self, tx: &mpsc::Sender<AppEvent>) -> bool {
        if self.feed.state() != LoadingState::Idle || !self.near_feed_end() {
            return false;
        }
        tracing::debug!(
            scroll = self.scroll_offset,
            total = self.layout.total_lines,
            "Viewport near feed end, extending"
        );
        self.request_more(tx)
    }

    pub fn selected_section(&self) -> Option<&ContentSection> {
        self.feed.sections().get(self.selected_section)
    }

    // ------------------------------------------------------------------------
    // Concept tree
    // ------------------------------------------------------------------------

    /// Tree state of the selected section, if its tree panel is open.
    pub fn visible_tree(&self) -> Option<(&ContentSection, &TreeState)> {
        let section = self.selected_section()?;
        let state = self.trees.state(&section.id)?;
        state.expanded.then_some((section, state))
    }

    pub fn toggle_tree(&mut self, tx: &mpsc::Sender<AppEvent>) {
        let Some(section) = self.selected_section() else {
            self.set_status("No section selected");
            return;
        };
        let (id, topic) = (section.id.clone(), section.topic.clone());

        if let Some(fetch) = self.trees.toggle(&id, &topic) {
            tasks::spawn_tree_load(self.client.clone(), fetch, tx.clone());
        }
        self.focus = if self.trees.is_expanded(&id) {
            Focus::Tree
        } else {
            Focus::Feed
        };
    }

    /// Regenerate the selected section's tree.
    pub fn reload_tree(&mut self, tx: &mpsc::Sender<AppEvent>) {
        let Some(section) = self.selected_section() else {
            return;
        };
        let (id, topic) = (section.id.clone(), section.topic.clone());
        let fetch = self.trees.load(&id, &topic);
        tasks::spawn_tree_load(self.client.clone(), fetch, tx.clone());
    }

    pub fn select_next_node(&mut self) {
        if let Some((id, topic)) = self.selected_ids() {
            self.trees.select_next(&id, &topic);
        }
    }

    pub fn select_prev_node(&mut self) {
        if let Some((id, topic)) = self.selected_ids() {
            self.trees.select_prev(&id, &topic);
        }
    }

    /// Turn the selected concept node into a new feed section.
    pub fn expand_selected_node(&mut self, tx: &mpsc::Sender<AppEvent>) -> bool {
        let Some((id, _)) = self.selected_ids() else {
            return false;
        };
        let recent = self.feed.recent_topics(self.config.recent_topic_window);
        let Some(request) = self.trees.expand_selected(&id, recent) else {
            return false;
        };
        self.set_status(format!("Writing about {}...", request.topic));
        tasks::spawn_expand(self.client.clone(), request, tx.clone());
        true
    }

    fn selected_ids(&self) -> Option<(String, String)> {
        self.selected_section()
            .map(|s| (s.id.clone(), s.topic.clone()))
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Feed if self.visible_tree().is_some() => Focus::Tree,
            _ => Focus::Feed,
        };
    }

    // ------------------------------------------------------------------------
    // Task events
    // ------------------------------------------------------------------------

    /// Apply a task result. The only place controller state changes in
    /// response to background work.
    pub fn handle_event(&mut self, event: AppEvent) {
        self.needs_redraw = true;
        match event {
            AppEvent::FeedGenerated { result } => {
                if let Err(e) = &result {
                    self.set_status(e.user_message());
                }
                self.feed.complete(result);
            }
            AppEvent::TreeLoaded {
                section_id,
                generation,
                result,
            } => {
                self.trees.finish_load(&section_id, generation, result);
            }
            AppEvent::NodeExpanded {
                section_id,
                topic,
                result,
            } => {
                self.trees.finish_expand(&section_id, &result);
                if let Ok(generated) = result {
                    self.feed.append(topic.clone(), generated.text);
                    self.set_status(format!("New section: {}", topic));
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Scrolling and selection
    // ------------------------------------------------------------------------

    fn max_scroll(&self) -> usize {
        self.layout
            .total_lines
            .saturating_sub(self.layout.viewport_height)
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add(lines)
            .min(self.max_scroll());
        self.sync_selection_to_scroll();
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
        self.sync_selection_to_scroll();
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.layout.viewport_height.max(1) / 2);
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.layout.viewport_height.max(1) / 2);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
        self.sync_selection_to_scroll();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_scroll();
        self.sync_selection_to_scroll();
    }

    pub fn next_section(&mut self) {
        let count = self.feed.sections().len();
        if count == 0 {
            return;
        }
        self.select_section((self.selected_section + 1).min(count - 1));
    }

    pub fn prev_section(&mut self) {
        self.select_section(self.selected_section.saturating_sub(1));
    }

    fn select_section(&mut self, index: usize) {
        self.selected_section = index;
        if let Some(&start) = self.layout.section_starts.get(index) {
            self.scroll_offset = start.min(self.max_scroll());
        }
        self.after_selection_change();
    }

    /// Select the section whose divider is the last one at or above the top
    /// of the viewport.
    fn sync_selection_to_scroll(&mut self) {
        let starts = &self.layout.section_starts;
        if starts.is_empty() {
            return;
        }
        let index = starts
            .partition_point(|&start| start <= self.scroll_offset)
            .saturating_sub(1);
        if index != self.selected_section {
            self.selected_section = index;
            self.after_selection_change();
        }
    }

    fn after_selection_change(&mut self) {
        if self.visible_tree().is_none() {
            self.focus = Focus::Feed;
        }
    }

    /// Keep scroll and selection valid after the renderer updated the layout.
    pub fn clamp_to_layout(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
        let count = self.feed.sections().len();
        if count > 0 && self.selected_section >= count {
            self.selected_section = count - 1;
        }
    }

    // ------------------------------------------------------------------------
    // Status bar and styling
    // ------------------------------------------------------------------------

    /// Resolve a theme role to its style.
    pub fn style(&self, role: &str) -> Style {
        self.theme.resolve(role)
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear the status message once it is older than 3 seconds. Returns true
    /// if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}
