//! Keybinding registry: maps actions to key events with config overrides.
use crossterm::event::{KeyCode, KeyModifiers};
use std::collections::HashMap;

// ============================================================================
// Action Enum
// ============================================================================

/// All user-facing actions that can be triggered by keybindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Quit,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    Top,
    Bottom,
    NextSection,
    PrevSection,
    ToggleTree,
    SwitchFocus,
    RetryFeed,
    LoadMore,
    ShowHelp,
    CloseHelp,
    NodeDown,
    NodeUp,
    ExpandNode,
    ReloadTree,
}

impl Action {
    /// Human-readable description for the help screen.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Quit => "Quit",
            Self::ScrollDown => "Scroll down one line",
            Self::ScrollUp => "Scroll up one line",
            Self::PageDown => "Page down",
            Self::PageUp => "Page up",
            Self::Top => "Jump to top",
            Self::Bottom => "Jump to bottom",
            Self::NextSection => "Next section",
            Self::PrevSection => "Previous section",
            Self::ToggleTree => "Toggle concept tree for section",
            Self::SwitchFocus => "Switch focus feed/tree",
            Self::RetryFeed => "Retry after a failed load",
            Self::LoadMore => "Load another section",
            Self::ShowHelp => "Show help",
            Self::CloseHelp => "Close help",
            Self::NodeDown => "Select next concept",
            Self::NodeUp => "Select previous concept",
            Self::ExpandNode => "Write a section about the concept",
            Self::ReloadTree => "Regenerate concept tree",
        }
    }
}

// ============================================================================
// Context Enum
// ============================================================================

/// Dispatch context. Determines which bindings are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Global,
    Tree,
    Help,
}

impl Context {
    pub fn label(self) -> &'static str {
        match self {
            Self::Global => "Feed",
            Self::Tree => "Concept tree",
            Self::Help => "Help",
        }
    }
}

// ============================================================================
// Key Specification
// ============================================================================

/// A key event: code + modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    pub const fn ch(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }
}

/// Parse a key string from config into a KeySpec.
///
/// Supported formats:
/// - Single char: "q", "j", "/"
/// - Named keys: "Enter", "Esc", "Tab", "Up", "Down", "PageUp", "PageDown"
/// - Modifier combos: "Ctrl+d", "Ctrl+u"
/// - Function keys: "F1" through "F12"
fn parse_key_string(s: &str) -> Option<KeySpec> {
    let s = s.trim();

    if let Some(rest) = s.strip_prefix("Ctrl+") {
        let mut chars = rest.trim().chars();
        let c = chars.next()?;
        return chars.next().is_none().then(|| KeySpec::ctrl(c));
    }

    match s.to_lowercase().as_str() {
        "enter" | "return" => return Some(KeySpec::plain(KeyCode::Enter)),
        "esc" | "escape" => return Some(KeySpec::plain(KeyCode::Esc)),
        "tab" => return Some(KeySpec::plain(KeyCode::Tab)),
        "up" => return Some(KeySpec::plain(KeyCode::Up)),
        "down" => return Some(KeySpec::plain(KeyCode::Down)),
        "pageup" => return Some(KeySpec::plain(KeyCode::PageUp)),
        "pagedown" => return Some(KeySpec::plain(KeyCode::PageDown)),
        "home" => return Some(KeySpec::plain(KeyCode::Home)),
        "end" => return Some(KeySpec::plain(KeyCode::End)),
        "space" => return Some(KeySpec::ch(' ')),
        _ => {}
    }

    if let Some(n) = s.strip_prefix(['F', 'f']).and_then(|n| n.parse::<u8>().ok()) {
        if (1..=12).contains(&n) {
            return Some(KeySpec::plain(KeyCode::F(n)));
        }
    }

    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then(|| KeySpec::ch(c))
}

/// Format a KeySpec for the help screen.
fn format_key(key: &KeySpec) -> String {
    let modifier = if key.modifiers.contains(KeyModifiers::CONTROL) {
        "Ctrl+"
    } else {
        ""
    };

    let key_name = match key.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Tab => "Tab".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::F(n) => format!("F{}", n),
        _ => "?".to_string(),
    };

    format!("{}{}", modifier, key_name)
}

// ============================================================================
// Keybinding Registry
// ============================================================================

/// Registry of keybindings, supporting default bindings and config overrides.
///
/// The same key can map to different actions in different contexts; lookups
/// fall back to `Global` when the active context has no binding.
pub struct KeybindingRegistry {
    lookup: HashMap<(Context, KeySpec), Action>,
    /// All bindings, in registration order, for the help screen.
    bindings: Vec<(Context, KeySpec, Action)>,
}

impl KeybindingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            lookup: HashMap::new(),
            bindings: Vec::new(),
        };
        registry.register_defaults();
        registry
    }

    fn bind(&mut self, context: Context, key: KeySpec, action: Action) {
        self.lookup.insert((context, key), action);
        self.bindings.push((context, key, action));
    }

    fn register_defaults(&mut self) {
        use Action::*;
        use Context::*;

        let defaults: &[(Context, KeySpec, Action)] = &[
            // === Feed ===
            (Global, KeySpec::ch('q'), Quit),
            (Global, KeySpec::ch('j'), ScrollDown),
            (Global, KeySpec::plain(KeyCode::Down), ScrollDown),
            (Global, KeySpec::ch('k'), ScrollUp),
            (Global, KeySpec::plain(KeyCode::Up), ScrollUp),
            (Global, KeySpec::ctrl('d'), PageDown),
            (Global, KeySpec::plain(KeyCode::PageDown), PageDown),
            (Global, KeySpec::ctrl('u'), PageUp),
            (Global, KeySpec::plain(KeyCode::PageUp), PageUp),
            (Global, KeySpec::ch('g'), Top),
            (Global, KeySpec::ch('G'), Bottom),
            (Global, KeySpec::ch('n'), NextSection),
            (Global, KeySpec::ch('p'), PrevSection),
            (Global, KeySpec::ch('t'), ToggleTree),
            (Global, KeySpec::plain(KeyCode::Tab), SwitchFocus),
            (Global, KeySpec::ch('r'), RetryFeed),
            (Global, KeySpec::ch('m'), LoadMore),
            (Global, KeySpec::ch('?'), ShowHelp),
            // === Concept tree ===
            (Tree, KeySpec::ch('j'), NodeDown),
            (Tree, KeySpec::plain(KeyCode::Down), NodeDown),
            (Tree, KeySpec::ch('k'), NodeUp),
            (Tree, KeySpec::plain(KeyCode::Up), NodeUp),
            (Tree, KeySpec::plain(KeyCode::Enter), ExpandNode),
            (Tree, KeySpec::ch('r'), ReloadTree),
            // === Help overlay ===
            (Help, KeySpec::plain(KeyCode::Esc), CloseHelp),
            (Help, KeySpec::ch('?'), CloseHelp),
            (Help, KeySpec::ch('q'), CloseHelp),
        ];

        for &(context, key, action) in defaults {
            self.bind(context, key, action);
        }
    }

    /// Apply user overrides from the config `[keybindings]` table.
    ///
    /// Keys in the map are action names (e.g., "quit", "load_more").
    /// Values are key strings (e.g., "q", "Ctrl+d", "F5"). An override
    /// replaces every default key for the action, in the same contexts.
    ///
    /// Returns a warning per unrecognized action name or unparseable key.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> Vec<String> {
        let mut warnings = Vec::new();

        for (action_name, key_str) in overrides {
            let Some(action) = parse_action_name(action_name) else {
                warnings.push(format!("Unknown action '{}', ignoring", action_name));
                continue;
            };

            let Some(key) = parse_key_string(key_str) else {
                warnings.push(format!(
                    "Cannot parse key '{}' for action '{}', ignoring",
                    key_str, action_name
                ));
                continue;
            };

            let mut contexts: Vec<Context> = self
                .bindings
                .iter()
                .filter(|(_, _, a)| *a == action)
                .map(|(c, _, _)| *c)
                .collect();
            contexts.dedup();

            self.lookup.retain(|_, a| *a != action);
            self.bindings.retain(|(_, _, a)| *a != action);

            for ctx in contexts {
                self.bind(ctx, key, action);
            }

            tracing::info!(action = %action_name, key = %key_str, "Applied keybinding override");
        }

        warnings
    }

    /// Look up the action for a key in a context, falling back to Global.
    pub fn action_for_key(
        &self,
        code: KeyCode,
        modifiers: KeyModifiers,
        context: Context,
    ) -> Option<Action> {
        // Shifted letters arrive as uppercase chars with SHIFT set
        let modifiers = match code {
            KeyCode::Char(_) => modifiers - KeyModifiers::SHIFT,
            _ => modifiers,
        };
        let key = KeySpec::new(code, modifiers);

        if let Some(&action) = self.lookup.get(&(context, key)) {
            return Some(action);
        }
        if context == Context::Help {
            return None;
        }
        if context != Context::Global {
            return self.lookup.get(&(Context::Global, key)).copied();
        }
        None
    }

    /// (context, key display string, description) for the help screen.
    pub fn all_bindings(&self) -> Vec<(Context, String, &'static str)> {
        self.bindings
            .iter()
            .map(|(ctx, key, action)| (*ctx, format_key(key), action.describe()))
            .collect()
    }
}

impl Default for KeybindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_action_name(name: &str) -> Option<Action> {
    match name.to_lowercase().as_str() {
        "quit" => Some(Action::Quit),
        "scroll_down" | "down" => Some(Action::ScrollDown),
        "scroll_up" | "up" => Some(Action::ScrollUp),
        "page_down" | "pagedown" => Some(Action::PageDown),
        "page_up" | "pageup" => Some(Action::PageUp),
        "top" => Some(Action::Top),
        "bottom" => Some(Action::Bottom),
        "next_section" => Some(Action::NextSection),
        "prev_section" => Some(Action::PrevSection),
        "toggle_tree" | "tree" => Some(Action::ToggleTree),
        "switch_focus" | "focus" => Some(Action::SwitchFocus),
        "retry" | "retry_feed" => Some(Action::RetryFeed),
        "load_more" | "more" => Some(Action::LoadMore),
        "show_help" | "help" => Some(Action::ShowHelp),
        "close_help" => Some(Action::CloseHelp),
        "node_down" => Some(Action::NodeDown),
        "node_up" => Some(Action::NodeUp),
        "expand_node" | "expand" => Some(Action::ExpandNode),
        "reload_tree" => Some(Action::ReloadTree),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(reg: &KeybindingRegistry, c: char, ctx: Context) -> Option<Action> {
        reg.action_for_key(KeyCode::Char(c), KeyModifiers::NONE, ctx)
    }

    #[test]
    fn test_default_feed_keys() {
        let reg = KeybindingRegistry::new();
        assert_eq!(plain(&reg, 'q', Context::Global), Some(Action::Quit));
        assert_eq!(plain(&reg, 'j', Context::Global), Some(Action::ScrollDown));
        assert_eq!(plain(&reg, 'm', Context::Global), Some(Action::LoadMore));
        assert_eq!(plain(&reg, 'r', Context::Global), Some(Action::RetryFeed));
        assert_eq!(plain(&reg, 't', Context::Global), Some(Action::ToggleTree));
    }

    #[test]
    fn test_tree_context_overrides_global() {
        let reg = KeybindingRegistry::new();
        assert_eq!(plain(&reg, 'j', Context::Tree), Some(Action::NodeDown));
        assert_eq!(plain(&reg, 'r', Context::Tree), Some(Action::ReloadTree));
        assert_eq!(
            reg.action_for_key(KeyCode::Enter, KeyModifiers::NONE, Context::Tree),
            Some(Action::ExpandNode)
        );
    }

    #[test]
    fn test_tree_falls_back_to_global() {
        let reg = KeybindingRegistry::new();
        assert_eq!(plain(&reg, 'q', Context::Tree), Some(Action::Quit));
        assert_eq!(plain(&reg, 'm', Context::Tree), Some(Action::LoadMore));
    }

    #[test]
    fn test_help_context_does_not_fall_back() {
        let reg = KeybindingRegistry::new();
        assert_eq!(plain(&reg, 'q', Context::Help), Some(Action::CloseHelp));
        assert_eq!(plain(&reg, 'm', Context::Help), None);
    }

    #[test]
    fn test_shifted_letter_matches() {
        let reg = KeybindingRegistry::new();
        assert_eq!(
            reg.action_for_key(KeyCode::Char('G'), KeyModifiers::SHIFT, Context::Global),
            Some(Action::Bottom)
        );
    }

    #[test]
    fn test_ctrl_modifiers() {
        let reg = KeybindingRegistry::new();
        assert_eq!(
            reg.action_for_key(KeyCode::Char('d'), KeyModifiers::CONTROL, Context::Global),
            Some(Action::PageDown)
        );
        assert_eq!(
            reg.action_for_key(KeyCode::Char('u'), KeyModifiers::CONTROL, Context::Tree),
            Some(Action::PageUp)
        );
    }

    #[test]
    fn test_unknown_key_returns_none() {
        let reg = KeybindingRegistry::new();
        assert_eq!(
            reg.action_for_key(KeyCode::F(12), KeyModifiers::NONE, Context::Global),
            None
        );
    }

    #[test]
    fn test_apply_overrides_valid() {
        let mut reg = KeybindingRegistry::new();
        let overrides = HashMap::from([("more".to_string(), "Space".to_string())]);

        assert!(reg.apply_overrides(&overrides).is_empty());
        assert_eq!(plain(&reg, 'm', Context::Global), None);
        assert_eq!(plain(&reg, ' ', Context::Global), Some(Action::LoadMore));
    }

    #[test]
    fn test_override_keeps_contexts() {
        let mut reg = KeybindingRegistry::new();
        let overrides = HashMap::from([("node_down".to_string(), "J".to_string())]);
        reg.apply_overrides(&overrides);

        assert_eq!(plain(&reg, 'J', Context::Tree), Some(Action::NodeDown));
        // j in tree context now falls through to the feed binding
        assert_eq!(plain(&reg, 'j', Context::Tree), Some(Action::ScrollDown));
    }

    #[test]
    fn test_apply_overrides_warnings() {
        let mut reg = KeybindingRegistry::new();
        let overrides = HashMap::from([
            ("nonexistent_action".to_string(), "q".to_string()),
            ("quit".to_string(), "Ctrl+Alt+Q".to_string()),
        ]);

        let mut warnings = reg.apply_overrides(&overrides);
        warnings.sort();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("Cannot parse key"));
        assert!(warnings[1].contains("Unknown action"));
    }

    #[test]
    fn test_parse_key_string() {
        assert_eq!(parse_key_string("Enter"), Some(KeySpec::plain(KeyCode::Enter)));
        assert_eq!(parse_key_string("ctrl+d"), None);
        assert_eq!(parse_key_string("Ctrl+d"), Some(KeySpec::ctrl('d')));
        assert_eq!(parse_key_string("F5"), Some(KeySpec::plain(KeyCode::F(5))));
        assert_eq!(parse_key_string("F13"), None);
        assert_eq!(parse_key_string("f"), Some(KeySpec::ch('f')));
        assert_eq!(parse_key_string("qq"), None);
    }

    #[test]
    fn test_format_key_display() {
        assert_eq!(format_key(&KeySpec::ch('q')), "q");
        assert_eq!(format_key(&KeySpec::ctrl('d')), "Ctrl+d");
        assert_eq!(format_key(&KeySpec::plain(KeyCode::Tab)), "Tab");
    }

    #[test]
    fn test_every_action_reachable_by_default() {
        let reg = KeybindingRegistry::new();
        let described: Vec<&str> = reg.all_bindings().iter().map(|(_, _, d)| *d).collect();
        for action in [Action::ExpandNode, Action::ReloadTree, Action::CloseHelp, Action::Bottom] {
            assert!(described.contains(&action.describe()));
        }
    }
}
