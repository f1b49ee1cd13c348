//! Colors for the feed, the concept tree and the chrome around them.
//!
//! Widgets ask for a role name ("divider", "tree_selected", ...) and get a
//! ratatui `Style` from the active palette. Dark and light palettes share the
//! Bitcoin orange accent.

use ratatui::style::{Color, Modifier, Style};
use std::collections::HashMap;

const BITCOIN_ORANGE: Color = Color::Rgb(247, 147, 26);

// ============================================================================
// Theme Variant
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeVariant {
    Dark,
    Light,
}

impl ThemeVariant {
    /// Parse a variant name (case-insensitive).
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    pub fn palette(self) -> ColorPalette {
        match self {
            Self::Dark => ColorPalette::dark(),
            Self::Light => ColorPalette::light(),
        }
    }
}

// ============================================================================
// Color Palette
// ============================================================================

/// Every semantic UI role mapped to a `Style`.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    // -- Feed --
    pub title: Style,
    pub divider: Style,
    pub divider_selected: Style,
    pub body: Style,
    pub loading: Style,
    pub error: Style,
    pub hint: Style,

    // -- Concept tree --
    pub tree_root: Style,
    pub tree_node: Style,
    pub tree_selected: Style,
    pub tree_summary: Style,

    // -- Chrome --
    pub status_bar: Style,
    pub panel_border: Style,
    pub panel_border_focused: Style,
    pub help_key: Style,
}

impl ColorPalette {
    fn dark() -> Self {
        Self {
            title: Style::default()
                .fg(BITCOIN_ORANGE)
                .add_modifier(Modifier::BOLD),
            divider: Style::default().fg(Color::DarkGray),
            divider_selected: Style::default()
                .fg(BITCOIN_ORANGE)
                .add_modifier(Modifier::BOLD),
            body: Style::default().fg(Color::Gray),
            loading: Style::default().fg(Color::Green),
            error: Style::default().fg(Color::Red),
            hint: Style::default().fg(Color::DarkGray),

            tree_root: Style::default()
                .fg(BITCOIN_ORANGE)
                .add_modifier(Modifier::BOLD),
            tree_node: Style::default(),
            tree_selected: Style::default().bg(Color::DarkGray).fg(Color::White),
            tree_summary: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),

            status_bar: Style::default().bg(Color::DarkGray).fg(Color::White),
            panel_border: Style::default().fg(Color::DarkGray),
            panel_border_focused: Style::default().fg(BITCOIN_ORANGE),
            help_key: Style::default().fg(Color::Yellow),
        }
    }

    fn light() -> Self {
        Self {
            title: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            divider: Style::default().fg(Color::DarkGray),
            divider_selected: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            body: Style::default().fg(Color::Black),
            loading: Style::default().fg(Color::Blue),
            error: Style::default().fg(Color::Red),
            hint: Style::default().fg(Color::DarkGray),

            tree_root: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD),
            tree_node: Style::default().fg(Color::Black),
            tree_selected: Style::default().bg(Color::Blue).fg(Color::White),
            tree_summary: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),

            status_bar: Style::default().bg(Color::White).fg(Color::Black),
            panel_border: Style::default().fg(Color::DarkGray),
            panel_border_focused: Style::default().fg(Color::Blue),
            help_key: Style::default().fg(Color::Magenta),
        }
    }
}

// ============================================================================
// Style Map
// ============================================================================

/// String-keyed style lookup, so render code names roles rather than
/// palette fields.
#[derive(Debug, Clone)]
pub struct StyleMap {
    map: HashMap<&'static str, Style>,
}

/// All semantic role names, in declaration order.
const ROLE_NAMES: [&str; 15] = [
    "title",
    "divider",
    "divider_selected",
    "body",
    "loading",
    "error",
    "hint",
    "tree_root",
    "tree_node",
    "tree_selected",
    "tree_summary",
    "status_bar",
    "panel_border",
    "panel_border_focused",
    "help_key",
];

impl StyleMap {
    pub fn from_palette(p: &ColorPalette) -> Self {
        let styles: [Style; 15] = [
            p.title,
            p.divider,
            p.divider_selected,
            p.body,
            p.loading,
            p.error,
            p.hint,
            p.tree_root,
            p.tree_node,
            p.tree_selected,
            p.tree_summary,
            p.status_bar,
            p.panel_border,
            p.panel_border_focused,
            p.help_key,
        ];

        let map = ROLE_NAMES
            .iter()
            .copied()
            .zip(styles.iter().copied())
            .collect();

        Self { map }
    }

    /// Style map for a variant name, falling back to Dark for unknown names.
    pub fn for_name(name: &str) -> Self {
        let variant = ThemeVariant::from_str_name(name).unwrap_or_else(|| {
            tracing::warn!(theme = %name, "Unknown theme, using dark");
            ThemeVariant::Dark
        });
        Self::from_palette(&variant.palette())
    }

    /// Resolve a role name. Returns `Style::default()` for unknown roles.
    pub fn resolve(&self, role: &str) -> Style {
        self.map.get(role).copied().unwrap_or_default()
    }
}

impl Default for StyleMap {
    fn default() -> Self {
        Self::from_palette(&ThemeVariant::Dark.palette())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_from_str_name() {
        assert_eq!(ThemeVariant::from_str_name("Dark"), Some(ThemeVariant::Dark));
        assert_eq!(ThemeVariant::from_str_name("LIGHT"), Some(ThemeVariant::Light));
        assert_eq!(ThemeVariant::from_str_name("neon"), None);
    }

    #[test]
    fn style_map_resolves_known_roles() {
        let palette = ThemeVariant::Dark.palette();
        let sm = StyleMap::from_palette(&palette);
        assert_eq!(sm.resolve("divider_selected"), palette.divider_selected);
        assert_eq!(sm.resolve("status_bar"), palette.status_bar);
    }

    #[test]
    fn style_map_returns_default_for_unknown() {
        assert_eq!(StyleMap::default().resolve("nonexistent_role"), Style::default());
    }

    #[test]
    fn unknown_theme_name_falls_back_to_dark() {
        let sm = StyleMap::for_name("solarized");
        assert_eq!(sm.resolve("title"), ThemeVariant::Dark.palette().title);
    }

    #[test]
    fn role_names_count_matches_palette_fields() {
        let sm = StyleMap::default();
        assert_eq!(sm.map.len(), ROLE_NAMES.len());
    }

    #[test]
    fn light_palette_differs_from_dark() {
        let dark = ThemeVariant::Dark.palette();
        let light = ThemeVariant::Light.palette();
        assert_ne!(dark.tree_selected, light.tree_selected);
        assert_ne!(dark.body, light.body);
    }
}
