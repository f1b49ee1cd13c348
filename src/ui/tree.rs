//! Concept tree panel for the selected section.

use crate::app::{App, Focus};
use crate::controller::TreeState;
use crate::util::{truncate_to_width, wrap_to_width};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::feed::spinner;

pub(super) fn build_lines(app: &App, state: &TreeState, topic: &str, width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines: Vec<Line<'static>> = Vec::new();
    let spin = spinner(app.spinner_frame);

    if state.loading {
        let text = if state.nodes.is_empty() {
            format!("{} Mapping concepts...", spin)
        } else {
            format!("{} Regenerating...", spin)
        };
        lines.push(Line::styled(text, app.style("loading")));
    }
    if let Some(error) = &state.error {
        for row in wrap_to_width(error, width) {
            lines.push(Line::styled(row, app.style("error")));
        }
    }
    if state.nodes.is_empty() {
        return lines;
    }

    let selected = state.selected_node_id.as_deref();
    for row in state.rows(topic) {
        let is_selected = selected == Some(row.node.id.as_str());
        let marker = if is_selected { "> " } else { "  " };
        let indent = "  ".repeat(row.depth);
        let text = format!("{}{}{}", marker, indent, row.node.label);
        let style = if is_selected {
            app.style("tree_selected")
        } else if row.depth == 0 {
            app.style("tree_root")
        } else {
            app.style("tree_node")
        };
        lines.push(Line::styled(truncate_to_width(&text, width).into_owned(), style));
    }

    if let Some(node) = state.selected_node() {
        if !node.summary.is_empty() {
            lines.push(Line::default());
            for row in wrap_to_width(&node.summary, width) {
                lines.push(Line::styled(row, app.style("tree_summary")));
            }
        }
    }

    lines.push(Line::default());
    if state.action_loading {
        lines.push(Line::styled(
            format!("{} Writing a new section...", spin),
            app.style("loading"),
        ));
    } else if let Some(error) = &state.action_error {
        for row in wrap_to_width(error, width) {
            lines.push(Line::styled(row, app.style("error")));
        }
    } else {
        lines.push(Line::from(Span::styled(
            truncate_to_width("Enter: write about this", width).into_owned(),
            app.style("hint"),
        )));
    }

    lines
}

pub(super) fn render(f: &mut Frame, app: &App, area: Rect) {
    let Some((section, state)) = app.visible_tree() else {
        return;
    };
    if area.width < 3 || area.height < 3 {
        return;
    }

    let border_style = if app.focus == Focus::Tree {
        app.style("panel_border_focused")
    } else {
        app.style("panel_border")
    };
    let title = truncate_to_width(&section.topic, area.width.saturating_sub(4) as usize);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" {} ", title));
    let inner = block.inner(area);

    let lines = build_lines(app, state, &section.topic, inner.width as usize);
    f.render_widget(Paragraph::new(lines).block(block), area);
}
