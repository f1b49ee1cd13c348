//! Feed panel: the endless column of generated sections.

use crate::app::{App, FeedLayout, Focus};
use crate::controller::LoadingState;
use crate::util::{truncate_to_width, wrap_to_width};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub(super) fn spinner(frame: usize) -> &'static str {
    SPINNER[frame % SPINNER.len()]
}

/// Lines for the whole feed at `width` columns, plus the row index of each
/// section divider.
pub(super) fn build_lines(app: &App, width: usize) -> (Vec<Line<'static>>, Vec<usize>) {
    let width = width.max(1);
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut starts = Vec::with_capacity(app.feed.sections().len());

    for (i, section) in app.feed.sections().iter().enumerate() {
        starts.push(lines.len());

        let (marker, style) = if i == app.selected_section {
            ("> ", app.style("divider_selected"))
        } else {
            ("", app.style("divider"))
        };
        let tree_mark = if app.trees.is_expanded(&section.id) {
            "  [tree]"
        } else {
            ""
        };
        let divider = format!("{}// {}{}", marker, section.topic.to_uppercase(), tree_mark);
        for row in wrap_to_width(&divider, width) {
            lines.push(Line::styled(row, style));
        }
        lines.push(Line::default());

        for paragraph in section.paragraphs() {
            push_wrapped(&mut lines, paragraph, width, app.style("body"));
            lines.push(Line::default());
        }
    }

    match app.feed.state() {
        LoadingState::Loading => {
            // Kept on one line: the bracketed art in the messages relies on its spacing
            let text = format!("{} {}", spinner(app.spinner_frame), app.feed.loading_message());
            lines.push(Line::styled(
                truncate_to_width(&text, width).into_owned(),
                app.style("loading"),
            ));
        }
        LoadingState::Error => {
            push_wrapped(&mut lines, "Connection interrupted.", width, app.style("error"));
            if let Some(detail) = app.feed.last_error() {
                if detail != "Connection interrupted." {
                    push_wrapped(&mut lines, detail, width, app.style("error"));
                }
            }
            push_wrapped(&mut lines, "Press r to retry.", width, app.style("hint"));
        }
        LoadingState::Idle => {
            if app.feed.sections().is_empty() {
                push_wrapped(&mut lines, "Press m to begin.", width, app.style("hint"));
            }
        }
    }

    (lines, starts)
}

fn push_wrapped(lines: &mut Vec<Line<'static>>, text: &str, width: usize, style: Style) {
    for row in wrap_to_width(text, width) {
        lines.push(Line::from(Span::styled(row, style)));
    }
}

/// Render the feed and record its geometry on the app.
pub(super) fn render(f: &mut Frame, app: &mut App, area: Rect) {
    if area.width < 3 || area.height < 3 {
        return;
    }

    let border_style = if app.focus == Focus::Feed {
        app.style("panel_border_focused")
    } else {
        app.style("panel_border")
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);

    let (lines, section_starts) = build_lines(app, inner.width as usize);
    app.layout = FeedLayout {
        total_lines: lines.len(),
        viewport_height: inner.height as usize,
        section_starts,
    };
    app.clamp_to_layout();

    let visible: Vec<Line> = lines
        .into_iter()
        .skip(app.scroll_offset)
        .take(inner.height as usize)
        .collect();

    f.render_widget(Paragraph::new(visible).block(block), area);
}
