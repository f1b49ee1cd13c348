//! Layout and view dispatch.

use crate::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{feed, help, status, tree};

pub(super) const MIN_WIDTH: u16 = 40;
pub(super) const MIN_HEIGHT: u16 = 8;

const TITLE: &str = "// THE INFINITE BITCOIN TEXT";

pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_title(f, app, chunks[0]);
    render_main(f, app, chunks[1]);
    status::render(f, app, chunks[2]);

    if app.show_help {
        help::render(f, app);
    }
}

fn render_title(f: &mut Frame, app: &App, area: Rect) {
    let title = Line::from(Span::styled(TITLE, app.style("title")));
    f.render_widget(Paragraph::new(title), area);
}

/// Feed on the left; the selected section's concept tree on the right when open.
fn render_main(f: &mut Frame, app: &mut App, area: Rect) {
    if app.visible_tree().is_none() {
        feed::render(f, app, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    feed::render(f, app, columns[0]);
    tree::render(f, app, columns[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::generation::{parse_concept_tree, GenerationClient};
    use ratatui::{backend::TestBackend, Terminal};

    fn test_app() -> App {
        let client = GenerationClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        App::new(Config::default(), client)
    }

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_render_records_layout() {
        let mut app = test_app();
        app.feed.append("UTXO model", "Coins.\n\nOutputs.");
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();

        terminal.draw(|f| render(f, &mut app)).unwrap();

        assert_eq!(app.layout.viewport_height, 20);
        assert_eq!(app.layout.section_starts, vec![0]);
        let text = screen(&terminal);
        assert!(text.contains("THE INFINITE BITCOIN TEXT"));
        assert!(text.contains("// UTXO MODEL"));
    }

    #[test]
    fn test_render_tree_panel_when_open() {
        let mut app = test_app();
        app.feed.append("Mining", "Work.");
        let id = app.feed.sections()[0].id.clone();
        let fetch = app.trees.load(&id, "Mining");
        let raw = r#"[{"label": "Mining"}, {"label": "Hash Rate", "parent": "Mining"}]"#;
        app.trees
            .finish_load(&id, fetch.generation, Ok(parse_concept_tree(raw, "Mining")));
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();

        terminal.draw(|f| render(f, &mut app)).unwrap();

        assert!(screen(&terminal).contains("Hash Rate"));
    }

    #[test]
    fn test_tiny_terminal_message() {
        let mut app = test_app();
        let mut terminal = Terminal::new(TestBackend::new(30, 5)).unwrap();
        terminal.draw(|f| render(f, &mut app)).unwrap();
        assert!(screen(&terminal).contains("Terminal too small"));
    }
}
