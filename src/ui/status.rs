use crate::app::{App, Focus};
use ratatui::{layout::Rect, widgets::Paragraph, Frame};
use std::borrow::Cow;

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if app.focus == Focus::Tree {
        Cow::Borrowed("[j/k]select [Enter]write section [r]egenerate [t]close [Tab]feed [?]help")
    } else {
        let sections = app.feed.sections().len();
        Cow::Owned(format!(
            "{} section{} | [j/k]scroll [n/p]section [t]ree [m]ore [?]help [q]uit",
            sections,
            if sections == 1 { "" } else { "s" }
        ))
    };

    let paragraph = Paragraph::new(text).style(app.style("status_bar"));
    f.render_widget(paragraph, area);
}
