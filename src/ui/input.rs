//! Keyboard input dispatch.
//!
//! Keys are resolved to actions through the keybinding registry, using the
//! context implied by the help overlay and the focused panel.

use crate::app::{App, AppEvent, Focus};
use crate::controller::LoadingState;
use crate::keybindings::{Action as KbAction, Context as KbContext};
use crossterm::event::{KeyCode, KeyModifiers};
use tokio::sync::mpsc;

use super::Action;

fn current_context(app: &App) -> KbContext {
    if app.show_help {
        KbContext::Help
    } else if app.focus == Focus::Tree && app.visible_tree().is_some() {
        KbContext::Tree
    } else {
        KbContext::Global
    }
}

pub(super) fn handle_input(
    app: &mut App,
    code: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Action {
    let context = current_context(app);
    let Some(action) = app.keybindings.action_for_key(code, modifiers, context) else {
        return Action::Continue;
    };
    tracing::trace!(?action, ?context, "Key action");

    match action {
        KbAction::Quit => return Action::Quit,
        KbAction::ShowHelp => app.show_help = true,
        KbAction::CloseHelp => app.show_help = false,

        KbAction::ScrollDown => app.scroll_down(1),
        KbAction::ScrollUp => app.scroll_up(1),
        KbAction::PageDown => app.page_down(),
        KbAction::PageUp => app.page_up(),
        KbAction::Top => app.scroll_to_top(),
        KbAction::Bottom => app.scroll_to_bottom(),
        KbAction::NextSection => app.next_section(),
        KbAction::PrevSection => app.prev_section(),

        KbAction::LoadMore => {
            if !app.request_more(event_tx) {
                app.set_status("Already loading");
            }
        }
        KbAction::RetryFeed => {
            if app.feed.state() == LoadingState::Error {
                app.retry_feed(event_tx);
            } else {
                app.set_status("Nothing to retry");
            }
        }

        KbAction::ToggleTree => app.toggle_tree(event_tx),
        KbAction::SwitchFocus => app.toggle_focus(),
        KbAction::NodeDown => app.select_next_node(),
        KbAction::NodeUp => app.select_prev_node(),
        KbAction::ExpandNode => {
            app.expand_selected_node(event_tx);
        }
        KbAction::ReloadTree => app.reload_tree(event_tx),
    }

    Action::Continue
}
