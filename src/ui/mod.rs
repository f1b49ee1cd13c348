//! Terminal User Interface.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input dispatch through the keybinding registry
//! - `render` - Layout and view dispatch
//! - `feed` - Feed panel: section dividers, wrapped paragraphs, loading footer
//! - `tree` - Concept tree panel for the selected section
//! - `status` - Status bar widget
//! - `help` - Keybinding overlay

mod feed;
mod help;
mod input;
mod loop_runner;
mod render;
mod status;
mod tree;

pub use loop_runner::{run, Action};
