//! bitscroll: an endless terminal feed of generated Bitcoin prose.
//!
//! The TUI asks a chat-completion backend (through [`proxy`]) for one short
//! section at a time and keeps appending sections as the reader scrolls.
//! Each section can open a small concept tree whose nodes turn into new
//! sections on demand.

pub mod app;
pub mod config;
pub mod controller;
pub mod generation;
pub mod keybindings;
pub mod proxy;
pub mod tasks;
pub mod theme;
pub mod ui;
pub mod util;
