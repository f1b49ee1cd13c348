//! Utility functions shared by the client, the UI and the proxy.
//!
//! - **Text**: Unicode-aware width, truncation, word wrap and control
//!   character stripping for generated prose
//! - **URLs**: validation of the configured generation API base URL
//!
//! # Examples
//!
//! ```
//! use bitscroll::util::{display_width, wrap_to_width};
//!
//! let lines = wrap_to_width("Don't trust, verify.", 10);
//! assert!(lines.iter().all(|l| display_width(l) <= 10));
//! ```

mod text;
mod url_validator;

pub use text::{display_width, strip_control_chars, truncate_to_width, wrap_to_width};
pub use url_validator::{validate_base_url, UrlValidationError};
