use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string in terminal columns.
///
/// CJK characters and emoji count as two columns, combining marks as zero.
///
/// ```
/// use bitscroll::util::display_width;
///
/// assert_eq!(display_width("sats"), 4);
/// assert_eq!(display_width("比特币"), 6);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Truncates a string to fit within `max_width` columns, appending "..." when
/// anything was cut.
///
/// Returns `Cow::Borrowed` when the string already fits. For widths of three
/// columns or fewer there is no room for an ellipsis, so the longest fitting
/// prefix is returned instead.
///
/// ```
/// use bitscroll::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Proof of Work", 20), "Proof of Work");
/// assert_eq!(truncate_to_width("Proof of Work", 8), "Proof...");
/// assert_eq!(truncate_to_width("Proof of Work", 2), "Pr");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if max_width == 0 {
        return Cow::Borrowed("");
    }
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width <= ELLIPSIS_WIDTH {
        max_width
    } else {
        max_width - ELLIPSIS_WIDTH
    };

    let mut used = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        end = idx + c.len_utf8();
    }

    if max_width <= ELLIPSIS_WIDTH {
        Cow::Owned(s[..end].to_string())
    } else {
        Cow::Owned(format!("{}{}", &s[..end], ELLIPSIS))
    }
}

/// Greedy word wrap to `width` columns.
///
/// Words wider than the whole line are hard-split at character boundaries.
/// Runs of whitespace collapse to a single space. An empty or whitespace-only
/// input yields no lines.
///
/// ```
/// use bitscroll::util::wrap_to_width;
///
/// let lines = wrap_to_width("blocks every ten minutes", 12);
/// assert_eq!(lines, vec!["blocks every", "ten minutes"]);
/// ```
pub fn wrap_to_width(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in text.split_whitespace() {
        let word_width = display_width(word);

        if word_width > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            for c in word.chars() {
                let w = UnicodeWidthChar::width(c).unwrap_or(0);
                if current_width + w > width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(c);
                current_width += w;
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_width
        } else {
            word_width + 1
        };
        if current_width + needed > width {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_width += 1;
        }
        current.push_str(word);
        current_width += word_width;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Strips terminal control characters and ANSI escape sequences.
///
/// Generated text is untrusted: a model can emit escape sequences that would
/// repaint or retitle the terminal. Tab, newline and carriage return survive.
/// CSI (`ESC [`) sequences are removed through their final byte, OSC
/// (`ESC ]`) sequences through BEL or `ESC \`.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let needs_strip = s
        .bytes()
        .any(|b| b == 0x1b || b == 0x7f || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r')));
    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\u{1b}' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    for next in chars.by_ref() {
                        if ('\u{40}'..='\u{7e}').contains(&next) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(next) = chars.next() {
                        if next == '\u{07}' {
                            break;
                        }
                        if next == '\u{1b}' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            },
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {}
            c => out.push(c),
        }
    }

    Cow::Owned(out)
}
