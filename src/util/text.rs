use std::borrow::Cow;

/// Where the scanner is relative to an escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    Outside,
    /// Just saw ESC
    Introducer,
    /// Inside a CSI sequence, waiting for its final byte
    Csi,
    /// Inside an OSC string, waiting for BEL or ST
    Osc,
    /// ESC inside an OSC string, possibly the start of ST
    OscEscape,
}

/// Remove terminal control characters and escape sequences from feed text.
///
/// Feed names, titles and descriptions come from remote servers and are
/// printed straight to the terminal by `browse`, `feeds`, `following` and
/// `agg`. Tab, newline and carriage return survive. CSI (`ESC [`, U+009B)
/// and OSC (`ESC ]`, U+009D) sequences are dropped whole; every other C0/C1
/// control character and DEL is dropped on its own.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut state = Escape::Outside;

    for c in s.chars() {
        state = match state {
            Escape::Outside => outside(c, &mut out),
            Escape::Introducer => match c {
                '[' => Escape::Csi,
                ']' => Escape::Osc,
                _ => outside(c, &mut out),
            },
            Escape::Csi if ('\x40'..='\x7e').contains(&c) => Escape::Outside,
            Escape::Csi => Escape::Csi,
            Escape::Osc | Escape::OscEscape if c == '\x07' || c == '\u{9c}' => Escape::Outside,
            Escape::OscEscape if c == '\\' => Escape::Outside,
            Escape::Osc | Escape::OscEscape if c == '\x1b' => Escape::OscEscape,
            Escape::Osc | Escape::OscEscape => Escape::Osc,
        };
    }

    Cow::Owned(out)
}

fn outside(c: char, out: &mut String) -> Escape {
    match c {
        '\x1b' => Escape::Introducer,
        '\u{9b}' => Escape::Csi,
        '\u{9d}' => Escape::Osc,
        c if is_stripped(c) => Escape::Outside,
        c => {
            out.push(c);
            Escape::Outside
        }
    }
}

fn is_stripped(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r')
}
