/// Returns true for every character that terminates a line.
///
/// Besides `\n` and `\r` this covers the vertical tab, form feed, the ASCII
/// file/group/record separators, NEL and the Unicode line and paragraph
/// separators. `\r\n` is handled as a single boundary by [`split_lines`].
#[inline]
pub fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Iterator over the lines of a text, without their terminators
pub struct Lines<'a> {
    rest: &'a str,
}

/// Split text into lines
///
/// The format is:
/// ```text
/// line<boundary>line<boundary>...line[<boundary>]
/// ```
///
/// A final boundary does not produce a trailing empty line, and empty text
/// yields no lines at all.
pub fn split_lines(text: &str) -> Lines<'_> {
    Lines { rest: text }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        match self.rest.char_indices().find(|&(_, c)| is_line_boundary(c)) {
            Some((pos, c)) => {
                let line = &self.rest[..pos];
                let mut skip = c.len_utf8();
                if c == '\r' && self.rest[pos + 1..].starts_with('\n') {
                    skip += 1;
                }
                self.rest = &self.rest[pos + skip..];
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = "";
                Some(line)
            }
        }
    }
}

/// True when the text ends with a line boundary
pub fn ends_with_line_break(text: &str) -> bool {
    text.chars().next_back().is_some_and(is_line_boundary)
}
