//! Minimal tag pattern matcher for the supported HTML subset.
//!
//! Only literal, ASCII case-insensitive bracket matching is performed:
//! an opening tag is `<name` followed by any run of characters other than `>`
//! and then `>`; a closing tag is the literal `</name>`. Element content is
//! everything between an opening tag and the first closing tag after it.
//! Note that the prefix rule means `<p` also matches `<pre>` and `<head`
//! matches `<header>`, exactly as a `<name[^>]*>` pattern would.

/// Characters removed by [`trim`]: space, tab, LF, CR, NUL and vertical tab
const TRIM_CHARS: [char; 6] = [' ', '\t', '\n', '\r', '\0', '\x0B'];

/// Trim the ASCII whitespace set used by the text encoder
pub fn trim(text: &str) -> &str {
    text.trim_matches(&TRIM_CHARS[..])
}

/// Byte span of a matched opening tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpan {
    pub start: usize,
    pub end: usize,
}

/// Case-insensitive view over a document for tag searches
pub struct TagScanner<'a> {
    source: &'a str,
    lowered: Vec<u8>,
}

impl<'a> TagScanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            lowered: source.as_bytes().to_ascii_lowercase(),
        }
    }

    fn find_from(&self, needle: &[u8], from: usize) -> Option<usize> {
        if from > self.lowered.len() || needle.is_empty() {
            return None;
        }
        self.lowered[from..]
            .windows(needle.len())
            .position(|window| window == needle)
            .map(|pos| pos + from)
    }

    /// Opening tag `<name ...>` starting exactly at `at`
    fn open_tag_at(&self, name: &str, at: usize) -> Option<TagSpan> {
        let prefix_len = name.len() + 1;
        let prefix = self.lowered.get(at..at + prefix_len)?;
        if prefix[0] != b'<' || &prefix[1..] != name.as_bytes() {
            return None;
        }
        let close = self.find_from(b">", at + prefix_len)?;
        Some(TagSpan {
            start: at,
            end: close + 1,
        })
    }

    /// First opening tag `<name ...>` at or after `from`
    pub fn find_open(&self, name: &str, from: usize) -> Option<TagSpan> {
        let needle = format!("<{}", name);
        let mut pos = from;
        while let Some(at) = self.find_from(needle.as_bytes(), pos) {
            if let Some(span) = self.open_tag_at(name, at) {
                return Some(span);
            }
            pos = at + 1;
        }
        None
    }

    /// Whether a literal closing tag `</name>` appears anywhere
    pub fn has_close(&self, name: &str) -> bool {
        self.find_from(format!("</{}>", name).as_bytes(), 0).is_some()
    }

    /// Whether an opening tag `<name ...>` appears anywhere
    pub fn has_open(&self, name: &str) -> bool {
        self.find_open(name, 0).is_some()
    }

    /// Content of the first `<name ...>...</name>` element at or after `from`
    ///
    /// Returns the content and the offset just past the closing tag.
    fn element_from(&self, name: &str, from: usize) -> Option<(&'a str, usize)> {
        let needle = format!("<{}", name);
        let closing = format!("</{}>", name);
        let mut pos = from;

        while let Some(at) = self.find_from(needle.as_bytes(), pos) {
            if let Some(open) = self.open_tag_at(name, at) {
                if let Some(close) = self.find_from(closing.as_bytes(), open.end) {
                    return Some((&self.source[open.end..close], close + closing.len()));
                }
            }
            // No complete element starts here; retry one byte further
            pos = at + 1;
        }
        None
    }

    /// Content of the first complete `<name>...</name>` element
    pub fn first_element(&self, name: &str) -> Option<&'a str> {
        self.element_from(name, 0).map(|(content, _)| content)
    }

    /// Contents of every non-overlapping `<name>...</name>` element, in document order
    pub fn all_elements(&self, name: &str) -> Vec<&'a str> {
        let mut contents = Vec::new();
        let mut pos = 0;
        while let Some((content, next)) = self.element_from(name, pos) {
            contents.push(content);
            pos = next;
        }
        contents
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StripState {
    Text,
    Tag { quote: Option<char>, depth: usize },
    Comment,
}

/// Remove markup from a text fragment
///
/// A `<` followed by whitespace is kept as text and a quoted `>` does not
/// close its tag. Comments are dropped whole; an unterminated tag drops the
/// rest of the text.
pub fn strip_tags(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut state = StripState::Text;

    for (i, c) in text.char_indices() {
        let rest = &text[i + c.len_utf8()..];
        state = match (state, c) {
            (StripState::Text, '<') => {
                if rest.starts_with(|n: char| n.is_ascii_whitespace()) {
                    output.push(c);
                    StripState::Text
                } else if rest.starts_with("!--") {
                    StripState::Comment
                } else {
                    StripState::Tag {
                        quote: None,
                        depth: 0,
                    }
                }
            }
            (StripState::Text, _) => {
                output.push(c);
                StripState::Text
            }
            (StripState::Tag { quote: Some(q), depth }, _) => StripState::Tag {
                quote: if c == q { None } else { Some(q) },
                depth,
            },
            (StripState::Tag { quote: None, depth }, '"' | '\'') => StripState::Tag {
                quote: Some(c),
                depth,
            },
            (StripState::Tag { quote: None, depth }, '<') => StripState::Tag {
                quote: None,
                depth: depth + 1,
            },
            (StripState::Tag { quote: None, depth: 0 }, '>') => StripState::Text,
            (StripState::Tag { quote: None, depth }, '>') => StripState::Tag {
                quote: None,
                depth: depth - 1,
            },
            (tag @ StripState::Tag { .. }, _) => tag,
            (StripState::Comment, '>') if text[..i].ends_with("--") => StripState::Text,
            (StripState::Comment, _) => StripState::Comment,
        };
    }
    output
}
