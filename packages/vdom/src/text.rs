use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A text leaf, either raw or already escaped markup
#[derive(Debug, Clone)]
pub enum Text {
    /// Plain text, escaped when emitted as markup
    Raw(String),

    /// Pre-escaped markup, emitted verbatim
    Safe(String),
}

impl Text {
    pub fn raw(text: impl Into<String>) -> Self {
        Text::Raw(text.into())
    }

    pub fn safe(markup: impl Into<String>) -> Self {
        Text::Safe(markup.into())
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Text::Safe(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Text::Raw(text) | Text::Safe(text) => text.is_empty(),
        }
    }

    /// The stored string, without escaping
    pub fn as_str(&self) -> &str {
        match self {
            Text::Raw(text) | Text::Safe(text) => text,
        }
    }

    /// Escaped markup for this text
    pub fn markup(&self) -> Cow<'_, str> {
        match self {
            Text::Raw(text) => html_escape::encode_text(text),
            Text::Safe(markup) => Cow::Borrowed(markup),
        }
    }

    /// Append `other`, keeping the run raw only while both sides are raw
    pub fn push(&mut self, other: &Text) {
        match (&mut *self, other) {
            (Text::Raw(text), Text::Raw(next)) => text.push_str(next),
            (Text::Safe(markup), next) => markup.push_str(&next.markup()),
            (Text::Raw(_), Text::Safe(_)) => {
                let mut markup = self.markup().into_owned();
                markup.push_str(other.as_str());
                *self = Text::Safe(markup);
            }
        }
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Text::Raw(a), Text::Raw(b)) | (Text::Safe(a), Text::Safe(b)) => a == b,
            _ => self.markup() == other.markup(),
        }
    }
}

impl Eq for Text {}

impl Hash for Text {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.markup().hash(state);
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.markup())
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Text::Raw(text.to_string())
    }
}

impl From<String> for Text {
    fn from(text: String) -> Self {
        Text::Raw(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_runs_stay_raw() {
        let mut text = Text::raw("a");
        text.push(&Text::raw("<b>"));
        assert_eq!(text, Text::Raw("a<b>".to_string()));
    }

    #[test]
    fn test_safe_part_escapes_the_run() {
        let mut text = Text::raw("1 < 2 ");
        text.push(&Text::safe("<em>yes</em>"));
        text.push(&Text::raw(" & more"));
        assert_eq!(
            text,
            Text::Safe("1 &lt; 2 <em>yes</em> &amp; more".to_string())
        );
    }

    #[test]
    fn test_equality_across_kinds() {
        assert_eq!(Text::raw("a & b"), Text::safe("a &amp; b"));
        assert_ne!(Text::raw("a & b"), Text::safe("a & b"));
    }
}
