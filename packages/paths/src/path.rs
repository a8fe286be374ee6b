use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// One step from an element to one of its direct descendants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// The nth child of a host element
    Index(usize),

    /// The sub-element a component produced
    Render,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(index) => write!(f, "{}", index),
            Selector::Render => write!(f, "render"),
        }
    }
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

/// Location of an element in the element tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path {
    segments: Vec<Selector>,
}

impl Path {
    /// Create a path from its segments
    pub fn new(segments: Vec<Selector>) -> Self {
        Self { segments }
    }

    /// The empty path, addressing the root element
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn push(&mut self, selector: Selector) {
        self.segments.push(selector);
    }

    pub fn pop(&mut self) -> Option<Selector> {
        self.segments.pop()
    }

    /// Append a selector to create a child path
    pub fn child(&self, selector: Selector) -> Path {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(selector);
        Path { segments }
    }

    /// All segments except the last
    pub fn parent(&self) -> Option<Path> {
        let (_, init) = self.segments.split_last()?;
        Some(Path {
            segments: init.to_vec(),
        })
    }

    /// True if `prefix` is a (non-strict) prefix of this path
    pub fn starts_with(&self, prefix: &[Selector]) -> bool {
        self.segments.starts_with(prefix)
    }

    /// True if this path lies strictly below `ancestor`
    pub fn is_descendant_of(&self, ancestor: &Path) -> bool {
        self.segments.len() > ancestor.segments.len() && self.starts_with(&ancestor.segments)
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn as_slice(&self) -> &[Selector] {
        &self.segments
    }
}

impl Deref for Path {
    type Target = [Selector];

    fn deref(&self) -> &[Selector] {
        &self.segments
    }
}

impl From<Vec<Selector>> for Path {
    fn from(segments: Vec<Selector>) -> Self {
        Path { segments }
    }
}

impl From<&[Selector]> for Path {
    fn from(segments: &[Selector]) -> Self {
        Path {
            segments: segments.to_vec(),
        }
    }
}

impl<const N: usize> From<[Selector; N]> for Path {
    fn from(segments: [Selector; N]) -> Self {
        Path {
            segments: segments.to_vec(),
        }
    }
}

impl FromIterator<Selector> for Path {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        Path {
            segments: iter.into_iter().collect(),
        }
    }
}

/// Formats as `/` for the root and `/0/render/2` otherwise
impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}
