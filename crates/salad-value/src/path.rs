use std::fmt::Display;

use thisisplural::Plural;

/// Location of a node relative to the root of the document being decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Plural)]
pub struct Path(pub Vec<PathSegment>);

impl Path {
    /// Create an empty path representing the document root
    pub fn root() -> Self {
        Path(Vec::new())
    }

    /// Check if this is the root path
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// A copy of this path extended by one segment.
    pub fn join(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Path(segments)
    }

    pub fn join_field(&self, name: impl Into<String>) -> Self {
        self.join(PathSegment::Field(name.into()))
    }

    pub fn join_index(&self, index: usize) -> Self {
        self.join(PathSegment::Index(index))
    }

    pub fn join_key(&self, key: impl Into<String>) -> Self {
        self.join(PathSegment::Key(key.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Declared record field
    Field(String),
    /// Sequence element
    Index(usize),
    /// Arbitrary mapping key (id-map entries)
    Key(String),
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(root)");
        }
        for (i, segment) in self.0.iter().enumerate() {
            let is_first = i == 0;
            match segment {
                PathSegment::Field(name) => {
                    if !is_first {
                        write!(f, ".")?;
                    }
                    write!(f, "{}", name)?;
                }
                PathSegment::Key(key) => write!(f, "[{:?}]", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
