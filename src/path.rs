use std::fmt::{self, Display};

/// One step from a parent node to a child node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A mapping key, a keyword argument name, or a synthetic marker such as the args key.
    Field(String),
    /// A position inside a sequence, set, tuple or positional-argument list.
    Index(usize),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Field(value.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(value: String) -> Self {
        PathSegment::Field(value)
    }
}

impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

/// Location of a node relative to the root of the config being built.
///
/// Paths exist for diagnostics only: every child node extends its parent's
/// path by exactly one segment, and errors report the path of the node that
/// failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParamPath {
    segments: Vec<PathSegment>,
}

impl ParamPath {
    /// The empty path of the root node.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new path one segment deeper than `self`.
    pub fn join(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(segment.into());
        Self { segments }
    }

    /// The segments from the root down to this node.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Display for ParamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for ParamPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_extends_by_one_segment() {
        let root = ParamPath::root();
        let child = root.join("foos").join(1usize).join("x");
        assert_eq!(root.len(), 0);
        assert_eq!(child.len(), 3);
        assert_eq!(child.to_string(), "foos.1.x");
    }

    #[test]
    fn root_displays_empty() {
        assert_eq!(ParamPath::root().to_string(), "");
        assert!(ParamPath::root().is_root());
    }
}
