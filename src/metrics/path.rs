//! @ai:module:intent Location of a leaf inside an expected value
//! @ai:module:layer domain
//! @ai:module:public_api FieldPath, PathSegment
//! @ai:module:stateless true

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    /// Index of an expected element
    Index(usize),
    /// Index of an actual element with no expected counterpart
    Extra(usize),
    /// Any element of a list, used when describing comparator configuration
    Each,
}

/// @ai:intent Rendered as `a.b[2].c`; surplus actual elements as `items[+3].sku`; the root as `$`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// @ai:intent Child path for an object key
    /// @ai:effects pure
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(PathSegment::Key(key.into()))
    }

    /// @ai:intent Child path for an expected list element
    /// @ai:effects pure
    pub fn index(&self, index: usize) -> Self {
        self.child(PathSegment::Index(index))
    }

    /// @ai:intent Child path for a surplus actual list element
    /// @ai:effects pure
    pub fn extra(&self, index: usize) -> Self {
        self.child(PathSegment::Extra(index))
    }

    /// @ai:intent Child path standing for every element of a list
    /// @ai:effects pure
    pub fn each(&self) -> Self {
        self.child(PathSegment::Each)
    }

    fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segments.first() {
            None => return write!(f, "$"),
            Some(PathSegment::Key(_)) => {}
            // an array at the root still needs an anchor
            Some(_) => write!(f, "$")?,
        }

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
                PathSegment::Extra(index) => write!(f, "[+{}]", index)?,
                PathSegment::Each => write!(f, "[*]")?,
            }
        }
        Ok(())
    }
}
