//! Property paths, selectors, and subscription signatures.
//!
//! Paths are sequences of segments that describe a location in the state
//! tree. Each segment is either a key (for objects) or an index (for
//! arrays). Selectors are the strings clients pass to `get_state`: a
//! property path in dotted/bracket notation, the whole-tree sentinel
//! [`FULL_STATE_SELECTOR`], or the no-selection sentinel
//! [`NULL_STATE_SELECTOR`]. A selector set canonicalizes into a
//! [`Signature`] identifying one shared accessor.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FacetError, FacetResult};

/// Selector requesting the entire state tree.
pub const FULL_STATE_SELECTOR: &str = "@@STATE";

/// Selector requesting no state at all.
pub const NULL_STATE_SELECTOR: &str = "";

/// A single segment in a property path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Object key access: `{"key": value}`
    Key(String),
    /// Array index access: `[index]`
    Index(usize),
}

impl Seg {
    /// Create a key segment.
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Seg::Key(k.into())
    }

    /// Create an index segment.
    #[inline]
    pub fn index(i: usize) -> Self {
        Seg::Index(i)
    }

    /// Get the key if this is a key segment.
    #[inline]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Seg::Key(k) => Some(k),
            Seg::Index(_) => None,
        }
    }

    /// Get the index if this is an index segment.
    #[inline]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Seg::Key(_) => None,
            Seg::Index(i) => Some(*i),
        }
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, ".{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// A complete path into the state tree.
///
/// Paths are immutable sequences of segments. Use builder methods or
/// [`Path::parse`] to construct them.
///
/// # Examples
///
/// ```
/// use facet_state::Path;
///
/// let built = Path::root().key("users").index(0).key("name");
/// let parsed = Path::parse("users[0].name").unwrap();
/// assert_eq!(built, parsed);
///
/// // Bracket and dotted index notation are equivalent.
/// assert_eq!(parsed, Path::parse("users.0.name").unwrap());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

enum ParsePos {
    Start,
    Dot,
    Text,
    CloseBracket,
}

impl Path {
    /// Create an empty path (root).
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty path (alias for `new`).
    #[inline]
    pub fn root() -> Self {
        Self::new()
    }

    /// Create a path from a vector of segments.
    #[inline]
    pub fn from_segments(segments: Vec<Seg>) -> Self {
        Self(segments)
    }

    /// Parse a selector string in dotted/bracket notation.
    ///
    /// Bracket indices normalize to the same segments as bare numeric
    /// dotted segments, so `"a.b[2].c"` and `"a.b.2.c"` produce equal
    /// paths. Malformed input is a programmer error and is surfaced as
    /// [`FacetError::MalformedPath`], never silently swallowed.
    pub fn parse(raw: &str) -> FacetResult<Self> {
        if raw.is_empty() {
            return Err(FacetError::malformed_path(raw, "empty selector"));
        }
        let mut segs = Vec::new();
        let mut buf = String::new();
        let mut pos = ParsePos::Start;
        let mut chars = raw.chars();
        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    match pos {
                        ParsePos::Start | ParsePos::Dot => {
                            return Err(FacetError::malformed_path(raw, "empty segment"));
                        }
                        ParsePos::Text => {
                            segs.push(Self::token_segment(&buf));
                            buf.clear();
                        }
                        ParsePos::CloseBracket => {}
                    }
                    pos = ParsePos::Dot;
                }
                '[' => {
                    match pos {
                        ParsePos::Dot => {
                            return Err(FacetError::malformed_path(raw, "empty segment"));
                        }
                        ParsePos::Text => {
                            segs.push(Self::token_segment(&buf));
                            buf.clear();
                        }
                        ParsePos::Start | ParsePos::CloseBracket => {}
                    }
                    let mut digits = String::new();
                    let mut closed = false;
                    for b in chars.by_ref() {
                        if b == ']' {
                            closed = true;
                            break;
                        }
                        digits.push(b);
                    }
                    if !closed {
                        return Err(FacetError::malformed_path(raw, "unterminated index bracket"));
                    }
                    if digits.is_empty() || !digits.chars().all(|d| d.is_ascii_digit()) {
                        return Err(FacetError::malformed_path(
                            raw,
                            "bracket index must be a non-negative integer",
                        ));
                    }
                    let index: usize = digits
                        .parse()
                        .map_err(|_| FacetError::malformed_path(raw, "index out of range"))?;
                    segs.push(Seg::Index(index));
                    pos = ParsePos::CloseBracket;
                }
                ']' => {
                    return Err(FacetError::malformed_path(raw, "unmatched closing bracket"));
                }
                _ => {
                    if matches!(pos, ParsePos::CloseBracket) {
                        return Err(FacetError::malformed_path(
                            raw,
                            "missing separator after index",
                        ));
                    }
                    buf.push(c);
                    pos = ParsePos::Text;
                }
            }
        }
        match pos {
            ParsePos::Text => segs.push(Self::token_segment(&buf)),
            ParsePos::Dot => return Err(FacetError::malformed_path(raw, "trailing dot")),
            ParsePos::Start | ParsePos::CloseBracket => {}
        }
        Ok(Path(segs))
    }

    // Bare all-digit dotted segments address array slots.
    fn token_segment(token: &str) -> Seg {
        if token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = token.parse::<usize>() {
                return Seg::Index(index);
            }
        }
        Seg::Key(token.to_owned())
    }

    /// Append a key segment and return self (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment and return self (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    /// Push a segment onto the path (mutating).
    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    /// Pop the last segment from the path.
    #[inline]
    pub fn pop(&mut self) -> Option<Seg> {
        self.0.pop()
    }

    /// Get the segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// Check if this path is empty (root).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the number of segments in this path.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get the first segment.
    #[inline]
    pub fn first(&self) -> Option<&Seg> {
        self.0.first()
    }

    /// Get the last segment.
    #[inline]
    pub fn last(&self) -> Option<&Seg> {
        self.0.last()
    }

    /// Join this path with another path.
    #[inline]
    pub fn join(&self, other: &Path) -> Path {
        let mut result = self.clone();
        result.0.extend(other.0.iter().cloned());
        result
    }

    /// Check if this path is a prefix of another path.
    ///
    /// A path is a prefix of another if all of its segments match
    /// the beginning of the other path's segments.
    ///
    /// # Examples
    ///
    /// ```
    /// use facet_state::path;
    ///
    /// let parent = path!("user");
    /// let child = path!("user", "name");
    ///
    /// assert!(parent.is_prefix_of(&child));
    /// assert!(!child.is_prefix_of(&parent));
    /// assert!(parent.is_prefix_of(&parent)); // A path is a prefix of itself
    /// ```
    #[inline]
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }

    /// Get the parent path (path without the last segment).
    #[inline]
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            let mut p = self.clone();
            p.pop();
            Some(p)
        }
    }

    /// Render the canonical dotted form, the key used for flat composed
    /// values. Indices render as bare decimal segments: `a.b[2].c` becomes
    /// `"a.b.2.c"`.
    pub fn dotted(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match seg {
                Seg::Key(k) => out.push_str(k),
                Seg::Index(n) => out.push_str(&n.to_string()),
            }
        }
        out
    }

    /// Iterate over the segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl IntoIterator for Path {
    type Item = Seg;
    type IntoIter = std::vec::IntoIter<Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Seg;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Construct a `Path` from a sequence of segments.
///
/// # Examples
///
/// ```
/// use facet_state::path;
///
/// // String literals become Key segments
/// let p = path!("users", "alice", "email");
///
/// // Numbers become Index segments
/// let p = path!("items", 0, "name");
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::path!(@seg $seg));
        )+
        p
    }};
    (@seg $seg:expr) => {
        $crate::Seg::from($seg)
    };
}

/// Canonical identity of one accessor: the deduplicated,
/// containment-reduced, order-independent selector set of a subscription.
///
/// Two selector lists that reduce identically are `Eq`/`Hash`-identical
/// and therefore share one cache entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signature {
    /// The whole state tree: `"@@STATE"` appeared among the selectors.
    Full,
    /// No selection: no usable selector was supplied.
    None,
    /// A sorted, reduced set of property paths.
    Paths(Vec<Path>),
}

impl Signature {
    /// Canonicalize a selector list.
    ///
    /// Any [`FULL_STATE_SELECTOR`] subsumes everything else; an empty list
    /// (or one holding only [`NULL_STATE_SELECTOR`]) selects nothing.
    /// Remaining selectors are parsed, sorted, deduplicated, and reduced:
    /// a path that is a descendant of another in the set is dropped in
    /// favor of its ancestor.
    pub fn resolve<I>(selectors: I) -> FacetResult<Signature>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut full = false;
        let mut paths: Vec<Path> = Vec::new();
        for selector in selectors {
            let selector = selector.as_ref();
            if selector == FULL_STATE_SELECTOR {
                full = true;
            } else if selector != NULL_STATE_SELECTOR {
                paths.push(Path::parse(selector)?);
            }
        }
        if full {
            return Ok(Signature::Full);
        }
        if paths.is_empty() {
            return Ok(Signature::None);
        }
        paths.sort();
        paths.dedup();
        let reduced = paths
            .iter()
            .filter(|p| !paths.iter().any(|q| *q != **p && q.is_prefix_of(p)))
            .cloned()
            .collect();
        Ok(Signature::Paths(reduced))
    }

    /// Paths tracked by this signature; empty for `Full` and `None`.
    #[inline]
    pub fn paths(&self) -> &[Path] {
        match self {
            Signature::Paths(paths) => paths,
            _ => &[],
        }
    }

    /// True when this signature selects the whole tree.
    #[inline]
    pub fn is_full(&self) -> bool {
        matches!(self, Signature::Full)
    }
}
