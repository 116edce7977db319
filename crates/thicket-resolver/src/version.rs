//! Concrete versions and their ordering.
//!
//! A version has up to four numeric fields and an optional tag:
//! `major.minor.incremental[-build][-tag]`. Fields compare numerically in that
//! order; a version without a tag ranks above the same numbers with a tag, and
//! two tags compare case-insensitively.

use std::cmp::Ordering;
use std::fmt;

use crate::parser::{self, ParseError};

/// A parsed version. Equality follows the ordering, not the text.
#[derive(Debug, Clone)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub incremental: u64,
    pub build: u64,
    pub tag: Option<String>,
    text: String,
    /// Numeric components written in the source text (1 to 3).
    components: u8,
    /// Position of the first `x` wildcard, if any (1 = minor, 2 = incremental).
    wildcard: Option<u8>,
}

impl Version {
    /// A `major.minor.incremental` version with no build number or tag.
    pub fn new(major: u64, minor: u64, incremental: u64) -> Self {
        Self {
            major,
            minor,
            incremental,
            build: 0,
            tag: None,
            text: format!("{major}.{minor}.{incremental}"),
            components: 3,
            wildcard: None,
        }
    }

    pub fn with_build(mut self, build: u64) -> Self {
        self.build = build;
        self.rebuild_text();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self.rebuild_text();
        self
    }

    pub(crate) fn from_parts(
        numbers: [u64; 4],
        tag: Option<String>,
        text: String,
        components: u8,
        wildcard: Option<u8>,
    ) -> Self {
        let [major, minor, incremental, build] = numbers;
        Self {
            major,
            minor,
            incremental,
            build,
            tag,
            text,
            components,
            wildcard,
        }
    }

    /// Parse a single version such as `1.8.3`, `v2.0` or `0.1.2-7-beta`.
    ///
    /// Operators and ranges are rejected; use [`crate::parser::parse`] for those.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        parser::parse_version(text)
    }

    /// The version exactly as written.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `true` when any component was written as `x`.
    pub fn has_wildcard(&self) -> bool {
        self.wildcard.is_some()
    }

    /// Number of numeric components written (`1.2` has two).
    pub fn components(&self) -> u8 {
        self.components
    }

    /// Exclusive upper bound used by tilde and x-ranges.
    ///
    /// With a wildcard, the component before the first `x` is bumped
    /// (`1.2.x` gives `1.3.0`, `1.x` gives `2.0.0`). Otherwise minor is bumped
    /// when a minor component was written (`~1.2.3` gives `1.3.0`) and major
    /// when it was not (`~1` gives `2.0.0`).
    pub fn next_bound(&self) -> Version {
        let bump_minor = match self.wildcard {
            Some(position) => position >= 2,
            None => self.components >= 2,
        };
        if bump_minor {
            Version::new(self.major, self.minor + 1, 0)
        } else {
            Version::new(self.major + 1, 0, 0)
        }
    }

    fn rebuild_text(&mut self) {
        let mut text = format!("{}.{}.{}", self.major, self.minor, self.incremental);
        if self.build != 0 {
            text.push_str(&format!("-{}", self.build));
        }
        if let Some(tag) = &self.tag {
            text.push('-');
            text.push_str(tag);
        }
        self.text = text;
        self.components = 3;
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.incremental, self.build)
            .cmp(&(other.major, other.minor, other.incremental, other.build))
            .then_with(|| compare_tags(self.tag.as_deref(), other.tag.as_deref()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

fn compare_tags(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        // A release ranks above any pre-release tag.
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}
