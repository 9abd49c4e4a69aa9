//! Nexus image tags and version ordering.
//!
//! Tags are dotted `MAJOR.MINOR.MICRO` triples. Ordering only considers
//! MINOR then MICRO: every published Nexus 3 release shares the same major.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The one published tag that doesn't follow the dotted triple format.
const IRREGULAR_TAG: &str = "3.9.0-01";

/// Error parsing a version tag.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("tag {0:?} is not a MAJOR.MINOR.MICRO version")]
    Malformed(String),
    #[error("image {0:?} has no tag")]
    MissingTag(String),
}

/// A parsed `MAJOR.MINOR.MICRO` tag.
///
/// MAJOR is kept when numeric but never required: `v3.25.0` parses with no
/// major. Components after MICRO are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VersionTag {
    pub major: Option<u32>,
    pub minor: u32,
    pub micro: u32,
}

impl VersionTag {
    /// Parse a tag. `3.9.0-01` maps to micro 1.
    pub fn parse(tag: &str) -> Result<Self, VersionError> {
        if tag == IRREGULAR_TAG {
            return Ok(Self {
                major: Some(3),
                minor: 9,
                micro: 1,
            });
        }

        let malformed = || VersionError::Malformed(tag.to_string());
        let mut parts = tag.split('.');
        let major = parts.next().and_then(|major| major.parse::<u32>().ok());
        let mut next = || -> Result<u32, VersionError> {
            parts
                .next()
                .ok_or_else(malformed)?
                .parse::<u32>()
                .map_err(|_| malformed())
        };
        Ok(Self {
            major,
            minor: next()?,
            micro: next()?,
        })
    }

    /// Compare MINOR, then MICRO. MAJOR is ignored.
    pub fn release_cmp(&self, other: &Self) -> Ordering {
        (self.minor, self.micro).cmp(&(other.minor, other.micro))
    }
}

impl FromStr for VersionTag {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.major {
            Some(major) => write!(f, "{major}.{}.{}", self.minor, self.micro),
            None => write!(f, "*.{}.{}", self.minor, self.micro),
        }
    }
}

/// Whether `candidate` is a strictly newer release than `current`.
///
/// Fails when either tag can't be parsed.
pub fn higher_version(candidate: &str, current: &str) -> Result<bool, VersionError> {
    let candidate = VersionTag::parse(candidate)?;
    let current = VersionTag::parse(current)?;
    Ok(candidate.release_cmp(&current) == Ordering::Greater)
}

/// Split an image reference into repository and tag.
///
/// Registry ports (`host:5000/repo`) are not mistaken for tags. A digest
/// suffix is dropped.
pub fn split_image(image: &str) -> (&str, Option<&str>) {
    let image = image.split('@').next().unwrap_or(image);
    let last_slash = image.rfind('/').map_or(0, |i| i + 1);
    match image.rsplit_once(':') {
        Some((repository, tag)) if repository.len() >= last_slash => (repository, Some(tag)),
        _ => (image, None),
    }
}

/// Replace (or add) the tag of an image reference.
pub fn with_tag(image: &str, tag: &str) -> String {
    let (repository, _) = split_image(image);
    format!("{repository}:{tag}")
}

/// Parsed tag of an image reference.
pub fn image_version(image: &str) -> Result<VersionTag, VersionError> {
    match split_image(image) {
        (_, Some(tag)) => VersionTag::parse(tag),
        (_, None) => Err(VersionError::MissingTag(image.to_string())),
    }
}
