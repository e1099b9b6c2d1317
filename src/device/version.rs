//! Firmware and board version numbers.

use std::fmt;

/// A `major.minor.revision` version with an optional free-form note, e.g.
/// `0.7.1-custom`.
///
/// Versions order field by field, the note last.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// The major version.
    pub major: u32,
    /// The minor version.
    pub minor: u32,
    /// The revision, zero when the version string has none.
    pub revision: u32,
    /// Whatever follows the numbers.
    pub note: String,
}

impl Version {
    /// Create a version without a note.
    pub const fn new(major: u32, minor: u32, revision: u32) -> Self {
        Version {
            major,
            minor,
            revision,
            note: String::new(),
        }
    }

    /// Parse a version out of a firmware banner.
    ///
    /// Leading non-digits are skipped, the major and minor numbers are
    /// required, and the revision is optional. A string that does not have
    /// that shape yields `0.0.0` and a warning: unusual banners are common
    /// and must not prevent talking to the instrument.
    pub fn parse(text: &str) -> Self {
        parse(text).unwrap_or_else(|| {
            log::warn!("unable to parse version: {text:?}");
            Version::default()
        })
    }
}

/// The strict parser behind [`Version::parse`].
fn parse(text: &str) -> Option<Version> {
    let rest = text.trim_start_matches(|c: char| !c.is_ascii_digit());
    let (major, rest) = number(rest)?;
    let rest = rest.strip_prefix('.')?;
    let (minor, rest) = number(rest)?;
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    let (revision, note) = number(rest).unwrap_or((0, rest));
    Some(Version {
        major,
        minor,
        revision,
        note: note.to_string(),
    })
}

/// Split off the leading run of ASCII digits and parse it.
fn number(text: &str) -> Option<(u32, &str)> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if end == 0 {
        return None;
    }
    let value = text[..end].parse().ok()?;
    Some((value, &text[end..]))
}

impl From<&str> for Version {
    fn from(text: &str) -> Self {
        Version::parse(text)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}{}",
            self.major, self.minor, self.revision, self.note
        )
    }
}
