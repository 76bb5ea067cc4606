//! Canonicalization of user-supplied paths.
//!
//! A canonical path has no leading or trailing `/`, no empty, `.` or `..` segments and
//! no whitespace around its segments. The root is the empty string.

use tracing::debug;

use crate::core::{Error, Result};

/// Turns a raw path into the canonical form every backend receives.
pub trait PathNormalizer {
    fn normalize_path(&self, path: &str) -> Result<String>;
}

/// Invisible codepoints that slip in through copy-paste or string interpolation and are
/// neither `char::is_whitespace` nor `char::is_control`.
const STRAY_CODEPOINTS: [char; 6] = [
    '\u{180E}', // mongolian vowel separator
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // byte order mark
];

/// The default normalizer: trims junk around segments and resolves `.` and `..`.
///
/// A `..` that would climb above the root is rejected rather than clamped, and so is a
/// segment made only of whitespace (`"a/ /b"`), since neither has an unambiguous meaning.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespacePathNormalizer;

impl WhitespacePathNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn is_junk(c: char) -> bool {
        c.is_whitespace() || c.is_control() || STRAY_CODEPOINTS.contains(&c)
    }
}

impl PathNormalizer for WhitespacePathNormalizer {
    fn normalize_path(&self, path: &str) -> Result<String> {
        let invalid = |reason: &'static str| {
            debug!(path, reason, "rejected path");
            Error::InvalidPath {
                path: path.to_string(),
                reason,
            }
        };

        if path.contains('\0') {
            return Err(invalid("contains a null byte").into());
        }

        let mut segments: Vec<&str> = Vec::new();
        for raw in path.split('/') {
            if raw.is_empty() {
                continue;
            }
            match raw.trim_matches(Self::is_junk) {
                "" => return Err(invalid("contains a whitespace-only segment").into()),
                "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(invalid("traverses above the root").into());
                    }
                }
                segment => segments.push(segment),
            }
        }

        Ok(segments.join("/"))
    }
}
