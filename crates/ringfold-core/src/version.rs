//! Semantic versions as stored in registry tags and labels, and the policy
//! that decides the next one.

use std::fmt;
use std::str::FromStr;

/// A `MAJOR.MINOR.PATCH` version.
///
/// Only the plain numeric triple is accepted. Pre-release or build suffixes
/// never appear in tags written by ringfold and are rejected on parse.
///
/// # Examples
///
/// ```
/// use ringfold_core::Version;
///
/// let v: Version = "2.3.1".parse().unwrap();
/// assert_eq!(v, Version::new(2, 3, 1));
/// assert_eq!(v.to_string(), "2.3.1");
/// assert!("2.3".parse::<Version>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns `true` if `tag` looks like a version tag rather than a
    /// symbolic one (a ring name, `latest`, ...).
    pub fn is_version_tag(tag: &str) -> bool {
        tag.parse::<Version>().is_ok()
    }

    fn same_line(&self, other: &Version) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || crate::Error::InvalidVersion {
            value: s.to_owned(),
        };

        let mut parts = s.split('.');
        let mut next = || -> Result<u64, crate::Error> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let version = Version::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Computes the next version of an image.
///
/// `reference` is the version currently published on the previous ring.
/// While the image still shares `major.minor` with that baseline, a rebuild
/// opens a new minor line; once the lines have diverged, only the patch part
/// moves. Without a baseline, or when `force_major` is set, the major part is
/// bumped. An image that was never built starts at `0.0.0`.
///
/// Fails with [`crate::Error::VersionOverflow`] when the part to bump is already
/// `u64::MAX`.
///
/// # Examples
///
/// ```
/// use ringfold_core::Version;
/// use ringfold_core::version::bump;
///
/// let current = Version::new(2, 3, 1);
/// assert_eq!(bump(None, None, false)?, Version::new(0, 0, 0));
/// assert_eq!(bump(Some(&current), None, false)?, Version::new(3, 0, 0));
/// assert_eq!(bump(Some(&current), Some(&Version::new(2, 3, 0)), false)?, Version::new(2, 4, 0));
/// assert_eq!(bump(Some(&current), Some(&Version::new(1, 9, 9)), false)?, Version::new(2, 3, 2));
/// # Ok::<(), ringfold_core::Error>(())
/// ```
pub fn bump(
    current: Option<&Version>,
    reference: Option<&Version>,
    force_major: bool,
) -> crate::Result<Version> {
    let Some(current) = current else {
        return Ok(Version::default());
    };
    let overflow = || crate::Error::VersionOverflow {
        version: current.to_string(),
    };

    let next = match reference {
        Some(reference) if !force_major => {
            if current.same_line(reference) {
                let minor = current.minor.checked_add(1).ok_or_else(overflow)?;
                Version::new(current.major, minor, 0)
            } else {
                let patch = current.patch.checked_add(1).ok_or_else(overflow)?;
                Version::new(current.major, current.minor, patch)
            }
        }
        _ => Version::new(current.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
    };
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn bump_without_current_starts_at_zero() {
        assert_eq!(bump(None, None, false).unwrap(), v("0.0.0"));
        assert_eq!(bump(None, Some(&v("4.1.0")), true).unwrap(), v("0.0.0"));
    }

    #[test]
    fn bump_without_reference_is_major() {
        assert_eq!(bump(Some(&v("2.3.1")), None, false).unwrap(), v("3.0.0"));
    }

    #[test]
    fn bump_same_line_as_reference_is_minor() {
        assert_eq!(bump(Some(&v("2.3.1")), Some(&v("2.3.0")), false).unwrap(), v("2.4.0"));
    }

    #[test]
    fn bump_diverged_from_reference_is_patch() {
        assert_eq!(bump(Some(&v("2.3.1")), Some(&v("1.9.9")), false).unwrap(), v("2.3.2"));
        assert_eq!(bump(Some(&v("2.3.1")), Some(&v("2.2.7")), false).unwrap(), v("2.3.2"));
    }

    #[test]
    fn bump_forced_major_ignores_reference() {
        assert_eq!(bump(Some(&v("2.3.1")), Some(&v("9.9.9")), true).unwrap(), v("3.0.0"));
        assert_eq!(bump(Some(&v("2.3.1")), Some(&v("2.3.0")), true).unwrap(), v("3.0.0"));
    }

    #[test]
    fn bump_at_the_numeric_limit_fails() {
        let max = Version::new(u64::MAX, u64::MAX, u64::MAX);
        let zero = v("0.0.0");
        for reference in [None, Some(&max), Some(&zero)] {
            assert!(matches!(
                bump(Some(&max), reference, false),
                Err(crate::Error::VersionOverflow { .. })
            ));
        }
        assert!(bump(Some(&max), Some(&max), true).is_err());
        assert_eq!(
            bump(Some(&Version::new(u64::MAX, 3, 1)), Some(&v("1.0.0")), false).unwrap(),
            Version::new(u64::MAX, 3, 2)
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "1", "1.2", "1.2.3.4", "1.2.x", "v1.2.3", "1..3", "-1.2.3", "1.2.3-rc1"] {
            assert!(bad.parse::<Version>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(v("10.0.0") > v("9.99.99"));
        assert!(v("1.2.10") > v("1.2.9"));
    }

    #[test]
    fn version_tag_detection() {
        assert!(Version::is_version_tag("0.0.0"));
        assert!(!Version::is_version_tag("latest"));
        assert!(!Version::is_version_tag("staging"));
    }
}
