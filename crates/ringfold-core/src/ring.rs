//! Ordered promotion stages.

use std::fmt;

/// Direction of a promotion between adjacent rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// Towards the next ring (`shift`).
    Forward,
    /// Towards the previous ring (`unshift`).
    Backward,
}

impl Shift {
    pub fn offset(self) -> isize {
        match self {
            Shift::Forward => 1,
            Shift::Backward => -1,
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shift::Forward => f.write_str("shift"),
            Shift::Backward => f.write_str("unshift"),
        }
    }
}

/// The configured ring list, e.g. `["dev", "staging", "prod"]`.
///
/// Loaded once per run and immutable afterwards. A ring's position is its
/// index; the previous ring of a ring is the one at position − 1.
///
/// # Examples
///
/// ```
/// use ringfold_core::{RingLedger, Shift};
///
/// let ledger = RingLedger::new(["dev", "staging", "prod"]).unwrap();
/// assert_eq!(ledger.target_ring("staging", Shift::Forward).unwrap(), "prod");
/// assert!(ledger.target_ring("dev", Shift::Backward).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingLedger {
    rings: Vec<String>,
}

impl RingLedger {
    /// Builds a ledger from ring names. Duplicates are dropped (first
    /// occurrence wins); an empty list is rejected.
    pub fn new<I, S>(rings: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for ring in rings {
            let ring = ring.into();
            if ring.trim().is_empty() {
                return Err(crate::Error::ConfigInvalid {
                    reason: "ring names must not be empty".to_owned(),
                });
            }
            if !unique.contains(&ring) {
                unique.push(ring);
            }
        }

        if unique.is_empty() {
            return Err(crate::Error::ConfigInvalid {
                reason: "at least one ring must be configured".to_owned(),
            });
        }

        Ok(Self { rings: unique })
    }

    pub fn rings(&self) -> &[String] {
        &self.rings
    }

    pub fn contains(&self, ring: &str) -> bool {
        self.rings.iter().any(|r| r == ring)
    }

    pub fn position_of(&self, ring: &str) -> crate::Result<usize> {
        self.rings
            .iter()
            .position(|r| r == ring)
            .ok_or_else(|| crate::Error::UnknownRing {
                ring: ring.to_owned(),
                rings: self.rings.clone(),
            })
    }

    /// The ring adjacent to `ring` in the given direction.
    pub fn target_ring(&self, ring: &str, shift: Shift) -> crate::Result<&str> {
        self.offset_ring(ring, shift.offset())
    }

    /// The ring before `ring`, or `None` for the first ring.
    pub fn previous(&self, ring: &str) -> crate::Result<Option<&str>> {
        match self.offset_ring(ring, -1) {
            Ok(previous) => Ok(Some(previous)),
            Err(crate::Error::RingBoundary { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn offset_ring(&self, ring: &str, offset: isize) -> crate::Result<&str> {
        let position = self.position_of(ring)?;
        position
            .checked_add_signed(offset)
            .and_then(|index| self.rings.get(index))
            .map(String::as_str)
            .ok_or_else(|| crate::Error::RingBoundary {
                ring: ring.to_owned(),
                offset,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> RingLedger {
        RingLedger::new(["dev", "staging", "prod"]).unwrap()
    }

    #[test]
    fn positions_follow_configuration_order() {
        let ledger = ledger();
        assert_eq!(ledger.position_of("dev").unwrap(), 0);
        assert_eq!(ledger.position_of("prod").unwrap(), 2);
    }

    #[test]
    fn unknown_ring_is_rejected() {
        let err = ledger().position_of("qa").unwrap_err();
        assert!(matches!(err, crate::Error::UnknownRing { ref ring, .. } if ring == "qa"));
    }

    #[test]
    fn shifting_past_either_end_fails() {
        let ledger = ledger();
        assert!(matches!(
            ledger.target_ring("dev", Shift::Backward),
            Err(crate::Error::RingBoundary { offset: -1, .. })
        ));
        assert!(matches!(
            ledger.target_ring("prod", Shift::Forward),
            Err(crate::Error::RingBoundary { offset: 1, .. })
        ));
    }

    #[test]
    fn shifting_within_bounds() {
        let ledger = ledger();
        assert_eq!(ledger.target_ring("staging", Shift::Forward).unwrap(), "prod");
        assert_eq!(ledger.target_ring("staging", Shift::Backward).unwrap(), "dev");
        assert_eq!(ledger.target_ring("dev", Shift::Forward).unwrap(), "staging");
    }

    #[test]
    fn previous_of_first_ring_is_none() {
        let ledger = ledger();
        assert_eq!(ledger.previous("dev").unwrap(), None);
        assert_eq!(ledger.previous("prod").unwrap(), Some("staging"));
        assert!(ledger.previous("qa").is_err());
    }

    #[test]
    fn duplicates_are_dropped_and_empty_rejected() {
        let ledger = RingLedger::new(["dev", "prod", "dev"]).unwrap();
        assert_eq!(ledger.rings(), ["dev", "prod"]);

        assert!(RingLedger::new(Vec::<String>::new()).is_err());
        assert!(RingLedger::new(["dev", " "]).is_err());
    }
}
