//! Order key allocation between neighbouring siblings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::OrderKey;

/// Key given to the first child of an empty sibling list.
pub const BASE_ORDER: OrderKey = OrderKey::from_units(1000);

/// Spacing used when appending, prepending and rebalancing.
pub const BASE_GAP: OrderKey = OrderKey::from_units(1000);

/// Smallest gap that may still be subdivided (0.001).
pub const MIN_GAP: OrderKey = OrderKey::from_ticks(1_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocatorError {
    /// The neighbours are too close (or already collide); the sibling list has
    /// to be re-spaced before a key can be allocated.
    #[error("no room between sibling order keys, rebalance required")]
    NeedsRebalance,

    /// Even evenly spaced keys do not fit the key range.
    #[error("order key range exhausted")]
    Exhausted,
}

/// Spacing constants for one engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySpacing {
    pub base_order: OrderKey,
    pub base_gap: OrderKey,
    pub min_gap: OrderKey,
}

impl Default for KeySpacing {
    fn default() -> Self {
        Self {
            base_order: BASE_ORDER,
            base_gap: BASE_GAP,
            min_gap: MIN_GAP,
        }
    }
}

impl KeySpacing {
    /// A key strictly between `lower` and `upper`, where a missing bound is an
    /// open end of the sibling list.
    pub fn key_between(
        &self,
        lower: Option<OrderKey>,
        upper: Option<OrderKey>,
    ) -> Result<OrderKey, AllocatorError> {
        match (lower, upper) {
            (None, None) => Ok(self.base_order),
            (Some(lower), None) => lower
                .checked_add(self.base_gap)
                .ok_or(AllocatorError::NeedsRebalance),
            (None, Some(upper)) => upper
                .checked_sub(self.base_gap)
                .ok_or(AllocatorError::NeedsRebalance),
            (Some(lower), Some(upper)) => {
                // Inverted or equal bounds fall through here too. Two ticks is
                // the least gap with a key strictly inside.
                let min_gap = self.min_gap.ticks().max(2) as i128;
                if lower.gap_to(upper) < min_gap {
                    return Err(AllocatorError::NeedsRebalance);
                }
                let key = lower.midpoint(upper);
                if !key.is_exact() {
                    return Err(AllocatorError::NeedsRebalance);
                }
                Ok(key)
            }
        }
    }

    /// Key of the `index`-th slot in an evenly spaced list.
    pub fn nth(&self, index: usize) -> Result<OrderKey, AllocatorError> {
        let offset = (index as i128)
            .checked_mul(self.base_gap.ticks() as i128)
            .ok_or(AllocatorError::Exhausted)?;
        let ticks = i64::try_from(self.base_order.ticks() as i128 + offset)
            .map_err(|_| AllocatorError::Exhausted)?;
        let key = OrderKey::from_ticks(ticks);
        if !key.is_exact() {
            return Err(AllocatorError::Exhausted);
        }
        Ok(key)
    }

    /// Whether any adjacent pair in `keys` (already sorted) is closer than `min_gap`.
    pub fn is_crowded(&self, keys: &[OrderKey]) -> bool {
        keys.windows(2)
            .any(|pair| pair[0].gap_to(pair[1]) < self.min_gap.ticks() as i128)
    }
}

/// [`KeySpacing::key_between`] with the default spacing.
pub fn key_between(
    lower: Option<OrderKey>,
    upper: Option<OrderKey>,
) -> Result<OrderKey, AllocatorError> {
    KeySpacing::default().key_between(lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MAX_TICKS;

    fn key(v: f64) -> OrderKey {
        OrderKey::try_from(v).unwrap()
    }

    #[test]
    fn empty_list_starts_at_base_order() {
        assert_eq!(key_between(None, None), Ok(BASE_ORDER));
    }

    #[test]
    fn appends_and_prepends_by_base_gap() {
        assert_eq!(key_between(Some(key(3000.0)), None), Ok(key(4000.0)));
        assert_eq!(key_between(None, Some(key(1000.0))), Ok(key(0.0)));
        assert_eq!(key_between(None, Some(key(0.0))), Ok(key(-1000.0)));
    }

    #[test]
    fn splits_the_gap_between_neighbours() {
        let k = key_between(Some(key(1.0)), Some(key(2.0))).unwrap();
        assert_eq!(k, key(1.5));
    }

    #[test]
    fn gap_of_exactly_min_gap_still_subdivides() {
        let lower = key(5.0);
        let upper = lower.checked_add(MIN_GAP).unwrap();
        let k = key_between(Some(lower), Some(upper)).unwrap();
        assert!(lower < k && k < upper);
    }

    #[test]
    fn narrow_gap_needs_rebalance() {
        assert_eq!(
            key_between(Some(key(100.0)), Some(key(100.0001))),
            Err(AllocatorError::NeedsRebalance)
        );
    }

    #[test]
    fn colliding_or_inverted_bounds_need_rebalance() {
        assert_eq!(
            key_between(Some(key(7.0)), Some(key(7.0))),
            Err(AllocatorError::NeedsRebalance)
        );
        assert_eq!(
            key_between(Some(key(8.0)), Some(key(7.0))),
            Err(AllocatorError::NeedsRebalance)
        );
    }

    #[test]
    fn zero_min_gap_never_returns_a_bound() {
        let spacing = KeySpacing {
            min_gap: OrderKey::from_ticks(0),
            ..KeySpacing::default()
        };
        let ten = OrderKey::from_ticks(10);
        assert_eq!(
            spacing.key_between(Some(ten), Some(OrderKey::from_ticks(11))),
            Err(AllocatorError::NeedsRebalance)
        );
        assert_eq!(
            spacing.key_between(Some(ten), Some(ten)),
            Err(AllocatorError::NeedsRebalance)
        );
        assert_eq!(
            spacing.key_between(Some(ten), Some(OrderKey::from_ticks(12))),
            Ok(OrderKey::from_ticks(11))
        );
    }

    #[test]
    fn never_allocates_outside_the_exact_range() {
        let edge = OrderKey::from_ticks(MAX_TICKS - 10);
        assert_eq!(key_between(Some(edge), None), Err(AllocatorError::NeedsRebalance));

        let spacing = KeySpacing {
            base_order: edge,
            ..KeySpacing::default()
        };
        assert_eq!(spacing.nth(0), Ok(edge));
        assert_eq!(spacing.nth(1), Err(AllocatorError::Exhausted));
    }

    #[test]
    fn overflow_at_either_end_needs_rebalance() {
        let top = OrderKey::from_ticks(i64::MAX);
        let bottom = OrderKey::from_ticks(i64::MIN);
        assert_eq!(key_between(Some(top), None), Err(AllocatorError::NeedsRebalance));
        assert_eq!(key_between(None, Some(bottom)), Err(AllocatorError::NeedsRebalance));
    }

    #[test]
    fn repeated_bisection_stays_ordered_until_exhausted() {
        let lower = BASE_ORDER;
        let mut upper = BASE_ORDER.checked_add(BASE_GAP).unwrap();
        let mut splits = 0;
        while let Ok(k) = key_between(Some(lower), Some(upper)) {
            assert!(lower < k && k < upper);
            upper = k;
            splits += 1;
        }
        assert!(splits >= 19, "only {splits} splits before rebalance");
    }

    #[test]
    fn detects_crowded_lists() {
        let spacing = KeySpacing::default();
        assert!(!spacing.is_crowded(&[key(1.0), key(2.0), key(3.0)]));
        assert!(spacing.is_crowded(&[key(1.0), key(1.00001), key(2.0)]));
        assert!(!spacing.is_crowded(&[]));
    }

    #[test]
    fn nth_slot_is_evenly_spaced() {
        let spacing = KeySpacing::default();
        assert_eq!(spacing.nth(0), Ok(BASE_ORDER));
        assert_eq!(spacing.nth(2), Ok(key(3000.0)));
        assert_eq!(spacing.nth(usize::MAX), Err(AllocatorError::Exhausted));
    }
}
