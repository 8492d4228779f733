//! Address allocation.
//!
//! Fixtures occupy `[address, address + channel_count - 1]` inside one
//! universe. Ranges never overlap within a universe and a fixture is never
//! split across universes.

use luxsync_fixtures::DMX_UNIVERSE_SIZE;

use crate::instance::InstanceId;
use crate::error::EngineError;

/// The slots one patched fixture holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footprint {
    pub id: InstanceId,
    pub universe: u16,
    pub address: u16,
    pub channel_count: usize,
}

impl Footprint {
    pub fn end(&self) -> usize {
        self.address as usize + self.channel_count - 1
    }

    fn overlaps(&self, universe: u16, address: u16, channel_count: usize) -> bool {
        let start = address as usize;
        let end = start + channel_count - 1;
        self.universe == universe && start <= self.end() && self.address as usize <= end
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub universe: u16,
    pub address: u16,
}

/// Rejects ranges that leave 1-512.
pub fn check_range(address: u16, channel_count: usize) -> Result<(), EngineError> {
    if address == 0 || address as usize + channel_count - 1 > DMX_UNIVERSE_SIZE {
        return Err(EngineError::AddressOutOfRange {
            address,
            channel_count,
        });
    }
    Ok(())
}

/// First fixture among `existing` that would collide with the given range.
pub fn find_overlap<'a>(
    existing: impl IntoIterator<Item = &'a Footprint>,
    universe: u16,
    address: u16,
    channel_count: usize,
) -> Option<InstanceId> {
    existing
        .into_iter()
        .find(|footprint| footprint.overlaps(universe, address, channel_count))
        .map(|footprint| footprint.id)
}

/// Places a fixture after the highest occupied slot of `universe`, moving on
/// to the next universe (address 1) whenever it would not fit.
pub fn next_free(
    existing: &[Footprint],
    universe: u16,
    channel_count: usize,
) -> Result<Placement, EngineError> {
    let mut universe = universe;
    loop {
        let highest_end = existing
            .iter()
            .filter(|footprint| footprint.universe == universe)
            .map(Footprint::end)
            .max()
            .unwrap_or(0);
        let address = highest_end + 1;

        if address + channel_count - 1 <= DMX_UNIVERSE_SIZE {
            return Ok(Placement {
                universe,
                address: address as u16,
            });
        }

        universe = universe
            .checked_add(1)
            .ok_or(EngineError::UniversesExhausted)?;
    }
}

/// The universe auto-placement continues in: the highest one in use.
pub fn current_universe(existing: &[Footprint]) -> u16 {
    existing
        .iter()
        .map(|footprint| footprint.universe)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn footprints(layout: &[(u16, u16, usize)]) -> Vec<Footprint> {
        let mut ids: SlotMap<InstanceId, ()> = SlotMap::with_key();
        layout
            .iter()
            .map(|&(universe, address, channel_count)| Footprint {
                id: ids.insert(()),
                universe,
                address,
                channel_count,
            })
            .collect()
    }

    #[test]
    fn test_sequential_packing() {
        let existing = footprints(&[(0, 1, 8), (0, 9, 11)]);
        assert_eq!(
            next_free(&existing, 0, 6).unwrap(),
            Placement { universe: 0, address: 20 }
        );
        assert_eq!(
            next_free(&[], 0, 6).unwrap(),
            Placement { universe: 0, address: 1 }
        );
    }

    #[test]
    fn test_overflow_moves_to_next_universe() {
        let existing = footprints(&[(0, 1, 500)]);
        assert_eq!(
            next_free(&existing, 0, 12).unwrap(),
            Placement { universe: 1, address: 1 }
        );
        assert_eq!(
            next_free(&existing, 0, 12).unwrap(),
            next_free(&existing, 1, 12).unwrap()
        );
        assert_eq!(
            next_free(&existing, 0, 11).unwrap(),
            Placement { universe: 0, address: 501 }
        );
    }

    #[test]
    fn test_overlap_detection() {
        let existing = footprints(&[(0, 10, 5), (1, 1, 512)]);
        assert_eq!(find_overlap(&existing, 0, 14, 3), Some(existing[0].id));
        assert_eq!(find_overlap(&existing, 0, 6, 4), Some(existing[0].id));
        assert_eq!(find_overlap(&existing, 0, 15, 3), None);
        assert_eq!(find_overlap(&existing, 0, 1, 9), None);
        assert_eq!(find_overlap(&existing, 1, 300, 1), Some(existing[1].id));
    }

    #[test]
    fn test_range_check() {
        assert!(check_range(1, 512).is_ok());
        assert!(check_range(505, 8).is_ok());
        assert!(check_range(506, 8).is_err());
        assert!(check_range(0, 1).is_err());
    }
}
