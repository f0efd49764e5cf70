use crate::core::geo::TileAddress;
use crate::prelude::Ordering;

/// Orders tile requests so the ones nearest the view center are issued first.
#[derive(Debug, Clone, Copy)]
pub struct RequestPrioritizer {
    center: TileAddress,
}

impl RequestPrioritizer {
    pub fn new(center: TileAddress) -> Self {
        Self { center }
    }

    pub fn center(&self) -> TileAddress {
        self.center
    }

    /// Nearest first; equal distances fall back to canonical address order.
    pub fn compare(&self, a: &TileAddress, b: &TileAddress) -> Ordering {
        a.distance_to(&self.center)
            .total_cmp(&b.distance_to(&self.center))
            .then_with(|| a.cmp(b))
    }

    pub fn sort(&self, candidates: &mut [TileAddress]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }

    pub fn sorted<I>(&self, candidates: I) -> Vec<TileAddress>
    where
        I: IntoIterator<Item = TileAddress>,
    {
        let mut sorted: Vec<TileAddress> = candidates.into_iter().collect();
        self.sort(&mut sorted);
        sorted
    }
}
