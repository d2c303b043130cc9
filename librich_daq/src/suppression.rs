use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::smart_id::RichSmartID;

/// What the suppression policy did to one PD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Suppression {
    #[default]
    None,
    /// All hits dropped; the PD had this many
    HighOccupancy(usize),
    /// This many hot pixels were removed
    HotPixels(usize),
}

/// Software mask of known hot pixels, grouped by PD
#[derive(Debug, Clone, Default)]
pub struct HotPixelMask {
    by_pd: FxHashMap<RichSmartID, FxHashSet<RichSmartID>>,
}

impl HotPixelMask {
    /// Build a mask from pixel identifiers. Anything that is not a valid pixel is
    /// ignored with a warning.
    pub fn new(pixels: &[RichSmartID]) -> Self {
        let mut mask = Self::default();
        for pixel in pixels {
            if !mask.add(*pixel) {
                spdlog::warn!("Ignoring hot pixel that is not a valid pixel id: {}", pixel.dump());
            }
        }
        mask
    }

    /// Add a pixel. Returns false if it is not a valid pixel identifier.
    pub fn add(&mut self, pixel: RichSmartID) -> bool {
        if !pixel.is_valid_pixel() {
            return false;
        }
        self.by_pd.entry(pixel.pd_id()).or_default().insert(pixel);
        true
    }

    pub fn len(&self) -> usize {
        self.by_pd.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pd.is_empty()
    }

    pub fn is_hot(&self, pixel: RichSmartID) -> bool {
        self.by_pd
            .get(&pixel.pd_id())
            .is_some_and(|pixels| pixels.contains(&pixel))
    }

    /// Remove masked pixels of one PD from `hits`. Returns the number removed.
    pub fn apply(&self, pd_id: RichSmartID, hits: &mut Vec<RichSmartID>) -> usize {
        let Some(pixels) = self.by_pd.get(&pd_id.pd_id()) else {
            return 0;
        };
        let before = hits.len();
        hits.retain(|hit| !pixels.contains(hit));
        before - hits.len()
    }
}

/// Occupancy cut plus hot pixel mask
#[derive(Debug, Clone, Default)]
pub struct SuppressionPolicy {
    pub max_occupancy: usize,
    pub mask: HotPixelMask,
}

impl SuppressionPolicy {
    pub fn new(max_occupancy: usize, mask: HotPixelMask) -> Self {
        Self {
            max_occupancy,
            mask,
        }
    }

    /// Apply the policy to the hits of one PD
    pub fn apply(&self, pd_id: RichSmartID, hits: &mut Vec<RichSmartID>) -> Suppression {
        if hits.len() > self.max_occupancy {
            let n_hits = hits.len();
            hits.clear();
            spdlog::debug!("Forced suppression of {pd_id}: {n_hits} hits");
            return Suppression::HighOccupancy(n_hits);
        }
        match self.mask.apply(pd_id, hits) {
            0 => Suppression::None,
            n => Suppression::HotPixels(n),
        }
    }
}
