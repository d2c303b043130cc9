use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::constants::BYTES_PER_WORD;
use super::l1_map::IntegrityFailure;

/// Counters for one Level-1 board
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardStats {
    pub banks: u64,
    pub words: u64,
    pub pds: u64,
    pub hits: u64,
    pub suppressed_pds: u64,
    pub masked_hits: u64,
    pub unmapped_hits: u64,
    pub purged_pds: u64,
    pub suppressed_ingresses: u64,
}

impl BoardStats {
    fn merge(&mut self, other: &Self) {
        self.banks += other.banks;
        self.words += other.words;
        self.pds += other.pds;
        self.hits += other.hits;
        self.suppressed_pds += other.suppressed_pds;
        self.masked_hits += other.masked_hits;
        self.unmapped_hits += other.unmapped_hits;
        self.purged_pds += other.purged_pds;
        self.suppressed_ingresses += other.suppressed_ingresses;
    }
}

/// Running decode statistics. One is filled per event and merged into the job total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodeSummary {
    pub events: u64,
    pub boards: FxHashMap<u32, BoardStats>,
    pub integrity_failures: BTreeMap<IntegrityFailure, u64>,
    pub structural_errors: BTreeMap<String, u64>,
}

impl DecodeSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn board_mut(&mut self, board: u32) -> &mut BoardStats {
        self.boards.entry(board).or_default()
    }

    pub fn add_failure(&mut self, failure: IntegrityFailure) {
        *self.integrity_failures.entry(failure).or_default() += 1;
    }

    pub fn add_structural_error(&mut self, kind: &str) {
        self.add_structural_errors(kind, 1);
    }

    pub fn add_structural_errors(&mut self, kind: &str, count: u64) {
        if count > 0 {
            *self.structural_errors.entry(kind.to_string()).or_default() += count;
        }
    }

    /// Add another summary's counters to this one
    pub fn merge(&mut self, other: &Self) {
        self.events += other.events;
        for (board, stats) in other.boards.iter() {
            self.board_mut(*board).merge(stats);
        }
        for (failure, count) in other.integrity_failures.iter() {
            *self.integrity_failures.entry(*failure).or_default() += count;
        }
        self.merge_structural_errors(other);
    }

    pub fn merge_structural_errors(&mut self, other: &Self) {
        for (kind, count) in other.structural_errors.iter() {
            *self.structural_errors.entry(kind.clone()).or_default() += count;
        }
    }

    pub fn total_hits(&self) -> u64 {
        self.boards.values().map(|b| b.hits).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.boards.values().map(|b| b.words).sum::<u64>() * BYTES_PER_WORD as u64
    }

    /// Write the summary as a table to the log
    pub fn print(&self) {
        spdlog::info!(
            "Decoded {} events, {} hits from {}",
            self.events,
            self.total_hits(),
            human_bytes::human_bytes(self.total_bytes() as f64)
        );
        let mut boards: Vec<(&u32, &BoardStats)> = self.boards.iter().collect();
        boards.sort_by_key(|(board, _)| **board);
        spdlog::info!(
            "{:>6} {:>8} {:>8} {:>10} {:>10} {:>8} {:>8} {:>8}",
            "Board",
            "Banks",
            "PDs",
            "Hits",
            "Data",
            "Suppr.",
            "Masked",
            "Unmapped"
        );
        for (board, stats) in boards {
            spdlog::info!(
                "{:>6} {:>8} {:>8} {:>10} {:>10} {:>8} {:>8} {:>8}",
                board,
                stats.banks,
                stats.pds,
                stats.hits,
                human_bytes::human_bytes((stats.words * BYTES_PER_WORD as u64) as f64),
                stats.suppressed_pds,
                stats.masked_hits,
                stats.unmapped_hits
            );
        }
        for (failure, count) in self.integrity_failures.iter() {
            spdlog::warn!("{count} PDs with {failure}");
        }
        for (kind, count) in self.structural_errors.iter() {
            spdlog::error!("{count} banks with {kind}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge() {
        let mut total = DecodeSummary::new();
        let mut event = DecodeSummary::new();
        event.events = 1;
        event.board_mut(2).hits = 10;
        event.board_mut(2).words = 25;
        event.add_failure(IntegrityFailure::Parity);
        event.add_structural_error("bad_magic");
        total.merge(&event);
        total.merge(&event);
        assert_eq!(total.events, 2);
        assert_eq!(total.total_hits(), 20);
        assert_eq!(total.total_bytes(), 200);
        assert_eq!(total.integrity_failures[&IntegrityFailure::Parity], 2);
        assert_eq!(total.structural_errors["bad_magic"], 2);
    }

    #[test]
    fn test_yaml() {
        let mut summary = DecodeSummary::new();
        summary.board_mut(1).pds = 4;
        summary.add_failure(IntegrityFailure::OdinBxId);
        let yaml = serde_yaml::to_string(&summary).unwrap();
        let back: DecodeSummary = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, summary);
    }
}
