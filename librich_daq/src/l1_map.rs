use serde::{Deserialize, Serialize};
use std::fmt;

use super::hardware_id::{L1IngressID, Level0ID, Level1HardwareID, Level1Input};
use super::ingress_header::L1IngressHeader;
use super::pd_bank::PDHeader;
use super::smart_id::{RichDetector, RichSmartID, Side};
use super::suppression::Suppression;

/// Per-PD cross checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntegrityFailure {
    /// PD header event id differs from the ingress header
    IngressEventId,
    /// Event id differs from ODIN
    OdinEventId,
    /// Ingress BX id differs from ODIN
    OdinBxId,
    /// PD read out on a board/input other than the cabling says
    BoardId,
    Parity,
    /// Declared and implied data sizes disagree, or bad pixel addresses
    DataSize,
}

impl fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IngressEventId => "ingress event id mismatch",
            Self::OdinEventId => "ODIN event id mismatch",
            Self::OdinBxId => "ODIN BX id mismatch",
            Self::BoardId => "board id mismatch",
            Self::Parity => "parity error",
            Self::DataSize => "data size error",
        };
        write!(f, "{name}")
    }
}

/// The decoded payload of one photodetector
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PDInfo {
    /// Undefined when the Level-0 id has no cabling entry
    pub pd_id: RichSmartID,
    pub level0_id: Level0ID,
    pub header: PDHeader,
    pub footer: Vec<u32>,
    /// Pixel identifiers in decode order
    pub hits: Vec<RichSmartID>,
    pub failures: Vec<IntegrityFailure>,
    /// Hits were cleared because of a failed check
    pub purged: bool,
    pub suppression: Suppression,
}

impl PDInfo {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn n_hits(&self) -> usize {
        self.hits.len()
    }
}

/// One ingress: its header and the PDs read from it, in decode order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IngressInfo {
    pub ingress_id: L1IngressID,
    pub header: L1IngressHeader,
    pub pds: Vec<(Level1Input, PDInfo)>,
}

/// The decoded content of one event, by board then ingress
#[derive(Debug, Clone, Default)]
pub struct L1Map {
    boards: Vec<(Level1HardwareID, Vec<IngressInfo>)>,
    n_hits: [[usize; 2]; 2],
    n_active_pds: [[usize; 2]; 2],
}

impl L1Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the ingresses of one board and update the running totals
    pub fn add_board(&mut self, board: Level1HardwareID, ingresses: Vec<IngressInfo>) {
        for ingress in ingresses.iter() {
            for (_, pd) in ingress.pds.iter() {
                if !pd.pd_id.is_valid() || pd.hits.is_empty() {
                    continue;
                }
                let (rich, side) = (pd.pd_id.rich().index(), pd.pd_id.side().index());
                self.n_hits[rich][side] += pd.hits.len();
                self.n_active_pds[rich][side] += 1;
            }
        }
        self.boards.push((board, ingresses));
    }

    pub fn boards(&self) -> &[(Level1HardwareID, Vec<IngressInfo>)] {
        &self.boards
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    /// All PDs with their board and input, in decode order
    pub fn pds(&self) -> impl Iterator<Item = (Level1HardwareID, Level1Input, &PDInfo)> + '_ {
        self.boards.iter().flat_map(|(board, ingresses)| {
            ingresses
                .iter()
                .flat_map(move |ingress| ingress.pds.iter().map(move |(input, pd)| (*board, *input, pd)))
        })
    }

    /// Every decoded pixel identifier, in decode order
    pub fn smart_ids(&self) -> Vec<RichSmartID> {
        self.pds().flat_map(|(_, _, pd)| pd.hits.iter().copied()).collect()
    }

    pub fn n_hits(&self, rich: RichDetector, side: Side) -> usize {
        self.n_hits[rich.index()][side.index()]
    }

    /// PDs with at least one hit
    pub fn n_active_pds(&self, rich: RichDetector, side: Side) -> usize {
        self.n_active_pds[rich.index()][side.index()]
    }

    pub fn n_total_hits(&self) -> usize {
        self.n_hits.iter().flatten().sum()
    }
}
