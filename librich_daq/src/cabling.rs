// The cabling map ties the hardware view of a photodetector (which L1 board, which
// input, which Level-0 id it reports) to its geometric RichSmartID. The decoder only
// sees the hardware view in the raw data, the encoder only the geometric one, so both
// directions are kept as hash maps.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use fxhash::FxHashMap;

use super::error::CablingError;
use super::hardware_id::{Level0ID, Level1HardwareID, Level1Input};
use super::smart_id::{PdType, RichDetector, RichSmartID, Side};

const ENTRIES_PER_LINE: usize = 8; //l1_board,l1_input,l0_id,rich,side,pd_type,pd_col,pd_num

/// Load the default map for windows
#[cfg(target_family = "windows")]
fn load_default_map() -> String {
    String::from(include_str!("data\\default_cabling.csv"))
}

/// Load the default map for macos and linux
#[cfg(target_family = "unix")]
fn load_default_map() -> String {
    String::from(include_str!("data/default_cabling.csv"))
}

/// Where a photodetector is plugged into the read-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareLocation {
    pub board: Level1HardwareID,
    pub input: Level1Input,
    pub level0: Level0ID,
}

/// Hardware <-> geometry lookups needed by the decoder and encoder
pub trait CablingLookup {
    /// The photodetector reporting as this Level-0 id
    fn pd_id_from_level0(&self, level0: Level0ID) -> Option<RichSmartID>;
    /// Board, input and Level-0 id of a photodetector
    fn hardware_location(&self, pd_id: RichSmartID) -> Option<HardwareLocation>;
    /// Which RICH a Level-1 board reads out
    fn rich_detector(&self, board: Level1HardwareID) -> Option<RichDetector>;
}

/// Placeholder PD identifier for when the cabling lookup is not trusted. Built only
/// from the read-out position: side from the ingress parity, column from the board and
/// the upper ingress bit, number from the input within the ingress.
pub fn fake_pd_id(rich: RichDetector, board: Level1HardwareID, input: Level1Input) -> RichSmartID {
    let ingress = input.ingress_id().data();
    RichSmartID::pd(
        rich,
        Side::from_index(ingress),
        PdType::Hpd,
        board.data() * 2 + (ingress >> 1),
        input.l1_input_within_ingress().data(),
    )
}

/// RichCabling reads the cabling from a CSV file where each row is
/// `l1_board,l1_input,l0_id,rich,side,pd_type,pd_col,pd_num`.
#[derive(Debug, Clone, Default)]
pub struct RichCabling {
    by_level0: FxHashMap<Level0ID, RichSmartID>,
    by_pd: FxHashMap<RichSmartID, HardwareLocation>,
    boards: FxHashMap<Level1HardwareID, RichDetector>,
}

impl RichCabling {
    /// Create a new RichCabling
    /// If the path is None, we load the default that is bundled with the library
    pub fn new(path: Option<&Path>) -> Result<Self, CablingError> {
        let mut contents = String::new();
        if let Some(p) = path {
            let mut file = File::open(p)?;
            file.read_to_string(&mut contents)?;
        } else {
            contents = load_default_map();
        }

        let mut cabling = RichCabling::default();

        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines.filter(|l| !l.is_empty()) {
            let entries: Vec<&str> = line.split_terminator(",").collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(CablingError::BadFileFormat);
            }

            let board = Level1HardwareID::new(entries[0].parse()?);
            let input = Level1Input::new(entries[1].parse()?);
            let level0 = Level0ID::new(entries[2].parse()?);
            let rich = match entries[3] {
                "rich1" => RichDetector::Rich1,
                "rich2" => RichDetector::Rich2,
                other => return Err(CablingError::BadKeyword(other.to_string())),
            };
            let side = Side::from_index(entries[4].parse()?);
            let pd_type = match entries[5] {
                "hpd" => PdType::Hpd,
                "mapmt" => PdType::MaPmt,
                other => return Err(CablingError::BadKeyword(other.to_string())),
            };
            let pd_col: u32 = entries[6].parse()?;
            let pd_num: u32 = entries[7].parse()?;
            let mut pd_id = RichSmartID::pd(rich, side, pd_type, 0, 0);
            if !pd_id.set_pd_col(pd_col) || !pd_id.set_pd_num_in_col(pd_num) {
                return Err(CablingError::BadPdPosition(pd_col, pd_num));
            }
            cabling.add(pd_id, HardwareLocation { board, input, level0 })?;
        }

        Ok(cabling)
    }

    /// Add one photodetector to the map
    pub fn add(&mut self, pd_id: RichSmartID, location: HardwareLocation) -> Result<(), CablingError> {
        if self.by_level0.insert(location.level0, pd_id).is_some() {
            return Err(CablingError::DuplicateLevel0(location.level0.data()));
        }
        self.by_pd.insert(pd_id.pd_id(), location);
        self.boards.insert(location.board, pd_id.rich());
        Ok(())
    }

    /// Number of photodetectors in the map
    pub fn n_pds(&self) -> usize {
        self.by_pd.len()
    }

    /// All Level-1 boards in the map, sorted
    pub fn boards(&self) -> Vec<Level1HardwareID> {
        let mut boards: Vec<Level1HardwareID> = self.boards.keys().copied().collect();
        boards.sort();
        boards
    }
}

impl CablingLookup for RichCabling {
    fn pd_id_from_level0(&self, level0: Level0ID) -> Option<RichSmartID> {
        self.by_level0.get(&level0).copied()
    }

    fn hardware_location(&self, pd_id: RichSmartID) -> Option<HardwareLocation> {
        self.by_pd.get(&pd_id.pd_id()).copied()
    }

    fn rich_detector(&self, board: Level1HardwareID) -> Option<RichDetector> {
        self.boards.get(&board).copied()
    }
}
