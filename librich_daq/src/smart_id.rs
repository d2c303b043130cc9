use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::{ALICE_SUB_PIXELS, PIXEL_COLUMNS, PIXEL_ROWS_LHCB_MODE};
use super::hardware_id::bit_dump;

/// Bit layout of the packed RichSmartID word
mod fields {
    pub const PIXEL_COL_SHIFT: u32 = 0;
    pub const PIXEL_COL_MASK: u32 = 0x1F;
    pub const PIXEL_ROW_SHIFT: u32 = 5;
    pub const PIXEL_ROW_MASK: u32 = 0x1F;
    pub const PIXEL_SUB_ROW_SHIFT: u32 = 10;
    pub const PIXEL_SUB_ROW_MASK: u32 = 0x7;
    pub const PD_NUM_IN_COL_SHIFT: u32 = 13;
    pub const PD_NUM_IN_COL_MASK: u32 = 0x1F;
    pub const PD_COL_SHIFT: u32 = 18;
    pub const PD_COL_MASK: u32 = 0x1F;
    pub const SIDE_SHIFT: u32 = 23;
    pub const RICH_SHIFT: u32 = 24;
    pub const PD_TYPE_SHIFT: u32 = 25;

    pub const SUB_ROW_SET_BIT: u32 = 1 << 26;
    pub const COL_SET_BIT: u32 = 1 << 27;
    pub const ROW_SET_BIT: u32 = 1 << 28;
    pub const PD_SET_BIT: u32 = 1 << 29;
    pub const SIDE_SET_BIT: u32 = 1 << 30;
    pub const RICH_SET_BIT: u32 = 1 << 31;

    pub const PD_FIELDS: u32 = (PD_NUM_IN_COL_MASK << PD_NUM_IN_COL_SHIFT)
        | (PD_COL_MASK << PD_COL_SHIFT)
        | (1 << SIDE_SHIFT)
        | (1 << RICH_SHIFT)
        | (1 << PD_TYPE_SHIFT)
        | PD_SET_BIT
        | SIDE_SET_BIT
        | RICH_SET_BIT;
}

/// The two RICH detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RichDetector {
    Rich1,
    Rich2,
}

impl RichDetector {
    pub fn index(&self) -> usize {
        match self {
            Self::Rich1 => 0,
            Self::Rich2 => 1,
        }
    }

    pub fn from_index(index: u32) -> Self {
        if index & 1 == 0 {
            Self::Rich1
        } else {
            Self::Rich2
        }
    }
}

impl fmt::Display for RichDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rich1 => write!(f, "RICH1"),
            Self::Rich2 => write!(f, "RICH2"),
        }
    }
}

/// Detector half. Top/Bottom in RICH1, Left/Right in RICH2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub fn index(&self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }

    pub fn from_index(index: u32) -> Self {
        if index & 1 == 0 {
            Self::First
        } else {
            Self::Second
        }
    }
}

/// Photodetector technology
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PdType {
    Hpd,
    MaPmt,
}

/// A pixel position inside one photodetector. The sub-row is only present for hits
/// read out in ALICE mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PixelAddress {
    pub row: u8,
    pub col: u8,
    pub sub_row: Option<u8>,
}

impl PixelAddress {
    pub fn new(row: u8, col: u8) -> Self {
        Self {
            row,
            col,
            sub_row: None,
        }
    }

    pub fn with_sub_row(row: u8, col: u8, sub_row: u8) -> Self {
        Self {
            row,
            col,
            sub_row: Some(sub_row),
        }
    }

    /// Build from a row index of an ALICE mode bitmap (row * 8 + sub_row)
    pub fn from_alice_row(alice_row: u32, col: u32) -> Self {
        Self::with_sub_row(
            (alice_row / ALICE_SUB_PIXELS) as u8,
            col as u8,
            (alice_row % ALICE_SUB_PIXELS) as u8,
        )
    }

    /// Row index in the readout bitmap: the plain row in LHCb mode, row * 8 + sub_row
    /// in ALICE mode.
    pub fn readout_row(&self, alice_mode: bool) -> u32 {
        if alice_mode {
            self.row as u32 * ALICE_SUB_PIXELS + self.sub_row.unwrap_or(0) as u32
        } else {
            self.row as u32
        }
    }

    pub fn is_in_range(&self) -> bool {
        (self.row as u32) < PIXEL_ROWS_LHCB_MODE
            && (self.col as u32) < PIXEL_COLUMNS
            && self.sub_row.map_or(true, |s| (s as u32) < ALICE_SUB_PIXELS)
    }
}

/// Bit-packed identifier of one RICH read-out channel (or of a whole photodetector,
/// when no pixel fields are set).
///
/// The value 0 means "undefined". Ordering and equality are those of the packed word.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RichSmartID(u32);

impl RichSmartID {
    /// Wrap a raw word. Never fails; use `is_valid` to check what was read.
    pub fn new(word: u32) -> Self {
        Self(word)
    }

    /// The undefined identifier
    pub fn undefined() -> Self {
        Self(0)
    }

    /// Identifier of a whole photodetector. Column and number-in-column are masked to
    /// their field widths.
    pub fn pd(rich: RichDetector, side: Side, pd_type: PdType, pd_col: u32, pd_num_in_col: u32) -> Self {
        let pd_type_bit = match pd_type {
            PdType::Hpd => 0,
            PdType::MaPmt => 1,
        };
        Self(
            ((pd_num_in_col & fields::PD_NUM_IN_COL_MASK) << fields::PD_NUM_IN_COL_SHIFT)
                | ((pd_col & fields::PD_COL_MASK) << fields::PD_COL_SHIFT)
                | ((side.index() as u32) << fields::SIDE_SHIFT)
                | ((rich.index() as u32) << fields::RICH_SHIFT)
                | (pd_type_bit << fields::PD_TYPE_SHIFT)
                | fields::PD_SET_BIT
                | fields::SIDE_SET_BIT
                | fields::RICH_SET_BIT,
        )
    }

    /// Pixel identifier on this photodetector
    pub fn with_pixel(&self, pixel: PixelAddress) -> Self {
        let mut id = Self(self.0 & fields::PD_FIELDS);
        id.0 |= ((pixel.col as u32 & fields::PIXEL_COL_MASK) << fields::PIXEL_COL_SHIFT)
            | ((pixel.row as u32 & fields::PIXEL_ROW_MASK) << fields::PIXEL_ROW_SHIFT)
            | fields::COL_SET_BIT
            | fields::ROW_SET_BIT;
        if let Some(sub_row) = pixel.sub_row {
            id.0 |= ((sub_row as u32 & fields::PIXEL_SUB_ROW_MASK) << fields::PIXEL_SUB_ROW_SHIFT)
                | fields::SUB_ROW_SET_BIT;
        }
        id
    }

    /// The photodetector this identifier belongs to (pixel fields stripped)
    pub fn pd_id(&self) -> Self {
        Self(self.0 & fields::PD_FIELDS)
    }

    /// The packed word
    pub fn key(&self) -> u32 {
        self.0
    }

    pub fn rich(&self) -> RichDetector {
        RichDetector::from_index(self.0 >> fields::RICH_SHIFT)
    }

    pub fn side(&self) -> Side {
        Side::from_index(self.0 >> fields::SIDE_SHIFT)
    }

    pub fn pd_type(&self) -> PdType {
        if (self.0 >> fields::PD_TYPE_SHIFT) & 1 == 0 {
            PdType::Hpd
        } else {
            PdType::MaPmt
        }
    }

    pub fn pd_col(&self) -> u32 {
        (self.0 >> fields::PD_COL_SHIFT) & fields::PD_COL_MASK
    }

    pub fn pd_num_in_col(&self) -> u32 {
        (self.0 >> fields::PD_NUM_IN_COL_SHIFT) & fields::PD_NUM_IN_COL_MASK
    }

    pub fn pixel_row(&self) -> u32 {
        (self.0 >> fields::PIXEL_ROW_SHIFT) & fields::PIXEL_ROW_MASK
    }

    pub fn pixel_col(&self) -> u32 {
        (self.0 >> fields::PIXEL_COL_SHIFT) & fields::PIXEL_COL_MASK
    }

    pub fn pixel_sub_row(&self) -> u32 {
        (self.0 >> fields::PIXEL_SUB_ROW_SHIFT) & fields::PIXEL_SUB_ROW_MASK
    }

    pub fn pixel_sub_row_is_set(&self) -> bool {
        self.0 & fields::SUB_ROW_SET_BIT != 0
    }

    pub fn pixel_data_are_valid(&self) -> bool {
        self.0 & (fields::ROW_SET_BIT | fields::COL_SET_BIT) == fields::ROW_SET_BIT | fields::COL_SET_BIT
    }

    /// Detector, side and photodetector fields are all set
    pub fn is_valid(&self) -> bool {
        let mandatory = fields::PD_SET_BIT | fields::SIDE_SET_BIT | fields::RICH_SET_BIT;
        self.0 & mandatory == mandatory
    }

    /// Valid and carries a full pixel address
    pub fn is_valid_pixel(&self) -> bool {
        self.is_valid() && self.pixel_data_are_valid()
    }

    /// The pixel part of a pixel identifier
    pub fn pixel(&self) -> Option<PixelAddress> {
        if !self.pixel_data_are_valid() {
            return None;
        }
        Some(PixelAddress {
            row: self.pixel_row() as u8,
            col: self.pixel_col() as u8,
            sub_row: self
                .pixel_sub_row_is_set()
                .then(|| self.pixel_sub_row() as u8),
        })
    }

    /// Set the pixel row; returns false and leaves the id unchanged if out of range
    pub fn set_pixel_row(&mut self, row: u32) -> bool {
        if row > fields::PIXEL_ROW_MASK {
            return false;
        }
        self.0 = (self.0 & !(fields::PIXEL_ROW_MASK << fields::PIXEL_ROW_SHIFT))
            | (row << fields::PIXEL_ROW_SHIFT)
            | fields::ROW_SET_BIT;
        true
    }

    /// Set the pixel column; returns false and leaves the id unchanged if out of range
    pub fn set_pixel_col(&mut self, col: u32) -> bool {
        if col > fields::PIXEL_COL_MASK {
            return false;
        }
        self.0 = (self.0 & !(fields::PIXEL_COL_MASK << fields::PIXEL_COL_SHIFT))
            | (col << fields::PIXEL_COL_SHIFT)
            | fields::COL_SET_BIT;
        true
    }

    /// Set the pixel sub-row; returns false and leaves the id unchanged if out of range
    pub fn set_pixel_sub_row(&mut self, sub_row: u32) -> bool {
        if sub_row > fields::PIXEL_SUB_ROW_MASK {
            return false;
        }
        self.0 = (self.0 & !(fields::PIXEL_SUB_ROW_MASK << fields::PIXEL_SUB_ROW_SHIFT))
            | (sub_row << fields::PIXEL_SUB_ROW_SHIFT)
            | fields::SUB_ROW_SET_BIT;
        true
    }

    /// Set the photodetector column; returns false if out of range
    pub fn set_pd_col(&mut self, col: u32) -> bool {
        if col > fields::PD_COL_MASK {
            return false;
        }
        self.0 = (self.0 & !(fields::PD_COL_MASK << fields::PD_COL_SHIFT))
            | (col << fields::PD_COL_SHIFT);
        true
    }

    /// Set the photodetector number in its column; returns false if out of range
    pub fn set_pd_num_in_col(&mut self, num: u32) -> bool {
        if num > fields::PD_NUM_IN_COL_MASK {
            return false;
        }
        self.0 = (self.0 & !(fields::PD_NUM_IN_COL_MASK << fields::PD_NUM_IN_COL_SHIFT))
            | (num << fields::PD_NUM_IN_COL_SHIFT);
        true
    }

    /// Hex and bit dump, for diagnostics
    pub fn dump(&self) -> String {
        bit_dump(self.0 as u64, 32)
    }
}

impl fmt::Display for RichSmartID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "{{ undefined 0x{:08X} }}", self.0);
        }
        write!(
            f,
            "{{ {} side {} {:?} PD [{},{}]",
            self.rich(),
            self.side().index(),
            self.pd_type(),
            self.pd_col(),
            self.pd_num_in_col()
        )?;
        if self.pixel_data_are_valid() {
            write!(f, " pixel [{},{}]", self.pixel_row(), self.pixel_col())?;
            if self.pixel_sub_row_is_set() {
                write!(f, " sub-row {}", self.pixel_sub_row())?;
            }
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pd_fields() {
        let pd = RichSmartID::pd(RichDetector::Rich2, Side::Second, PdType::MaPmt, 17, 9);
        assert!(pd.is_valid());
        assert!(!pd.pixel_data_are_valid());
        assert_eq!(pd.rich(), RichDetector::Rich2);
        assert_eq!(pd.side(), Side::Second);
        assert_eq!(pd.pd_type(), PdType::MaPmt);
        assert_eq!(pd.pd_col(), 17);
        assert_eq!(pd.pd_num_in_col(), 9);
        assert_eq!(pd.pixel(), None);
    }

    #[test]
    fn test_pixel_fields() {
        let pd = RichSmartID::pd(RichDetector::Rich1, Side::First, PdType::Hpd, 3, 4);
        let pix = pd.with_pixel(PixelAddress::with_sub_row(31, 7, 5));
        assert!(pix.is_valid_pixel());
        assert_eq!(pix.pd_id(), pd);
        assert_eq!(pix.pixel_row(), 31);
        assert_eq!(pix.pixel_col(), 7);
        assert_eq!(pix.pixel_sub_row(), 5);
        assert_eq!(pix.pixel(), Some(PixelAddress::with_sub_row(31, 7, 5)));
    }

    #[test]
    fn test_undefined() {
        let id = RichSmartID::default();
        assert_eq!(id, RichSmartID::undefined());
        assert!(!id.is_valid());
        assert_eq!(id.key(), 0);
    }

    #[test]
    fn test_setters_leave_value_on_failure() {
        let pd = RichSmartID::pd(RichDetector::Rich1, Side::First, PdType::Hpd, 0, 0);
        let mut pix = pd.with_pixel(PixelAddress::new(1, 2));
        let before = pix;
        assert!(!pix.set_pixel_row(32));
        assert!(!pix.set_pixel_col(40));
        assert!(!pix.set_pixel_sub_row(8));
        assert_eq!(pix, before);
        assert!(pix.set_pixel_row(30));
        assert_eq!(pix.pixel_row(), 30);
    }

    #[test]
    fn test_ordering_is_bitwise() {
        let a = RichSmartID::new(10);
        let b = RichSmartID::new(11);
        assert!(a < b);
        let pd = RichSmartID::pd(RichDetector::Rich1, Side::First, PdType::Hpd, 0, 0);
        assert!(pd.with_pixel(PixelAddress::new(0, 1)) < pd.with_pixel(PixelAddress::new(1, 0)));
    }

    #[test]
    fn test_alice_row_conversion() {
        let pix = PixelAddress::from_alice_row(8 * 3 + 6, 12);
        assert_eq!(pix, PixelAddress::with_sub_row(3, 12, 6));
        assert_eq!(pix.readout_row(true), 30);
        assert_eq!(pix.readout_row(false), 3);
    }
}
