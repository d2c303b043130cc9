// Per-photodetector data blocks. Every bank version except MaPMT0 ships each PD as
// header word(s), a pixel body and, for LHCb4/LHCb5, a parity footer. The LHCbN
// versions only differ in their header layout, so they share one codec driven by a
// static format table; FlatList has its own block layout.
use bitvec::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use super::constants::{
    ALICE_SUB_PIXELS, COLUMNS_PER_ZS_BLOCK, PIXEL_ROWS_ALICE_MODE, PIXEL_ROWS_LHCB_MODE,
    ZS_BLOCKS_PER_ROW,
};
use super::error::PDBankError;
use super::hardware_id::{EventID, Level0ID};
use super::raw_bank::BankVersion;
use super::smart_id::{PixelAddress, RichSmartID};

/// Bit layout shared by every LHCbN header and the FlatList header
mod constants {
    pub const LEVEL0_SHIFT: u32 = 0;
    pub const LEVEL0_MASK: u32 = 0x3FF;
    pub const COUNT_SHIFT: u32 = 10;
    pub const COUNT_MASK: u32 = 0x3FF;
    pub const ALICE_BIT: u32 = 1 << 30;
    pub const ZS_BIT: u32 = 1 << 31;

    // Zero-suppressed entries
    pub const OCCUPANCY_MASK: u32 = 0xFF;
    pub const ADDRESS_SHIFT: u32 = 8;
    pub const LHCB_ADDRESS_MASK: u32 = 0xFF;
    pub const ALICE_ADDRESS_MASK: u32 = 0x3FF;
    pub const ALICE_ENTRY_MASK: u32 = 0x3FFFF;
    pub const HALF_WORD_SHIFT: u32 = 16;
    pub const HALF_WORD_MASK: u32 = 0xFFFF;

    // FlatList hit entries
    pub const FLAT_COL_MASK: u32 = 0x1F;
    pub const FLAT_ROW_SHIFT: u32 = 5;
    pub const FLAT_ROW_MASK: u32 = 0x1F;
    pub const FLAT_SUB_ROW_SHIFT: u32 = 10;
    pub const FLAT_SUB_ROW_MASK: u32 = 0x7;
    pub const FLAT_SUB_ROW_SET_BIT: u32 = 1 << 13;
    pub const FLAT_ENTRY_MASK: u32 = 0x3FFF;
}

/// A bit field inside a PD header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField {
    pub word: usize,
    pub shift: u32,
    pub bits: u8,
}

impl HeaderField {
    const fn new(word: usize, shift: u32, bits: u8) -> Self {
        Self { word, shift, bits }
    }

    fn mask(&self) -> u32 {
        ((1u64 << self.bits) - 1) as u32
    }

    fn read(&self, words: &[u32]) -> u32 {
        (words[self.word] >> self.shift) & self.mask()
    }

    fn write(&self, words: &mut [u32], value: u32) {
        words[self.word] |= (value & self.mask()) << self.shift;
    }
}

/// Header layout of one LHCbN version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LhcbFormat {
    pub version: BankVersion,
    pub fixed_header_words: usize,
    pub has_alice_mode: bool,
    pub event_id: Option<HeaderField>,
    pub extended_words: Option<HeaderField>,
    pub parity_footer: bool,
}

pub const LHCB0_FORMAT: LhcbFormat = LhcbFormat {
    version: BankVersion::LHCb0,
    fixed_header_words: 1,
    has_alice_mode: false,
    event_id: None,
    extended_words: None,
    parity_footer: false,
};

pub const LHCB1_FORMAT: LhcbFormat = LhcbFormat {
    version: BankVersion::LHCb1,
    has_alice_mode: true,
    ..LHCB0_FORMAT
};

pub const LHCB2_FORMAT: LhcbFormat = LhcbFormat {
    version: BankVersion::LHCb2,
    event_id: Some(HeaderField::new(0, 20, 8)),
    ..LHCB1_FORMAT
};

pub const LHCB3_FORMAT: LhcbFormat = LhcbFormat {
    version: BankVersion::LHCb3,
    extended_words: Some(HeaderField::new(0, 28, 2)),
    ..LHCB2_FORMAT
};

pub const LHCB4_FORMAT: LhcbFormat = LhcbFormat {
    version: BankVersion::LHCb4,
    parity_footer: true,
    ..LHCB3_FORMAT
};

pub const LHCB5_FORMAT: LhcbFormat = LhcbFormat {
    version: BankVersion::LHCb5,
    fixed_header_words: 2,
    has_alice_mode: true,
    event_id: Some(HeaderField::new(1, 0, 32)),
    extended_words: Some(HeaderField::new(0, 20, 4)),
    parity_footer: true,
};

/// The decoded header of one PD data block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PDHeader {
    /// All header words, extended words included
    pub words: Vec<u32>,
    pub level0_id: Level0ID,
    pub zero_suppressed: bool,
    pub alice_mode: bool,
    pub event_id: Option<EventID>,
    pub n_data_words: usize,
    pub n_extended_words: usize,
}

/// One PD's worth of decoded data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PDBlock {
    pub header: PDHeader,
    pub footer: Vec<u32>,
    pub pixels: Vec<PixelAddress>,
    /// Words consumed from the bank by this block
    pub n_total_words: usize,
    /// None when the format carries no parity
    pub parity_ok: Option<bool>,
    /// Declared and implied data sizes agree
    pub size_ok: bool,
    /// Zero-suppressed entries pointing outside the pixel matrix
    pub bad_addresses: usize,
    /// Set by formats where the raw data names the PD directly (MaPMT0)
    pub embedded_pd_id: Option<RichSmartID>,
}

impl PDBlock {
    pub fn n_total_words(&self) -> usize {
        self.n_total_words
    }

    /// Full pixel identifiers for the pixels of this block on the given PD
    pub fn smart_ids(&self, pd_id: RichSmartID) -> Vec<RichSmartID> {
        self.pixels.iter().map(|p| pd_id.with_pixel(*p)).collect()
    }
}

/// XOR parity over a run of words
pub fn parity_word(words: &[u32]) -> u32 {
    words.iter().fold(0, |acc, w| acc ^ w)
}

/// Encoder/decoder for the PD data blocks of one bank version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PDCodec {
    Lhcb(&'static LhcbFormat),
    FlatList,
}

impl PDCodec {
    /// The codec for a bank version. MaPMT0 banks have no PD blocks.
    pub fn for_version(version: BankVersion) -> Result<Self, PDBankError> {
        match version {
            BankVersion::LHCb0 => Ok(Self::Lhcb(&LHCB0_FORMAT)),
            BankVersion::LHCb1 => Ok(Self::Lhcb(&LHCB1_FORMAT)),
            BankVersion::LHCb2 => Ok(Self::Lhcb(&LHCB2_FORMAT)),
            BankVersion::LHCb3 => Ok(Self::Lhcb(&LHCB3_FORMAT)),
            BankVersion::LHCb4 => Ok(Self::Lhcb(&LHCB4_FORMAT)),
            BankVersion::LHCb5 => Ok(Self::Lhcb(&LHCB5_FORMAT)),
            BankVersion::FlatList => Ok(Self::FlatList),
            BankVersion::MaPMT0 => Err(PDBankError::NoPDBlocks(version)),
        }
    }

    pub fn version(&self) -> BankVersion {
        match self {
            Self::Lhcb(format) => format.version,
            Self::FlatList => BankVersion::FlatList,
        }
    }

    /// Decode the PD block starting at the first of `words`. Only as many words as the
    /// block declares are consumed; see `PDBlock::n_total_words`.
    pub fn decode(&self, words: &[u32]) -> Result<PDBlock, PDBankError> {
        match self {
            Self::Lhcb(format) => decode_lhcb(format, words),
            Self::FlatList => decode_flat_list(words),
        }
    }

    /// Encode one PD. Duplicate pixels are merged.
    pub fn encode(
        &self,
        level0: Level0ID,
        event_id: EventID,
        pixels: &[PixelAddress],
        zero_suppress_hit_cut: usize,
    ) -> Result<Vec<u32>, PDBankError> {
        let pixels: BTreeSet<PixelAddress> = pixels.iter().copied().collect();
        if let Some(bad) = pixels.iter().find(|p| !p.is_in_range()) {
            return Err(PDBankError::PixelOutOfRange(bad.row, bad.col));
        }
        match self {
            Self::Lhcb(format) => {
                encode_lhcb(format, level0, event_id, &pixels, zero_suppress_hit_cut)
            }
            Self::FlatList => encode_flat_list(level0, &pixels),
        }
    }
}

fn require(words: &[u32], needed: usize) -> Result<(), PDBankError> {
    if words.len() < needed {
        return Err(PDBankError::TooShort {
            needed,
            available: words.len(),
        });
    }
    Ok(())
}

fn pixel_rows(alice_mode: bool) -> usize {
    if alice_mode {
        PIXEL_ROWS_ALICE_MODE as usize
    } else {
        PIXEL_ROWS_LHCB_MODE as usize
    }
}

fn decode_lhcb(format: &LhcbFormat, words: &[u32]) -> Result<PDBlock, PDBankError> {
    require(words, format.fixed_header_words)?;
    let first = words[0];
    let n_extended = format
        .extended_words
        .map_or(0, |field| field.read(words) as usize);
    let n_header = format.fixed_header_words + n_extended;
    let n_data = ((first >> constants::COUNT_SHIFT) & constants::COUNT_MASK) as usize;
    let n_footer = usize::from(format.parity_footer);
    let n_total = n_header + n_data + n_footer;
    require(words, n_total)?;

    let zero_suppressed = first & constants::ZS_BIT != 0;
    let alice_mode = format.has_alice_mode && first & constants::ALICE_BIT != 0;
    let header = PDHeader {
        words: words[..n_header].to_vec(),
        level0_id: Level0ID::new((first >> constants::LEVEL0_SHIFT) & constants::LEVEL0_MASK),
        zero_suppressed,
        alice_mode,
        event_id: format
            .event_id
            .map(|field| EventID::new(field.read(words) as u64, field.bits)),
        n_data_words: n_data,
        n_extended_words: n_extended,
    };

    let data = &words[n_header..n_header + n_data];
    let (pixels, bad_addresses) = if zero_suppressed {
        decode_zero_suppressed(data, alice_mode)
    } else {
        (decode_bitmap(data, alice_mode), 0)
    };
    let size_ok = zero_suppressed || n_data == pixel_rows(alice_mode);

    let footer = words[n_header + n_data..n_total].to_vec();
    let parity_ok = format
        .parity_footer
        .then(|| footer[0] == parity_word(&words[..n_header + n_data]));

    Ok(PDBlock {
        header,
        footer,
        pixels,
        n_total_words: n_total,
        parity_ok,
        size_ok,
        bad_addresses,
        embedded_pd_id: None,
    })
}

fn to_pixel(readout_row: u32, col: u32, alice_mode: bool) -> PixelAddress {
    if alice_mode {
        PixelAddress::from_alice_row(readout_row, col)
    } else {
        PixelAddress::new(readout_row as u8, col as u8)
    }
}

/// One word per readout row, bit c set for a hit in column c
fn decode_bitmap(data: &[u32], alice_mode: bool) -> Vec<PixelAddress> {
    let mut pixels = Vec::new();
    for (row, word) in data.iter().take(pixel_rows(alice_mode)).enumerate() {
        for col in word.view_bits::<Lsb0>().iter_ones() {
            pixels.push(to_pixel(row as u32, col as u32, alice_mode));
        }
    }
    pixels
}

/// Zero-suppressed entries: occupancy byte plus address (readout_row * 4 + block).
/// Two 16-bit entries per word in LHCb mode, one entry per word in ALICE mode.
fn decode_zero_suppressed(data: &[u32], alice_mode: bool) -> (Vec<PixelAddress>, usize) {
    let mut pixels = Vec::new();
    let mut bad_addresses = 0;
    let entries: Vec<(u32, bool)> = if alice_mode {
        data.iter()
            .map(|w| (*w, w & !constants::ALICE_ENTRY_MASK == 0))
            .collect()
    } else {
        data.iter()
            .flat_map(|w| {
                [
                    (w & constants::HALF_WORD_MASK, true),
                    (w >> constants::HALF_WORD_SHIFT, true),
                ]
            })
            .collect()
    };
    let address_mask = if alice_mode {
        constants::ALICE_ADDRESS_MASK
    } else {
        constants::LHCB_ADDRESS_MASK
    };
    let n_rows = pixel_rows(alice_mode) as u32;

    for (entry, clean) in entries {
        let occupancy = entry & constants::OCCUPANCY_MASK;
        if occupancy == 0 {
            continue;
        }
        let address = (entry >> constants::ADDRESS_SHIFT) & address_mask;
        let row = address / ZS_BLOCKS_PER_ROW;
        let block = address % ZS_BLOCKS_PER_ROW;
        if !clean || row >= n_rows {
            bad_addresses += 1;
            continue;
        }
        for bit in occupancy.view_bits::<Lsb0>()[..COLUMNS_PER_ZS_BLOCK as usize].iter_ones() {
            let col = block * COLUMNS_PER_ZS_BLOCK + bit as u32;
            pixels.push(to_pixel(row, col, alice_mode));
        }
    }
    (pixels, bad_addresses)
}

fn pixel_mode(pixels: &BTreeSet<PixelAddress>) -> Result<bool, PDBankError> {
    let n_alice = pixels.iter().filter(|p| p.sub_row.is_some()).count();
    if n_alice != 0 && n_alice != pixels.len() {
        return Err(PDBankError::MixedPixelModes);
    }
    Ok(n_alice != 0)
}

fn encode_lhcb(
    format: &LhcbFormat,
    level0: Level0ID,
    event_id: EventID,
    pixels: &BTreeSet<PixelAddress>,
    zero_suppress_hit_cut: usize,
) -> Result<Vec<u32>, PDBankError> {
    let alice_mode = pixel_mode(pixels)?;
    if alice_mode && !format.has_alice_mode {
        return Err(PDBankError::AliceModeUnsupported(format.version));
    }
    let n_rows = pixel_rows(alice_mode);

    let mut occupancy: BTreeMap<u32, u32> = BTreeMap::new();
    for pixel in pixels {
        let address = pixel.readout_row(alice_mode) * ZS_BLOCKS_PER_ROW
            + pixel.col as u32 / COLUMNS_PER_ZS_BLOCK;
        *occupancy.entry(address).or_default() |= 1 << (pixel.col as u32 % COLUMNS_PER_ZS_BLOCK);
    }
    let entries: Vec<u32> = occupancy
        .into_iter()
        .map(|(address, bits)| (address << constants::ADDRESS_SHIFT) | bits)
        .collect();
    let zs_words = if alice_mode {
        entries.len()
    } else {
        entries.len().div_ceil(2)
    };
    let zero_suppressed = pixels.len() <= zero_suppress_hit_cut && zs_words <= n_rows;

    let data: Vec<u32> = if zero_suppressed {
        if alice_mode {
            entries
        } else {
            entries
                .chunks(2)
                .map(|pair| pair[0] | pair.get(1).map_or(0, |e| e << constants::HALF_WORD_SHIFT))
                .collect()
        }
    } else {
        let mut bitmap = vec![0u32; n_rows];
        for pixel in pixels {
            bitmap[pixel.readout_row(alice_mode) as usize]
                .view_bits_mut::<Lsb0>()
                .set(pixel.col as usize, true);
        }
        bitmap
    };

    let mut words = vec![0u32; format.fixed_header_words];
    words[0] = (level0.data() << constants::LEVEL0_SHIFT)
        | ((data.len() as u32 & constants::COUNT_MASK) << constants::COUNT_SHIFT);
    if zero_suppressed {
        words[0] |= constants::ZS_BIT;
    }
    if alice_mode {
        words[0] |= constants::ALICE_BIT;
    }
    if let Some(field) = format.event_id {
        field.write(&mut words, event_id.data() as u32);
    }
    words.extend(data);
    if format.parity_footer {
        words.push(parity_word(&words));
    }
    Ok(words)
}

fn decode_flat_list(words: &[u32]) -> Result<PDBlock, PDBankError> {
    require(words, 1)?;
    let first = words[0];
    let n_hits = ((first >> constants::COUNT_SHIFT) & constants::COUNT_MASK) as usize;
    let n_data = n_hits.div_ceil(2);
    let n_total = 1 + n_data;
    require(words, n_total)?;

    let entries: Vec<u32> = words[1..n_total]
        .iter()
        .flat_map(|w| [w & constants::HALF_WORD_MASK, w >> constants::HALF_WORD_SHIFT])
        .collect();
    let mut bad_addresses = 0;
    let mut pixels = Vec::with_capacity(n_hits);
    for entry in &entries[..n_hits] {
        if entry & !constants::FLAT_ENTRY_MASK != 0 {
            bad_addresses += 1;
            continue;
        }
        let row = ((entry >> constants::FLAT_ROW_SHIFT) & constants::FLAT_ROW_MASK) as u8;
        let col = (entry & constants::FLAT_COL_MASK) as u8;
        if entry & constants::FLAT_SUB_ROW_SET_BIT != 0 {
            let sub_row = ((entry >> constants::FLAT_SUB_ROW_SHIFT) & constants::FLAT_SUB_ROW_MASK) as u8;
            pixels.push(PixelAddress::with_sub_row(row, col, sub_row));
        } else {
            pixels.push(PixelAddress::new(row, col));
        }
    }
    // An odd hit count leaves the top half of the last word as padding
    let size_ok = entries[n_hits..].iter().all(|e| *e == 0);

    Ok(PDBlock {
        header: PDHeader {
            words: vec![first],
            level0_id: Level0ID::new((first >> constants::LEVEL0_SHIFT) & constants::LEVEL0_MASK),
            zero_suppressed: true,
            alice_mode: pixels.iter().any(|p| p.sub_row.is_some()),
            event_id: None,
            n_data_words: n_data,
            n_extended_words: 0,
        },
        footer: Vec::new(),
        pixels,
        n_total_words: n_total,
        parity_ok: None,
        size_ok,
        bad_addresses,
        embedded_pd_id: None,
    })
}

fn encode_flat_list(level0: Level0ID, pixels: &BTreeSet<PixelAddress>) -> Result<Vec<u32>, PDBankError> {
    if pixels.len() > constants::COUNT_MASK as usize {
        return Err(PDBankError::TooManyHits(pixels.len()));
    }
    let entries: Vec<u32> = pixels
        .iter()
        .map(|p| {
            let mut entry = (p.col as u32 & constants::FLAT_COL_MASK)
                | ((p.row as u32 & constants::FLAT_ROW_MASK) << constants::FLAT_ROW_SHIFT);
            if let Some(sub_row) = p.sub_row {
                entry |= ((sub_row as u32 % ALICE_SUB_PIXELS) << constants::FLAT_SUB_ROW_SHIFT)
                    | constants::FLAT_SUB_ROW_SET_BIT;
            }
            entry
        })
        .collect();
    let mut words = Vec::with_capacity(1 + entries.len().div_ceil(2));
    words.push(
        (level0.data() << constants::LEVEL0_SHIFT)
            | ((pixels.len() as u32) << constants::COUNT_SHIFT),
    );
    words.extend(
        entries
            .chunks(2)
            .map(|pair| pair[0] | pair.get(1).map_or(0, |e| e << constants::HALF_WORD_SHIFT)),
    );
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lhcb_pixels() -> Vec<PixelAddress> {
        vec![
            PixelAddress::new(0, 0),
            PixelAddress::new(0, 9),
            PixelAddress::new(5, 31),
            PixelAddress::new(17, 8),
            PixelAddress::new(17, 15),
            PixelAddress::new(31, 16),
        ]
    }

    fn alice_pixels() -> Vec<PixelAddress> {
        vec![
            PixelAddress::with_sub_row(0, 1, 0),
            PixelAddress::with_sub_row(0, 1, 7),
            PixelAddress::with_sub_row(12, 30, 3),
            PixelAddress::with_sub_row(31, 31, 7),
        ]
    }

    fn sorted(mut pixels: Vec<PixelAddress>) -> Vec<PixelAddress> {
        pixels.sort();
        pixels
    }

    #[test]
    fn test_lhcb_round_trip_both_encodings() {
        let pixels = lhcb_pixels();
        let l0 = Level0ID::new(77);
        for version in [
            BankVersion::LHCb0,
            BankVersion::LHCb1,
            BankVersion::LHCb2,
            BankVersion::LHCb3,
            BankVersion::LHCb4,
            BankVersion::LHCb5,
        ] {
            let codec = PDCodec::for_version(version).unwrap();
            // cut of 100 -> zero suppressed, cut of 0 -> bitmap
            for (cut, expect_zs) in [(100, true), (0, false)] {
                let words = codec.encode(l0, EventID::new(9, 32), &pixels, cut).unwrap();
                let block = codec.decode(&words).unwrap();
                assert_eq!(block.header.zero_suppressed, expect_zs, "{version:?}");
                assert_eq!(block.header.level0_id, l0);
                assert_eq!(block.n_total_words(), words.len());
                assert_eq!(sorted(block.pixels.clone()), sorted(pixels.clone()));
                assert!(block.size_ok);
                assert_eq!(block.bad_addresses, 0);
            }
        }
    }

    #[test]
    fn test_alice_round_trip() {
        let pixels = alice_pixels();
        for version in [BankVersion::LHCb1, BankVersion::LHCb4, BankVersion::LHCb5] {
            let codec = PDCodec::for_version(version).unwrap();
            for cut in [100, 0] {
                let words = codec
                    .encode(Level0ID::new(3), EventID::default(), &pixels, cut)
                    .unwrap();
                let block = codec.decode(&words).unwrap();
                assert!(block.header.alice_mode);
                assert_eq!(sorted(block.pixels), sorted(pixels.clone()));
            }
        }
    }

    #[test]
    fn test_alice_unsupported_in_lhcb0() {
        let codec = PDCodec::for_version(BankVersion::LHCb0).unwrap();
        assert!(matches!(
            codec.encode(Level0ID::new(0), EventID::default(), &alice_pixels(), 10),
            Err(PDBankError::AliceModeUnsupported(BankVersion::LHCb0))
        ));
    }

    #[test]
    fn test_mixed_modes_rejected() {
        let codec = PDCodec::for_version(BankVersion::LHCb5).unwrap();
        let mut pixels = alice_pixels();
        pixels.push(PixelAddress::new(3, 3));
        assert!(matches!(
            codec.encode(Level0ID::new(0), EventID::default(), &pixels, 10),
            Err(PDBankError::MixedPixelModes)
        ));
    }

    #[test]
    fn test_empty_pd_is_header_only() {
        let codec = PDCodec::for_version(BankVersion::LHCb2).unwrap();
        let words = codec.encode(Level0ID::new(12), EventID::new(1, 8), &[], 96).unwrap();
        assert_eq!(words.len(), 1);
        let block = codec.decode(&words).unwrap();
        assert!(block.header.zero_suppressed);
        assert_eq!(block.header.n_data_words, 0);
        assert!(block.pixels.is_empty());

        let codec = PDCodec::for_version(BankVersion::LHCb5).unwrap();
        let words = codec.encode(Level0ID::new(12), EventID::new(1, 8), &[], 96).unwrap();
        let block = codec.decode(&words).unwrap();
        assert_eq!(block.header.n_data_words, 0);
        assert_eq!(block.parity_ok, Some(true));
        assert!(block.pixels.is_empty());
    }

    #[test]
    fn test_hit_cut_forces_bitmap() {
        let codec = PDCodec::for_version(BankVersion::LHCb3).unwrap();
        let pixels = lhcb_pixels();
        let words = codec
            .encode(Level0ID::new(1), EventID::default(), &pixels, pixels.len() - 1)
            .unwrap();
        assert_eq!(words.len(), 1 + 32);
        let words = codec
            .encode(Level0ID::new(1), EventID::default(), &pixels, pixels.len())
            .unwrap();
        // 5 occupancy entries packed two per word
        assert_eq!(words.len(), 1 + 3);
    }

    #[test]
    fn test_zero_suppressed_layout() {
        let codec = PDCodec::for_version(BankVersion::LHCb2).unwrap();
        let pixels = [PixelAddress::new(2, 10), PixelAddress::new(2, 12)];
        let words = codec
            .encode(Level0ID::new(0x155), EventID::new(0xAB, 8), &pixels, 96)
            .unwrap();
        let expected_header: u32 = 0x155 | (1 << 10) | (0xAB << 20) | (1 << 31);
        assert_eq!(words[0], expected_header);
        // row 2, block 1 -> address 9, columns 10 and 12 -> bits 2 and 4
        assert_eq!(words[1], (9 << 8) | 0b1_0100);
        let block = codec.decode(&words).unwrap();
        assert_eq!(block.header.event_id.unwrap().data(), 0xAB);
    }

    #[test]
    fn test_parity_failure_detected() {
        let codec = PDCodec::for_version(BankVersion::LHCb4).unwrap();
        let mut words = codec
            .encode(Level0ID::new(1), EventID::new(2, 8), &lhcb_pixels(), 96)
            .unwrap();
        words[1] ^= 0x0100_0000;
        let block = codec.decode(&words).unwrap();
        assert_eq!(block.parity_ok, Some(false));
    }

    #[test]
    fn test_extended_header_words_skipped() {
        let codec = PDCodec::for_version(BankVersion::LHCb3).unwrap();
        let mut words = codec
            .encode(Level0ID::new(4), EventID::new(2, 8), &lhcb_pixels(), 96)
            .unwrap();
        // declare two extended words and splice them in after the header
        words[0] |= 2 << 28;
        words.splice(1..1, [0xFFFF_FFFF, 0xFFFF_FFFF]);
        let block = codec.decode(&words).unwrap();
        assert_eq!(block.header.n_extended_words, 2);
        assert_eq!(block.header.words.len(), 3);
        assert_eq!(sorted(block.pixels), sorted(lhcb_pixels()));
    }

    #[test]
    fn test_bitmap_size_mismatch() {
        let codec = PDCodec::for_version(BankVersion::LHCb2).unwrap();
        // non zero-suppressed, declaring only 2 rows
        let words = [(2 << 10) | 5, 0b11, 0b100];
        let block = codec.decode(&words).unwrap();
        assert!(!block.size_ok);
        assert_eq!(block.pixels.len(), 3);
        assert_eq!(block.n_total_words(), 3);
    }

    #[test]
    fn test_truncated_block() {
        let codec = PDCodec::for_version(BankVersion::LHCb2).unwrap();
        let words = [(4 << 10) | (1 << 31), 0x0101];
        assert!(matches!(
            codec.decode(&words),
            Err(PDBankError::TooShort {
                needed: 5,
                available: 2
            })
        ));
        assert!(matches!(
            codec.decode(&[]),
            Err(PDBankError::TooShort { .. })
        ));
    }

    #[test]
    fn test_bad_zero_suppressed_address() {
        let codec = PDCodec::for_version(BankVersion::LHCb2).unwrap();
        // address 200 -> row 50, outside the 32 row matrix
        let words = [(1 << 10) | (1 << 31), (200 << 8) | 0x1];
        let block = codec.decode(&words).unwrap();
        assert_eq!(block.bad_addresses, 1);
        assert!(block.pixels.is_empty());
    }

    #[test]
    fn test_flat_list_round_trip() {
        let codec = PDCodec::for_version(BankVersion::FlatList).unwrap();
        for pixels in [lhcb_pixels(), alice_pixels()] {
            let words = codec
                .encode(Level0ID::new(900), EventID::default(), &pixels, 0)
                .unwrap();
            assert_eq!(words.len(), 1 + pixels.len().div_ceil(2));
            let block = codec.decode(&words).unwrap();
            assert_eq!(block.header.level0_id, Level0ID::new(900));
            assert!(block.size_ok);
            assert_eq!(sorted(block.pixels), sorted(pixels));
        }
    }

    #[test]
    fn test_flat_list_padding_checked() {
        let codec = PDCodec::for_version(BankVersion::FlatList).unwrap();
        let words = [1 << 10, 0x0042_0021];
        let block = codec.decode(&words).unwrap();
        assert_eq!(block.pixels.len(), 1);
        assert!(!block.size_ok);
    }

    #[test]
    fn test_duplicates_merged() {
        let codec = PDCodec::for_version(BankVersion::LHCb5).unwrap();
        let pixels = [PixelAddress::new(1, 1), PixelAddress::new(1, 1)];
        let block = codec
            .decode(&codec.encode(Level0ID::new(0), EventID::default(), &pixels, 96).unwrap())
            .unwrap();
        assert_eq!(block.pixels, vec![PixelAddress::new(1, 1)]);
    }

    #[test]
    fn test_no_codec_for_mapmt() {
        assert!(matches!(
            PDCodec::for_version(BankVersion::MaPMT0),
            Err(PDBankError::NoPDBlocks(BankVersion::MaPMT0))
        ));
    }
}
