use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use super::constants::{BYTES_PER_WORD, CENTRAL_TAE_LOCATION, RAW_BANK_HEADER_WORDS, RAW_BANK_MAGIC};
use super::error::RawBankError;

/// Raw bank framing (two header words)
mod constants {
    pub const MAGIC_MASK: u32 = 0xFFFF;
    pub const SIZE_SHIFT: u32 = 16;
    pub const TYPE_MASK: u32 = 0xFF;
    pub const VERSION_SHIFT: u32 = 8;
    pub const VERSION_MASK: u32 = 0xFF;
    pub const SOURCE_SHIFT: u32 = 16;
    pub const SOURCE_MASK: u32 = 0xFFFF;
}

/// The wire format of a RICH L1 bank. Stored in the raw bank header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BankVersion {
    LHCb0,
    LHCb1,
    LHCb2,
    LHCb3,
    LHCb4,
    LHCb5,
    FlatList,
    MaPMT0,
}

impl BankVersion {
    pub const ALL: [BankVersion; 8] = [
        Self::LHCb0,
        Self::LHCb1,
        Self::LHCb2,
        Self::LHCb3,
        Self::LHCb4,
        Self::LHCb5,
        Self::FlatList,
        Self::MaPMT0,
    ];

    /// The version code written into the raw bank header
    pub fn code(&self) -> u8 {
        match self {
            Self::LHCb0 => 0,
            Self::LHCb1 => 1,
            Self::LHCb2 => 2,
            Self::LHCb3 => 3,
            Self::LHCb4 => 4,
            Self::LHCb5 => 5,
            Self::FlatList => 30,
            Self::MaPMT0 => 40,
        }
    }

    /// Versions from LHCb3 on carry one L1 ingress header per active ingress
    pub fn has_ingress_headers(&self) -> bool {
        matches!(self, Self::LHCb3 | Self::LHCb4 | Self::LHCb5)
    }
}

impl TryFrom<u8> for BankVersion {
    type Error = RawBankError;
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|version| version.code() == code)
            .ok_or(RawBankError::UnknownVersion(code))
    }
}

/// One raw bank: a typed, versioned block of 32-bit words from a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBank {
    pub magic: u16,
    pub bank_type: u8,
    pub version: u8,
    pub source_id: u16,
    pub data: Vec<u32>,
}

impl RawBank {
    /// Create a bank with the correct magic pattern
    pub fn new(bank_type: u8, version: u8, source_id: u16, data: Vec<u32>) -> Self {
        Self {
            magic: RAW_BANK_MAGIC,
            bank_type,
            version,
            source_id,
            data,
        }
    }

    pub fn is_magic_valid(&self) -> bool {
        self.magic == RAW_BANK_MAGIC
    }

    /// Body size in bytes, as written in the header
    pub fn size_bytes(&self) -> usize {
        self.data.len() * BYTES_PER_WORD
    }

    /// The header plus body as words
    pub fn to_words(&self) -> Result<Vec<u32>, RawBankError> {
        let size = self.size_bytes();
        if size > u16::MAX as usize {
            return Err(RawBankError::BankTooLarge(self.data.len()));
        }
        let mut words = Vec::with_capacity(self.data.len() + RAW_BANK_HEADER_WORDS);
        words.push(((size as u32) << constants::SIZE_SHIFT) | self.magic as u32);
        words.push(
            ((self.source_id as u32) << constants::SOURCE_SHIFT)
                | ((self.version as u32) << constants::VERSION_SHIFT)
                | self.bank_type as u32,
        );
        words.extend_from_slice(&self.data);
        Ok(words)
    }

    /// Read one bank (header + body) from a little-endian word stream
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, RawBankError> {
        let first = reader.read_u32::<LittleEndian>()?;
        let second = reader.read_u32::<LittleEndian>()?;
        let size = (first >> constants::SIZE_SHIFT) as u16;
        if size as usize % BYTES_PER_WORD != 0 {
            return Err(RawBankError::BadBankSize(size));
        }
        let mut data = vec![0u32; size as usize / BYTES_PER_WORD];
        reader.read_u32_into::<LittleEndian>(&mut data)?;
        Ok(Self {
            magic: (first & constants::MAGIC_MASK) as u16,
            bank_type: (second & constants::TYPE_MASK) as u8,
            version: ((second >> constants::VERSION_SHIFT) & constants::VERSION_MASK) as u8,
            source_id: ((second >> constants::SOURCE_SHIFT) & constants::SOURCE_MASK) as u16,
            data,
        })
    }

    /// Write one bank (header + body) as little-endian words
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), RawBankError> {
        for word in self.to_words()? {
            writer.write_u32::<LittleEndian>(word)?;
        }
        Ok(())
    }

    /// Words taken by this bank including its header
    pub fn total_words(&self) -> usize {
        self.data.len() + RAW_BANK_HEADER_WORDS
    }
}

/// All raw banks of one event, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    banks: Vec<RawBank>,
}

impl RawEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bank(&mut self, bank: RawBank) {
        self.banks.push(bank);
    }

    pub fn banks(&self) -> &[RawBank] {
        &self.banks
    }

    /// All banks of a given type, in arrival order
    pub fn banks_of_type(&self, bank_type: u8) -> impl Iterator<Item = &RawBank> {
        self.banks.iter().filter(move |b| b.bank_type == bank_type)
    }

    pub fn total_words(&self) -> usize {
        self.banks.iter().map(|b| b.total_words()).sum()
    }
}

/// Where the decoder finds raw events. A plain RawEvent only has the central location;
/// time-alignment events also have time-offset copies (e.g. "Prev1", "Next1").
pub trait RawEventSource {
    fn raw_event(&self, location: &str) -> Option<&RawEvent>;
}

impl RawEventSource for RawEvent {
    fn raw_event(&self, location: &str) -> Option<&RawEvent> {
        if location == CENTRAL_TAE_LOCATION {
            Some(self)
        } else {
            None
        }
    }
}

/// A time-alignment event: several raw events keyed by time-offset location
#[derive(Debug, Clone, Default)]
pub struct TaeEvent {
    events: FxHashMap<String, RawEvent>,
}

impl TaeEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, location: &str, event: RawEvent) {
        self.events.insert(location.to_string(), event);
    }
}

impl RawEventSource for TaeEvent {
    fn raw_event(&self, location: &str) -> Option<&RawEvent> {
        self.events.get(location)
    }
}
