use std::path::PathBuf;
use thiserror::Error;

use super::constants::RAW_BANK_MAGIC;
use super::raw_bank::BankVersion;
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum CablingError {
    #[error("RichCabling failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("RichCabling failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("RichCabling found an invalid keyword: {0}")]
    BadKeyword(String),
    #[error("RichCabling was given a file with the incorrect format; most likely the number of columns is incorrect")]
    BadFileFormat,
    #[error("RichCabling found a photodetector position (column {0}, number {1}) outside the RichSmartID range")]
    BadPdPosition(u32, u32),
    #[error("RichCabling found Level0ID {0} more than once")]
    DuplicateLevel0(u32),
}

#[derive(Debug, Error)]
pub enum RawBankError {
    #[error("Failed to parse buffer into RawBank: {0}")]
    IOError(#[from] std::io::Error),
    #[error("RawBank declared a body of {0} bytes, which is not a whole number of words")]
    BadBankSize(u16),
    #[error("RawBank body of {0} words does not fit in the 16-bit size field")]
    BankTooLarge(usize),
    #[error("Unknown RICH bank version code {0}")]
    UnknownVersion(u8),
}

#[derive(Debug, Error)]
pub enum RawFileError {
    #[error("Error when parsing RawBank from RawFile: {0}")]
    BadBank(#[from] RawBankError),
    #[error("Could not open RawFile because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event record declared {0} words but only {1} bytes remain in the file")]
    BadRecordSize(u32, u64),
    #[error("Reached end of RawFile")]
    EndOfFile,
    #[error("RawFile failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Error)]
pub enum OdinError {
    #[error("Bank of type {0} is not an ODIN bank")]
    WrongBankType(u8),
    #[error("ODIN bank has {0} words; expected at least {exp}", exp=super::constants::ODIN_BANK_WORDS)]
    TooShort(usize),
}

#[derive(Debug, Clone, Error)]
pub enum PDBankError {
    #[error("PD data block needs {needed} words but only {available} remain")]
    TooShort { needed: usize, available: usize },
    #[error("Bank version {0:?} has no ALICE mode")]
    AliceModeUnsupported(BankVersion),
    #[error("PD hit list mixes ALICE mode sub-pixels with LHCb mode pixels")]
    MixedPixelModes,
    #[error("PD has {0} hits, more than the format can describe")]
    TooManyHits(usize),
    #[error("Pixel row {0} column {1} is outside of the photodetector")]
    PixelOutOfRange(u8, u8),
    #[error("Bank version {0:?} has no per-PD data blocks")]
    NoPDBlocks(BankVersion),
}

#[derive(Debug, Clone, Error)]
pub enum L1BankError {
    #[error("L1 bank failed due to PD data block error: {0}")]
    BadPDBlock(#[from] PDBankError),
    #[error("L1 bank has a second header for ingress {0}")]
    DuplicateIngress(u32),
    #[error("L1 bank has more than {0} PD data blocks")]
    TooManyInputs(u32),
}

#[derive(Debug, Clone, Error)]
pub enum BankDecodeError {
    #[error("Raw bank has magic pattern 0x{0:04X}; expected 0x{exp:04X}", exp=RAW_BANK_MAGIC)]
    BadMagic(u16),
    #[error("Raw bank has unknown RICH bank version {0}")]
    UnknownVersion(u8),
    #[error("Raw bank of type {0} is not a RICH bank")]
    WrongBankType(u8),
    #[error("Raw bank from board {board} is corrupted: {source}")]
    Corrupted { board: u32, source: L1BankError },
}

impl BankDecodeError {
    /// Short name used as the statistics key
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadMagic(_) => "bad_magic",
            Self::UnknownVersion(_) => "unknown_version",
            Self::WrongBankType(_) => "wrong_bank_type",
            Self::Corrupted { .. } => "corrupted_bank",
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Encoding failed due to PD data block error: {0}")]
    BadPDBlock(#[from] PDBankError),
    #[error("Encoding failed due to raw bank error: {0}")]
    BadBank(#[from] RawBankError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has max_hpd_occupancy of 0, which would suppress every PD")]
    ZeroOccupancy,
    #[error("Config hot pixel 0x{0:08X} is not a valid pixel RichSmartID")]
    BadHotPixel(u32),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to RichCabling error: {0}")]
    CablingError(#[from] CablingError),
    #[error("Processor failed due to RawFile error: {0}")]
    RawFileError(#[from] RawFileError),
    #[error("Processor failed due to RawBank error: {0}")]
    RawBankError(#[from] RawBankError),
    #[error("Processor failed due to Encode error: {0}")]
    EncodeError(#[from] EncodeError),
    #[error("Processor could not find input file {0:?}")]
    BadFilePath(PathBuf),
    #[error("Processor failed to parse hit list line {0}: {1}")]
    BadHitLine(usize, String),
    #[error("Processor failed to write YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
