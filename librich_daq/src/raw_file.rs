use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use super::constants::BYTES_PER_WORD;
use super::error::RawFileError;
use super::raw_bank::{RawBank, RawEvent};

/// A file of raw events. Each event record is a word count followed by that many
/// words of back-to-back raw banks.
#[derive(Debug)]
pub struct RawFile {
    file_handle: BufReader<File>,
    file_path: PathBuf,
    size_bytes: u64,
    bytes_read: u64,
    bad_records: u64,
    is_eof: bool,
}

impl RawFile {
    /// Open a raw file for reading
    pub fn new(path: &Path) -> Result<Self, RawFileError> {
        if !path.exists() {
            return Err(RawFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Ok(Self {
            file_handle: BufReader::new(file),
            file_path: path.to_path_buf(),
            size_bytes,
            bytes_read: 0,
            bad_records: 0,
            is_eof: size_bytes == 0,
        })
    }

    /// Read the next event record.
    ///
    /// Returns `RawFileError::EndOfFile` once there are no more records. A bank that
    /// cannot be parsed ends its record only: the banks before it are returned and the
    /// record is counted in `get_bad_records`.
    pub fn get_next_event(&mut self) -> Result<RawEvent, RawFileError> {
        if self.is_eof {
            return Err(RawFileError::EndOfFile);
        }
        let n_words = match self.file_handle.read_u32::<LittleEndian>() {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.is_eof = true;
                return Err(RawFileError::EndOfFile);
            }
            Err(e) => return Err(RawFileError::IOError(e)),
        };
        self.bytes_read += BYTES_PER_WORD as u64;
        let n_bytes = n_words as u64 * BYTES_PER_WORD as u64;
        let remaining = self.size_bytes.saturating_sub(self.bytes_read);
        if n_bytes > remaining {
            // The stream cannot be resynchronised past a bad word count
            self.is_eof = true;
            return Err(RawFileError::BadRecordSize(n_words, remaining));
        }
        let mut record = vec![0u8; n_bytes as usize];
        self.file_handle.read_exact(&mut record)?;
        self.bytes_read += n_bytes;
        if self.bytes_read >= self.size_bytes {
            self.is_eof = true;
        }

        let mut event = RawEvent::new();
        let mut cursor = record.as_slice();
        while !cursor.is_empty() {
            match RawBank::read_from(&mut cursor) {
                Ok(bank) => event.add_bank(bank),
                Err(e) => {
                    spdlog::error!(
                        "Dropping the rest of a {n_words} word event record after {} banks: {e}",
                        event.banks().len()
                    );
                    self.bad_records += 1;
                    break;
                }
            }
        }
        Ok(event)
    }

    /// Records that held a bank which could not be parsed
    pub fn get_bad_records(&self) -> u64 {
        self.bad_records
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn get_bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn get_filename(&self) -> &Path {
        &self.file_path
    }

    pub fn is_eof(&self) -> bool {
        self.is_eof
    }
}

/// Writes event records in the RawFile layout
#[derive(Debug)]
pub struct RawFileWriter {
    file_handle: BufWriter<File>,
    events_written: u64,
}

impl RawFileWriter {
    pub fn new(path: &Path) -> Result<Self, RawFileError> {
        Ok(Self {
            file_handle: BufWriter::new(File::create(path)?),
            events_written: 0,
        })
    }

    pub fn write_event(&mut self, event: &RawEvent) -> Result<(), RawFileError> {
        self.file_handle
            .write_u32::<LittleEndian>(event.total_words() as u32)?;
        for bank in event.banks() {
            bank.write_to(&mut self.file_handle)?;
        }
        self.events_written += 1;
        Ok(())
    }

    pub fn get_events_written(&self) -> u64 {
        self.events_written
    }

    /// Flush and close the file
    pub fn close(mut self) -> Result<(), RawFileError> {
        self.file_handle.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RAW_BANK_MAGIC, RICH_BANK_TYPE};
    use crate::odin::Odin;

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join("librich_daq_raw_file_test.raw");
        let mut first = RawEvent::new();
        first.add_bank(Odin::new(1, 1, 10).to_bank());
        first.add_bank(RawBank::new(RICH_BANK_TYPE, 4, 1, vec![1, 2, 3]));
        let mut second = RawEvent::new();
        second.add_bank(RawBank::new(RICH_BANK_TYPE, 40, 2, vec![]));

        let mut writer = RawFileWriter::new(&path).unwrap();
        writer.write_event(&first).unwrap();
        writer.write_event(&second).unwrap();
        assert_eq!(writer.get_events_written(), 2);
        writer.close().unwrap();

        let mut file = RawFile::new(&path).unwrap();
        assert_eq!(file.get_next_event().unwrap(), first);
        assert_eq!(file.get_next_event().unwrap(), second);
        assert!(file.is_eof());
        assert!(matches!(file.get_next_event(), Err(RawFileError::EndOfFile)));
        std::fs::remove_file(&path).unwrap();
    }

    fn record_bytes(banks: &[Vec<u32>]) -> Vec<u8> {
        let words: Vec<u32> = banks.concat();
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(words.len() as u32).unwrap();
        for word in words {
            bytes.write_u32::<LittleEndian>(word).unwrap();
        }
        bytes
    }

    #[test]
    fn test_bad_bank_ends_only_its_record() {
        let path = std::env::temp_dir().join("librich_daq_raw_file_bad_bank.raw");
        let odin = Odin::new(1, 2, 3).to_bank();
        let rich = RawBank::new(RICH_BANK_TYPE, 4, 1, vec![7, 8]);
        // a body size of 6 bytes is not a whole number of words
        let bad = vec![(6 << 16) | RAW_BANK_MAGIC as u32, RICH_BANK_TYPE as u32 | (1 << 16), 0];

        let mut bytes = record_bytes(&[rich.to_words().unwrap()]);
        bytes.extend(record_bytes(&[odin.to_words().unwrap(), bad]));
        bytes.extend(record_bytes(&[rich.to_words().unwrap()]));
        std::fs::write(&path, &bytes).unwrap();

        let mut file = RawFile::new(&path).unwrap();
        assert_eq!(file.get_next_event().unwrap().banks(), &[rich.clone()]);
        assert_eq!(file.get_next_event().unwrap().banks(), &[odin]);
        assert_eq!(file.get_bad_records(), 1);
        assert_eq!(file.get_next_event().unwrap().banks(), &[rich]);
        assert!(matches!(file.get_next_event(), Err(RawFileError::EndOfFile)));
        assert_eq!(file.get_bytes_read(), bytes.len() as u64);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_word_count_past_end_of_file() {
        let path = std::env::temp_dir().join("librich_daq_raw_file_bad_count.raw");
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(0xFFFF_FFF0).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let mut file = RawFile::new(&path).unwrap();
        assert!(matches!(
            file.get_next_event(),
            Err(RawFileError::BadRecordSize(0xFFFF_FFF0, 4))
        ));
        assert!(file.is_eof());
        assert!(matches!(file.get_next_event(), Err(RawFileError::EndOfFile)));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/definitely/not/here.raw");
        assert!(matches!(RawFile::new(path), Err(RawFileError::BadFilePath(_))));
    }
}
