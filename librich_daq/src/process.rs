use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::mpsc::Sender;

use super::cabling::RichCabling;
use super::config::Config;
use super::constants::CENTRAL_TAE_LOCATION;
use super::decoder::RawBankDecoder;
use super::encoder::RawBankEncoder;
use super::error::{ProcessorError, RawFileError};
use super::odin::Odin;
use super::raw_bank::{RawEvent, TaeEvent};
use super::raw_file::{RawFile, RawFileWriter};
use super::smart_id::RichSmartID;
use super::summary::DecodeSummary;
use super::worker_status::{Task, WorkerStatus};

const FLUSH_FRAC: f32 = 0.01;
/// Summary key for event records cut short by an unreadable bank
const BAD_RECORD_ERROR: &str = "bad_raw_bank";

/// One line of a hit list: `<event>[/<location>]: 0x........ 0x........`
pub fn format_hit_line(event: u64, location: &str, ids: &[RichSmartID]) -> String {
    let ids: Vec<String> = ids.iter().map(|id| format!("0x{:08X}", id.key())).collect();
    if location == CENTRAL_TAE_LOCATION {
        format!("{event}: {}", ids.join(" "))
    } else {
        format!("{event}/{location}: {}", ids.join(" "))
    }
}

/// Parse a line written by `format_hit_line`. The location is ignored.
pub fn parse_hit_line(line_number: usize, line: &str) -> Result<(u64, Vec<RichSmartID>), ProcessorError> {
    let bad_line = || ProcessorError::BadHitLine(line_number, line.to_string());
    let (prefix, body) = line.split_once(':').ok_or_else(bad_line)?;
    let event = prefix
        .split('/')
        .next()
        .and_then(|e| e.trim().parse::<u64>().ok())
        .ok_or_else(bad_line)?;
    let mut ids = Vec::new();
    for token in body.split_whitespace() {
        let digits = token.trim_start_matches("0x").trim_start_matches("0X");
        let word = u32::from_str_radix(digits, 16).map_err(|_| bad_line())?;
        ids.push(RichSmartID::new(word));
    }
    Ok((event, ids))
}

/// Read one TAE event: one record per location, in the configured order.
/// Returns None at the end of the file.
fn read_tae_event(raw_file: &mut RawFile, locations: &[String]) -> Result<Option<TaeEvent>, ProcessorError> {
    let mut tae = TaeEvent::new();
    for (idx, location) in locations.iter().enumerate() {
        match raw_file.get_next_event() {
            Ok(event) => tae.insert(location, event),
            Err(RawFileError::EndOfFile) => {
                if idx != 0 {
                    spdlog::warn!("File ended in the middle of a TAE event, dropping {idx} records");
                }
                return Ok(None);
            }
            Err(e) => return Err(ProcessorError::RawFileError(e)),
        }
    }
    Ok(Some(tae))
}

/// Decode a raw data file into a hit list, one line per event and TAE location, and
/// write the decode summary next to it.
pub fn process_decode(config: &Config, tx: &Sender<WorkerStatus>) -> Result<DecodeSummary, ProcessorError> {
    let cabling = RichCabling::new(config.cabling_path.as_deref())?;
    let mut decoder = RawBankDecoder::new(&cabling, config);
    let mut raw_file = RawFile::new(&config.input_path)?;
    let mut writer = BufWriter::new(File::create(&config.output_path)?);
    let locations = config.get_tae_locations();

    let total_size = raw_file.get_size_bytes();
    spdlog::info!(
        "Decoding {} with total size: {}",
        raw_file.get_filename().to_string_lossy(),
        human_bytes::human_bytes(total_size as f64)
    );
    let flush_val = (total_size as f64 * FLUSH_FRAC as f64) as u64;
    let mut last_flush = 0;
    let mut event_counter: u64 = 0;
    tx.send(WorkerStatus::new(0.0, 0, Task::Decode))?;

    while let Some(tae) = read_tae_event(&mut raw_file, &locations)? {
        let maps = decoder.decode_to_smart_ids(&tae, &locations);
        for location in locations.iter() {
            if let Some(map) = maps.get(location) {
                writeln!(writer, "{}", format_hit_line(event_counter, location, &map.smart_ids()))?;
            }
        }
        event_counter += 1;

        if raw_file.get_bytes_read() - last_flush > flush_val {
            last_flush = raw_file.get_bytes_read();
            tx.send(WorkerStatus::new(
                last_flush as f32 / total_size as f32,
                event_counter,
                Task::Decode,
            ))?;
        }
    }
    writer.flush()?;

    let mut summary = decoder.summary().clone();
    summary.add_structural_errors(BAD_RECORD_ERROR, raw_file.get_bad_records());
    let summary_path = config.get_summary_path();
    std::fs::write(&summary_path, serde_yaml::to_string(&summary)?)?;
    spdlog::info!("Wrote decode summary to {}", summary_path.to_string_lossy());
    summary.print();

    tx.send(WorkerStatus::new(1.0, event_counter, Task::Decode))?;
    spdlog::info!("Done decoding {event_counter} events.");
    Ok(summary)
}

/// Encode a hit list into a raw data file. Each event gets an ODIN bank carrying its
/// event number followed by one RICH bank per board.
pub fn process_encode(config: &Config, tx: &Sender<WorkerStatus>) -> Result<u64, ProcessorError> {
    if !config.input_path.exists() {
        return Err(ProcessorError::BadFilePath(config.input_path.clone()));
    }
    let cabling = RichCabling::new(config.cabling_path.as_deref())?;
    let encoder = RawBankEncoder::new(&cabling, config);
    let contents = std::fs::read_to_string(&config.input_path)?;
    let mut writer = RawFileWriter::new(&config.output_path)?;

    let lines: Vec<(usize, &str)> = contents
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    spdlog::info!(
        "Encoding {} events as {:?}",
        lines.len(),
        encoder.version()
    );
    let flush_val = ((lines.len() as f32 * FLUSH_FRAC) as usize).max(1);
    let mut skipped = 0;
    tx.send(WorkerStatus::new(0.0, 0, Task::Encode))?;

    for (count, (idx, line)) in lines.iter().enumerate() {
        let (event_number, ids) = parse_hit_line(idx + 1, line)?;
        let odin = Odin::new(0, event_number, 0);
        let mut event = RawEvent::new();
        event.add_bank(odin.to_bank());
        let report = encoder.fill_raw_event(&ids, &odin, &mut event)?;
        skipped += report.invalid_ids + report.unmapped_ids;
        writer.write_event(&event)?;

        if count % flush_val == 0 {
            tx.send(WorkerStatus::new(
                count as f32 / lines.len() as f32,
                count as u64,
                Task::Encode,
            ))?;
        }
    }
    let events_written = writer.get_events_written();
    writer.close()?;
    if skipped > 0 {
        spdlog::warn!("Skipped {skipped} identifiers that could not be encoded");
    }

    tx.send(WorkerStatus::new(1.0, events_written, Task::Encode))?;
    spdlog::info!("Done encoding {events_written} events.");
    Ok(events_written)
}

/// The function to be called by a separate thread (typically the UI).
pub fn process(config: Config, tx: Sender<WorkerStatus>, task: Task) -> Result<(), ProcessorError> {
    match task {
        Task::Decode => process_decode(&config, &tx).map(|_| ()),
        Task::Encode => process_encode(&config, &tx).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cabling::CablingLookup;
    use crate::hardware_id::Level0ID;
    use crate::raw_bank::BankVersion;
    use crate::smart_id::PixelAddress;
    use byteorder::{LittleEndian, WriteBytesExt};
    use std::path::PathBuf;
    use std::sync::mpsc::channel;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("librich_daq_process_{name}"))
    }

    #[test]
    fn test_hit_line() {
        let ids = [RichSmartID::new(0xE000_0001), RichSmartID::new(0x1A)];
        let line = format_hit_line(12, "", &ids);
        assert_eq!(line, "12: 0xE0000001 0x0000001A");
        let (event, parsed) = parse_hit_line(1, &line).unwrap();
        assert_eq!(event, 12);
        assert_eq!(parsed, ids.to_vec());

        let line = format_hit_line(3, "Prev1", &[]);
        assert_eq!(line, "3/Prev1: ");
        assert_eq!(parse_hit_line(1, &line).unwrap(), (3, Vec::new()));

        assert!(matches!(
            parse_hit_line(7, "no colon here"),
            Err(ProcessorError::BadHitLine(7, _))
        ));
        assert!(matches!(
            parse_hit_line(8, "1: 0xZZ"),
            Err(ProcessorError::BadHitLine(8, _))
        ));
    }

    #[test]
    fn test_encode_then_decode_file() {
        let cabling = RichCabling::new(None).unwrap();
        let pd_a = cabling.pd_id_from_level0(Level0ID::new(2)).unwrap();
        let pd_b = cabling.pd_id_from_level0(Level0ID::new(170)).unwrap();
        let events = [
            vec![
                pd_a.with_pixel(PixelAddress::new(0, 1)),
                pd_a.with_pixel(PixelAddress::new(5, 9)),
                pd_b.with_pixel(PixelAddress::new(31, 31)),
            ],
            vec![],
            vec![pd_b.with_pixel(PixelAddress::new(7, 7))],
        ];
        let hits_in = temp_path("hits_in.txt");
        let raw = temp_path("events.raw");
        let hits_out = temp_path("hits_out.txt");
        let contents: Vec<String> = events
            .iter()
            .enumerate()
            .map(|(i, ids)| format_hit_line(i as u64, "", ids))
            .collect();
        std::fs::write(&hits_in, contents.join("\n")).unwrap();

        let (tx, _rx) = channel();
        let encode_config = Config {
            input_path: hits_in.clone(),
            output_path: raw.clone(),
            bank_version: BankVersion::LHCb4,
            ..Default::default()
        };
        assert_eq!(process_encode(&encode_config, &tx).unwrap(), 3);

        let decode_config = Config {
            input_path: raw.clone(),
            output_path: hits_out.clone(),
            check_odin_event_ids: true,
            ..Default::default()
        };
        let summary = process_decode(&decode_config, &tx).unwrap();
        assert_eq!(summary.total_hits(), 4);
        assert!(summary.integrity_failures.is_empty());
        // the empty event has no RICH banks, so it does not count as decoded
        assert_eq!(summary.events, 2);

        let output = std::fs::read_to_string(&hits_out).unwrap();
        let decoded: Vec<Vec<RichSmartID>> = output
            .lines()
            .enumerate()
            .map(|(i, l)| parse_hit_line(i + 1, l).unwrap().1)
            .collect();
        assert_eq!(decoded.len(), 3);
        for (mut got, mut expected) in decoded.into_iter().zip(events.into_iter()) {
            got.sort();
            expected.sort();
            assert_eq!(got, expected);
        }
        assert!(decode_config.get_summary_path().exists());

        for path in [hits_in, raw, hits_out, decode_config.get_summary_path()] {
            std::fs::remove_file(path).unwrap();
        }
    }

    #[test]
    fn test_decode_continues_past_bad_record() {
        let cabling = RichCabling::new(None).unwrap();
        let pd = cabling.pd_id_from_level0(Level0ID::new(2)).unwrap();
        let hit = pd.with_pixel(PixelAddress::new(1, 1));
        let encoder = RawBankEncoder::with_version(&cabling, BankVersion::LHCb5, 96);
        let mut bytes: Vec<u8> = Vec::new();
        for event_number in 0..3u64 {
            let odin = Odin::new(0, event_number, 0);
            let mut event = RawEvent::new();
            event.add_bank(odin.to_bank());
            encoder.fill_raw_event(&[hit], &odin, &mut event).unwrap();
            let mut words: Vec<u32> = event
                .banks()
                .iter()
                .flat_map(|b| b.to_words().unwrap())
                .collect();
            if event_number == 1 {
                // the RICH bank now declares a 6 byte body
                let rich_start = event.banks()[0].total_words();
                words[rich_start] = (words[rich_start] & 0xFFFF) | (6 << 16);
            }
            bytes.write_u32::<LittleEndian>(words.len() as u32).unwrap();
            words
                .iter()
                .for_each(|w| bytes.write_u32::<LittleEndian>(*w).unwrap());
        }
        let raw = temp_path("bad_record.raw");
        let hits_out = temp_path("bad_record_hits.txt");
        std::fs::write(&raw, &bytes).unwrap();

        let (tx, _rx) = channel();
        let config = Config {
            input_path: raw.clone(),
            output_path: hits_out.clone(),
            ..Default::default()
        };
        let summary = process_decode(&config, &tx).unwrap();
        assert_eq!(summary.events, 2);
        assert_eq!(summary.structural_errors[BAD_RECORD_ERROR], 1);
        assert_eq!(summary.total_hits(), 2);

        let expected: Vec<String> = [vec![hit], vec![], vec![hit]]
            .iter()
            .enumerate()
            .map(|(i, ids)| format_hit_line(i as u64, "", ids))
            .collect();
        let output = std::fs::read_to_string(&hits_out).unwrap();
        assert_eq!(output.lines().collect::<Vec<&str>>(), expected);

        for path in [raw, hits_out, config.get_summary_path()] {
            std::fs::remove_file(path).unwrap();
        }
    }

    #[test]
    fn test_encode_missing_input() {
        let (tx, _rx) = channel();
        let config = Config {
            input_path: PathBuf::from("/not/a/hit/list.txt"),
            ..Default::default()
        };
        assert!(matches!(
            process_encode(&config, &tx),
            Err(ProcessorError::BadFilePath(_))
        ));
    }
}
