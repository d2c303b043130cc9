use std::collections::BTreeMap;

use super::cabling::CablingLookup;
use super::config::Config;
use super::error::EncodeError;
use super::hardware_id::{Level1HardwareID, Level1Input};
use super::l1_bank::{compose_bank, PDPayload};
use super::odin::Odin;
use super::raw_bank::{BankVersion, RawEvent};
use super::smart_id::RichSmartID;

/// What fill_raw_event did with its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeReport {
    pub encoded_hits: usize,
    pub invalid_ids: usize,
    pub unmapped_ids: usize,
    pub banks: usize,
}

/// Turns pixel identifiers into one RICH raw bank per Level-1 board
#[derive(Debug)]
pub struct RawBankEncoder<'c, C: CablingLookup> {
    cabling: &'c C,
    version: BankVersion,
    zero_suppress_hit_cut: usize,
}

impl<'c, C: CablingLookup> RawBankEncoder<'c, C> {
    pub fn new(cabling: &'c C, config: &Config) -> Self {
        Self {
            cabling,
            version: config.bank_version,
            zero_suppress_hit_cut: config.zero_suppress_hit_cut,
        }
    }

    pub fn with_version(cabling: &'c C, version: BankVersion, zero_suppress_hit_cut: usize) -> Self {
        Self {
            cabling,
            version,
            zero_suppress_hit_cut,
        }
    }

    pub fn version(&self) -> BankVersion {
        self.version
    }

    /// Encode `ids` and append the banks to `raw_event`, boards in ascending order.
    /// Identifiers that are not valid pixels or have no cabling entry are skipped.
    pub fn fill_raw_event(
        &self,
        ids: &[RichSmartID],
        odin: &Odin,
        raw_event: &mut RawEvent,
    ) -> Result<EncodeReport, EncodeError> {
        let mut report = EncodeReport::default();
        let mut boards: BTreeMap<Level1HardwareID, BTreeMap<Level1Input, PDPayload>> =
            BTreeMap::new();
        for id in ids {
            let Some(pixel) = id.pixel().filter(|_| id.is_valid()) else {
                spdlog::warn!("Skipping invalid pixel id {}", id.dump());
                report.invalid_ids += 1;
                continue;
            };
            let Some(location) = self.cabling.hardware_location(*id) else {
                spdlog::warn!("Skipping {id} with no cabling entry");
                report.unmapped_ids += 1;
                continue;
            };
            boards
                .entry(location.board)
                .or_default()
                .entry(location.input)
                .or_insert_with(|| PDPayload {
                    pd_id: id.pd_id(),
                    level0: location.level0,
                    pixels: Vec::new(),
                })
                .pixels
                .push(pixel);
            report.encoded_hits += 1;
        }

        for (board, pds) in boards {
            raw_event.add_bank(compose_bank(
                board,
                self.version,
                odin,
                &pds,
                self.zero_suppress_hit_cut,
            )?);
            report.banks += 1;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cabling::RichCabling;
    use crate::constants::RICH_BANK_TYPE;
    use crate::hardware_id::Level0ID;
    use crate::smart_id::{PdType, PixelAddress, RichDetector, Side};

    #[test]
    fn test_banks_per_board() {
        let cabling = RichCabling::new(None).unwrap();
        let encoder = RawBankEncoder::with_version(&cabling, BankVersion::LHCb5, 96);
        let pd_a = cabling.pd_id_from_level0(Level0ID::new(0)).unwrap();
        let pd_b = cabling.pd_id_from_level0(Level0ID::new(100)).unwrap();
        let ids = vec![
            pd_b.with_pixel(PixelAddress::new(1, 1)),
            pd_a.with_pixel(PixelAddress::new(2, 2)),
            pd_a.with_pixel(PixelAddress::new(3, 3)),
            RichSmartID::undefined(),
            RichSmartID::pd(RichDetector::Rich1, Side::First, PdType::Hpd, 30, 30)
                .with_pixel(PixelAddress::new(0, 0)),
        ];
        let mut event = RawEvent::new();
        let report = encoder
            .fill_raw_event(&ids, &Odin::new(1, 2, 3), &mut event)
            .unwrap();
        assert_eq!(
            report,
            EncodeReport {
                encoded_hits: 3,
                invalid_ids: 1,
                unmapped_ids: 1,
                banks: 2
            }
        );
        let sources: Vec<u16> = event.banks_of_type(RICH_BANK_TYPE).map(|b| b.source_id).collect();
        assert_eq!(sources, vec![1, 3]);
    }

    #[test]
    fn test_alice_hits_rejected_for_lhcb0() {
        let cabling = RichCabling::new(None).unwrap();
        let encoder = RawBankEncoder::with_version(&cabling, BankVersion::LHCb0, 96);
        let pd = cabling.pd_id_from_level0(Level0ID::new(5)).unwrap();
        let ids = vec![pd.with_pixel(PixelAddress::with_sub_row(1, 1, 1))];
        let mut event = RawEvent::new();
        assert!(matches!(
            encoder.fill_raw_event(&ids, &Odin::default(), &mut event),
            Err(EncodeError::BadPDBlock(_))
        ));
    }
}
