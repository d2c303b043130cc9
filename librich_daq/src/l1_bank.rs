// Splits the body of one L1 raw bank into the board -> ingress -> input hierarchy and
// builds it back up for the encoder. The PD blocks themselves are handled by pd_bank.
use std::collections::{BTreeMap, BTreeSet};

use super::constants::{N_INGRESS_PER_L1, N_INPUTS_PER_L1, RICH_BANK_TYPE};
use super::error::{EncodeError, L1BankError, RawBankError};
use super::hardware_id::{L1IngressID, Level0ID, Level1HardwareID, Level1Input};
use super::ingress_header::L1IngressHeader;
use super::odin::Odin;
use super::pd_bank::{PDBlock, PDCodec};
use super::raw_bank::{BankVersion, RawBank};
use super::smart_id::{PixelAddress, RichSmartID};

/// The PD blocks read from one ingress
#[derive(Debug, Clone, Default)]
pub struct IngressBlocks {
    pub ingress_id: L1IngressID,
    pub header: L1IngressHeader,
    /// The header was not in the data (versions without ingress headers)
    pub synthetic: bool,
    pub inputs: Vec<(Level1Input, PDBlock)>,
}

/// Everything read from one L1 bank. When `error` is set, decoding stopped there and
/// `ingresses` holds what was read up to that point.
#[derive(Debug, Clone)]
pub struct BankLayout {
    pub board: Level1HardwareID,
    pub version: BankVersion,
    pub ingresses: Vec<IngressBlocks>,
    /// MaPMT0 words that were not valid pixel identifiers
    pub invalid_words: usize,
    pub error: Option<L1BankError>,
}

impl BankLayout {
    fn new(board: Level1HardwareID, version: BankVersion) -> Self {
        Self {
            board,
            version,
            ingresses: Vec::new(),
            invalid_words: 0,
            error: None,
        }
    }

    pub fn n_pds(&self) -> usize {
        self.ingresses.iter().map(|i| i.inputs.len()).sum()
    }
}

/// Read the body of an L1 bank
pub fn split_bank(board: Level1HardwareID, version: BankVersion, words: &[u32]) -> BankLayout {
    let mut layout = BankLayout::new(board, version);
    let result = match version {
        BankVersion::MaPMT0 => split_smart_id_list(&mut layout, words),
        v if v.has_ingress_headers() => split_with_ingress_headers(&mut layout, words),
        _ => split_sequential(&mut layout, words),
    };
    if let Err(e) = result {
        layout.error = Some(e);
    }
    layout
}

fn split_with_ingress_headers(layout: &mut BankLayout, words: &[u32]) -> Result<(), L1BankError> {
    let codec = PDCodec::for_version(layout.version)?;
    let mut cursor = 0;
    while cursor < words.len() {
        let header = L1IngressHeader::from_word(words[cursor]);
        cursor += 1;
        let ingress_id = header.ingress_id();
        if layout.ingresses.iter().any(|i| i.ingress_id == ingress_id) {
            return Err(L1BankError::DuplicateIngress(ingress_id.data()));
        }
        layout.ingresses.push(IngressBlocks {
            ingress_id,
            header,
            synthetic: false,
            inputs: Vec::with_capacity(header.n_active_inputs()),
        });
        let current = layout.ingresses.len() - 1;
        for input in header.active_inputs() {
            let block = codec.decode(&words[cursor..])?;
            cursor += block.n_total_words();
            layout.ingresses[current]
                .inputs
                .push((Level1Input::from_parts(ingress_id, input), block));
        }
    }
    Ok(())
}

fn synthetic_ingresses() -> Vec<IngressBlocks> {
    (0..N_INGRESS_PER_L1)
        .map(|id| IngressBlocks {
            ingress_id: L1IngressID::new(id),
            synthetic: true,
            ..Default::default()
        })
        .collect()
}

/// No ingress headers: PD blocks are back to back and numbered by position
fn split_sequential(layout: &mut BankLayout, words: &[u32]) -> Result<(), L1BankError> {
    let codec = PDCodec::for_version(layout.version)?;
    layout.ingresses = synthetic_ingresses();
    let mut cursor = 0;
    let mut n_blocks = 0;
    while cursor < words.len() {
        if n_blocks >= N_INPUTS_PER_L1 {
            return Err(L1BankError::TooManyInputs(N_INPUTS_PER_L1));
        }
        let block = codec.decode(&words[cursor..])?;
        cursor += block.n_total_words();
        let input = Level1Input::new(n_blocks);
        layout.ingresses[input.ingress_id().data() as usize]
            .inputs
            .push((input, block));
        n_blocks += 1;
    }
    Ok(())
}

/// MaPMT0: every word is a pixel RichSmartID. PDs are numbered in order of first
/// appearance.
fn split_smart_id_list(layout: &mut BankLayout, words: &[u32]) -> Result<(), L1BankError> {
    layout.ingresses = synthetic_ingresses();
    let mut pd_order: Vec<RichSmartID> = Vec::new();
    for word in words {
        let id = RichSmartID::new(*word);
        let Some(pixel) = id.pixel().filter(|_| id.is_valid()) else {
            spdlog::warn!(
                "Board {} MaPMT0 word is not a pixel RichSmartID: {}",
                layout.board.data(),
                id.dump()
            );
            layout.invalid_words += 1;
            continue;
        };
        let pd_id = id.pd_id();
        let index = match pd_order.iter().position(|pd| *pd == pd_id) {
            Some(index) => index,
            None => {
                if pd_order.len() >= N_INPUTS_PER_L1 as usize {
                    return Err(L1BankError::TooManyInputs(N_INPUTS_PER_L1));
                }
                pd_order.push(pd_id);
                pd_order.len() - 1
            }
        };
        let input = Level1Input::new(index as u32);
        let ingress = &mut layout.ingresses[input.ingress_id().data() as usize];
        match ingress.inputs.iter_mut().find(|(i, _)| *i == input) {
            Some((_, block)) => {
                block.pixels.push(pixel);
                block.n_total_words += 1;
            }
            None => ingress.inputs.push((
                input,
                PDBlock {
                    pixels: vec![pixel],
                    n_total_words: 1,
                    size_ok: true,
                    embedded_pd_id: Some(pd_id),
                    ..Default::default()
                },
            )),
        }
    }
    Ok(())
}

/// What the encoder knows about one PD
#[derive(Debug, Clone, Default)]
pub struct PDPayload {
    pub pd_id: RichSmartID,
    pub level0: Level0ID,
    pub pixels: Vec<PixelAddress>,
}

/// Build the raw bank of one board. PDs are written in input order; versions with
/// ingress headers get one header per populated ingress. Duplicate pixels are merged.
pub fn compose_bank(
    board: Level1HardwareID,
    version: BankVersion,
    odin: &Odin,
    pds: &BTreeMap<Level1Input, PDPayload>,
    zero_suppress_hit_cut: usize,
) -> Result<RawBank, EncodeError> {
    let mut words: Vec<u32> = Vec::new();
    match version {
        BankVersion::MaPMT0 => {
            for payload in pds.values() {
                let pixels: BTreeSet<PixelAddress> = payload.pixels.iter().copied().collect();
                words.extend(pixels.into_iter().map(|p| payload.pd_id.with_pixel(p).key()));
            }
        }
        v if v.has_ingress_headers() => {
            let codec = PDCodec::for_version(v)?;
            let mut by_ingress: BTreeMap<L1IngressID, Vec<(&Level1Input, &PDPayload)>> =
                BTreeMap::new();
            for (input, payload) in pds {
                by_ingress.entry(input.ingress_id()).or_default().push((input, payload));
            }
            for (ingress_id, inputs) in by_ingress {
                let mut header = L1IngressHeader::new(ingress_id, odin.event_id(), odin.bx_id());
                for (input, _) in &inputs {
                    header.set_input_active(input.l1_input_within_ingress());
                }
                words.push(header.word());
                for (_, payload) in inputs {
                    words.extend(codec.encode(
                        payload.level0,
                        odin.event_id(),
                        &payload.pixels,
                        zero_suppress_hit_cut,
                    )?);
                }
            }
        }
        v => {
            let codec = PDCodec::for_version(v)?;
            for payload in pds.values() {
                words.extend(codec.encode(
                    payload.level0,
                    odin.event_id(),
                    &payload.pixels,
                    zero_suppress_hit_cut,
                )?);
            }
        }
    }
    if words.len() * super::constants::BYTES_PER_WORD > u16::MAX as usize {
        return Err(EncodeError::BadBank(RawBankError::BankTooLarge(words.len())));
    }
    Ok(RawBank::new(
        RICH_BANK_TYPE,
        version.code(),
        board.data() as u16,
        words,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PDBankError;
    use crate::smart_id::{PdType, RichDetector, Side};

    fn payload(l0: u32, pixels: Vec<PixelAddress>) -> PDPayload {
        PDPayload {
            pd_id: RichSmartID::pd(RichDetector::Rich1, Side::First, PdType::Hpd, 0, l0),
            level0: Level0ID::new(l0),
            pixels,
        }
    }

    fn three_pds() -> BTreeMap<Level1Input, PDPayload> {
        let mut pds = BTreeMap::new();
        pds.insert(Level1Input::new(0), payload(1, vec![PixelAddress::new(1, 1)]));
        pds.insert(
            Level1Input::new(5),
            payload(2, vec![PixelAddress::new(2, 2), PixelAddress::new(3, 3)]),
        );
        pds.insert(Level1Input::new(30), payload(3, vec![PixelAddress::new(31, 31)]));
        pds
    }

    #[test]
    fn test_ingress_layout_round_trip() {
        let odin = Odin::new(1, 0x42, 0x7);
        let bank = compose_bank(
            Level1HardwareID::new(3),
            BankVersion::LHCb4,
            &odin,
            &three_pds(),
            96,
        )
        .unwrap();
        assert_eq!(bank.source_id, 3);
        assert_eq!(bank.version, 4);

        let layout = split_bank(Level1HardwareID::new(3), BankVersion::LHCb4, &bank.data);
        assert!(layout.error.is_none());
        // inputs 0 and 5 are in ingress 0, input 30 in ingress 2
        assert_eq!(layout.ingresses.len(), 2);
        assert_eq!(layout.ingresses[0].ingress_id, L1IngressID::new(0));
        assert_eq!(layout.ingresses[1].ingress_id, L1IngressID::new(2));
        assert_eq!(layout.ingresses[0].header.event_id().data(), 0x42);
        assert_eq!(layout.ingresses[0].header.bx_id().data(), 0x7);
        let inputs: Vec<u32> = layout
            .ingresses
            .iter()
            .flat_map(|i| i.inputs.iter().map(|(input, _)| input.data()))
            .collect();
        assert_eq!(inputs, vec![0, 5, 30]);
        assert_eq!(layout.ingresses[0].inputs[1].1.pixels.len(), 2);
        assert_eq!(layout.ingresses[1].inputs[0].1.header.level0_id, Level0ID::new(3));
    }

    #[test]
    fn test_sequential_layout() {
        let bank = compose_bank(
            Level1HardwareID::new(1),
            BankVersion::LHCb2,
            &Odin::default(),
            &three_pds(),
            96,
        )
        .unwrap();
        let layout = split_bank(Level1HardwareID::new(1), BankVersion::LHCb2, &bank.data);
        assert!(layout.error.is_none());
        assert_eq!(layout.ingresses.len(), 4);
        assert!(layout.ingresses.iter().all(|i| i.synthetic));
        assert_eq!(layout.ingresses[0].header.word(), 0);
        // positional numbering
        let inputs: Vec<u32> = layout.ingresses[0]
            .inputs
            .iter()
            .map(|(input, _)| input.data())
            .collect();
        assert_eq!(inputs, vec![0, 1, 2]);
        assert_eq!(layout.ingresses[0].inputs[2].1.header.level0_id, Level0ID::new(3));
    }

    #[test]
    fn test_truncated_bank_keeps_partial_data() {
        let bank = compose_bank(
            Level1HardwareID::new(1),
            BankVersion::LHCb5,
            &Odin::default(),
            &three_pds(),
            96,
        )
        .unwrap();
        let cut = &bank.data[..bank.data.len() - 2];
        let layout = split_bank(Level1HardwareID::new(1), BankVersion::LHCb5, cut);
        assert!(matches!(
            layout.error,
            Some(L1BankError::BadPDBlock(PDBankError::TooShort { .. }))
        ));
        assert_eq!(layout.n_pds(), 2);
    }

    #[test]
    fn test_duplicate_ingress() {
        let header = L1IngressHeader::default().word();
        let layout = split_bank(Level1HardwareID::new(1), BankVersion::LHCb3, &[header, header]);
        assert!(matches!(layout.error, Some(L1BankError::DuplicateIngress(0))));
        assert_eq!(layout.ingresses.len(), 1);
    }

    #[test]
    fn test_too_many_sequential_blocks() {
        // 49 empty FlatList blocks
        let words = vec![0u32; 49];
        let layout = split_bank(Level1HardwareID::new(1), BankVersion::FlatList, &words);
        assert!(matches!(layout.error, Some(L1BankError::TooManyInputs(48))));
        assert_eq!(layout.n_pds(), 48);
    }

    #[test]
    fn test_mapmt_list() {
        let pd_a = RichSmartID::pd(RichDetector::Rich2, Side::Second, PdType::MaPmt, 4, 1);
        let pd_b = RichSmartID::pd(RichDetector::Rich2, Side::Second, PdType::MaPmt, 4, 2);
        let words = vec![
            pd_b.with_pixel(PixelAddress::new(1, 1)).key(),
            0x1234,
            pd_a.with_pixel(PixelAddress::new(2, 2)).key(),
            pd_b.with_pixel(PixelAddress::new(3, 3)).key(),
        ];
        let layout = split_bank(Level1HardwareID::new(4), BankVersion::MaPMT0, &words);
        assert!(layout.error.is_none());
        assert_eq!(layout.invalid_words, 1);
        let inputs = &layout.ingresses[0].inputs;
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].0, Level1Input::new(0));
        assert_eq!(inputs[0].1.embedded_pd_id, Some(pd_b));
        assert_eq!(inputs[0].1.pixels.len(), 2);
        assert_eq!(inputs[1].1.embedded_pd_id, Some(pd_a));
    }

    #[test]
    fn test_mapmt_compose() {
        let bank = compose_bank(
            Level1HardwareID::new(4),
            BankVersion::MaPMT0,
            &Odin::default(),
            &three_pds(),
            96,
        )
        .unwrap();
        assert_eq!(bank.data.len(), 4);
        assert!(bank.data.iter().all(|w| RichSmartID::new(*w).is_valid_pixel()));
    }

    #[test]
    fn test_duplicate_pixels_merged_in_every_version() {
        let mut pds = BTreeMap::new();
        pds.insert(
            Level1Input::new(2),
            payload(
                7,
                vec![
                    PixelAddress::new(4, 4),
                    PixelAddress::new(9, 1),
                    PixelAddress::new(4, 4),
                ],
            ),
        );
        for version in BankVersion::ALL {
            let bank = compose_bank(Level1HardwareID::new(1), version, &Odin::default(), &pds, 96)
                .unwrap();
            let layout = split_bank(Level1HardwareID::new(1), version, &bank.data);
            assert!(layout.error.is_none(), "{version:?}");
            let mut pixels: Vec<PixelAddress> = layout
                .ingresses
                .iter()
                .flat_map(|i| i.inputs.iter().flat_map(|(_, block)| block.pixels.clone()))
                .collect();
            pixels.sort();
            assert_eq!(
                pixels,
                vec![PixelAddress::new(4, 4), PixelAddress::new(9, 1)],
                "{version:?}"
            );
        }
    }

    #[test]
    fn test_empty_bank() {
        let layout = split_bank(Level1HardwareID::new(1), BankVersion::LHCb5, &[]);
        assert!(layout.error.is_none());
        assert_eq!(layout.n_pds(), 0);
    }
}
