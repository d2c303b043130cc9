// Decode orchestration. One DecodeContext lives for one event at one TAE location: it
// holds that location's ODIN record and the statistics of the event, which are only
// committed to the job summary by finish_event. Banks are decoded independently, so a
// bad bank never stops the others.
use std::collections::BTreeMap;

use super::cabling::{fake_pd_id, CablingLookup};
use super::config::Config;
use super::constants::{CENTRAL_TAE_LOCATION, RICH_BANK_TYPE};
use super::error::BankDecodeError;
use super::hardware_id::{bit_dump, Level1HardwareID, Level1Input};
use super::ingress_header::L1IngressHeader;
use super::l1_bank::{split_bank, BankLayout, IngressBlocks};
use super::l1_map::{IngressInfo, IntegrityFailure, L1Map, PDInfo};
use super::odin::Odin;
use super::pd_bank::PDBlock;
use super::raw_bank::{BankVersion, RawBank, RawEvent, RawEventSource};
use super::smart_id::{RichDetector, RichSmartID};
use super::summary::DecodeSummary;
use super::suppression::{HotPixelMask, Suppression, SuppressionPolicy};

/// Per-event decode state for one TAE location
#[derive(Debug, Clone, Default)]
pub struct DecodeContext {
    location: String,
    odin: Option<Odin>,
    tally: DecodeSummary,
    n_decoded_banks: usize,
}

impl DecodeContext {
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn odin(&self) -> Option<&Odin> {
        self.odin.as_ref()
    }

    /// Statistics of this event so far
    pub fn tally(&self) -> &DecodeSummary {
        &self.tally
    }

    pub fn n_decoded_banks(&self) -> usize {
        self.n_decoded_banks
    }

    /// Fold the statistics of another TAE location into this event
    fn absorb(&mut self, other: DecodeContext) {
        self.tally.merge(&other.tally);
        self.n_decoded_banks += other.n_decoded_banks;
    }

    fn name(&self) -> &str {
        if self.location == CENTRAL_TAE_LOCATION {
            "central"
        } else {
            &self.location
        }
    }
}

/// Which per-PD cross checks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckFlags {
    pub event_ids: bool,
    pub odin_event_ids: bool,
    pub odin_bx_ids: bool,
    pub board_ids: bool,
    pub parity: bool,
    pub data_size: bool,
}

impl CheckFlags {
    pub fn from_config(config: &Config) -> Self {
        Self {
            event_ids: config.check_event_ids,
            odin_event_ids: config.check_odin_event_ids,
            odin_bx_ids: config.check_odin_bx_ids,
            board_ids: config.check_board_ids,
            parity: config.check_parity,
            data_size: config.check_data_size,
        }
    }
}

/// Where a PD was read from
struct ReadoutPosition<'a> {
    board: Level1HardwareID,
    rich: Option<RichDetector>,
    ingress: &'a L1IngressHeader,
    synthetic: bool,
    input: Level1Input,
}

/// Decodes RICH L1 raw banks into L1Maps
#[derive(Debug)]
pub struct RawBankDecoder<'c, C: CablingLookup> {
    cabling: &'c C,
    checks: CheckFlags,
    purge_corrupted_pds: bool,
    use_fake_pd_id: bool,
    enabled: [bool; 2],
    policy: SuppressionPolicy,
    summary: DecodeSummary,
}

impl<'c, C: CablingLookup> RawBankDecoder<'c, C> {
    pub fn new(cabling: &'c C, config: &Config) -> Self {
        Self {
            cabling,
            checks: CheckFlags::from_config(config),
            purge_corrupted_pds: config.purge_corrupted_pds,
            use_fake_pd_id: config.use_fake_pd_id,
            enabled: [
                config.is_detector_enabled(RichDetector::Rich1),
                config.is_detector_enabled(RichDetector::Rich2),
            ],
            policy: SuppressionPolicy::new(
                config.max_hpd_occupancy,
                HotPixelMask::new(&config.hot_pixel_ids()),
            ),
            summary: DecodeSummary::new(),
        }
    }

    /// Job statistics of all finished events
    pub fn summary(&self) -> &DecodeSummary {
        &self.summary
    }

    /// Start an event at one TAE location. The ODIN record is taken from the raw event
    /// of that location.
    pub fn init_event(&self, location: &str, event: Option<&RawEvent>) -> DecodeContext {
        DecodeContext {
            location: location.to_string(),
            odin: event.and_then(Odin::from_raw_event),
            tally: DecodeSummary::new(),
            n_decoded_banks: 0,
        }
    }

    /// Commit the event statistics. Only structural errors are kept when no bank of
    /// the event decoded.
    pub fn finish_event(&mut self, mut ctx: DecodeContext) {
        if ctx.n_decoded_banks > 0 {
            ctx.tally.events = 1;
            self.summary.merge(&ctx.tally);
        } else {
            self.summary.merge_structural_errors(&ctx.tally);
        }
    }

    /// Decode every RICH bank of the central event
    pub fn decode_event(&mut self, event: &RawEvent) -> L1Map {
        self.decode_raw_event(CENTRAL_TAE_LOCATION, event)
    }

    /// Decode each TAE location of `source`. Locations without a raw event give an
    /// empty map. All locations together count as one event.
    pub fn decode_to_smart_ids<S: RawEventSource + ?Sized>(
        &mut self,
        source: &S,
        locations: &[String],
    ) -> BTreeMap<String, L1Map> {
        let mut event_ctx = self.init_event(CENTRAL_TAE_LOCATION, None);
        let mut maps = BTreeMap::new();
        for location in locations {
            let map = match source.raw_event(location) {
                Some(event) => {
                    let mut ctx = self.init_event(location, Some(event));
                    let map = self.decode_banks(&mut ctx, event);
                    event_ctx.absorb(ctx);
                    map
                }
                None => {
                    spdlog::warn!("No raw event at TAE location '{location}'");
                    L1Map::new()
                }
            };
            maps.insert(location.clone(), map);
        }
        self.finish_event(event_ctx);
        maps
    }

    /// Decode every RICH bank of one raw event
    pub fn decode_raw_event(&mut self, location: &str, event: &RawEvent) -> L1Map {
        let mut ctx = self.init_event(location, Some(event));
        let map = self.decode_banks(&mut ctx, event);
        self.finish_event(ctx);
        map
    }

    fn decode_banks(&self, ctx: &mut DecodeContext, event: &RawEvent) -> L1Map {
        if ctx.odin.is_none() && (self.checks.odin_event_ids || self.checks.odin_bx_ids) {
            spdlog::warn!("No ODIN bank in {} event; ODIN checks skipped", ctx.name());
        }
        let mut map = L1Map::new();
        for bank in event.banks_of_type(RICH_BANK_TYPE) {
            if let Err(e) = self.decode_bank(ctx, bank, &mut map) {
                spdlog::error!("[{}] {e}", ctx.name());
            }
        }
        map
    }

    /// Decode one bank into `map`.
    ///
    /// A corrupted bank still adds whatever was read before the corruption. Every
    /// error is counted in the context.
    pub fn decode_bank(
        &self,
        ctx: &mut DecodeContext,
        bank: &RawBank,
        map: &mut L1Map,
    ) -> Result<(), BankDecodeError> {
        match self.decode_bank_inner(ctx, bank, map) {
            Ok(()) => {
                ctx.n_decoded_banks += 1;
                Ok(())
            }
            Err(e) => {
                ctx.tally.add_structural_error(e.kind());
                Err(e)
            }
        }
    }

    fn decode_bank_inner(
        &self,
        ctx: &mut DecodeContext,
        bank: &RawBank,
        map: &mut L1Map,
    ) -> Result<(), BankDecodeError> {
        if bank.bank_type != RICH_BANK_TYPE {
            return Err(BankDecodeError::WrongBankType(bank.bank_type));
        }
        if !bank.is_magic_valid() {
            return Err(BankDecodeError::BadMagic(bank.magic));
        }
        let version = BankVersion::try_from(bank.version)
            .map_err(|_| BankDecodeError::UnknownVersion(bank.version))?;
        let board = Level1HardwareID::new(bank.source_id as u32);

        let rich = self.cabling.rich_detector(board);
        match rich {
            Some(r) if !self.enabled[r.index()] => {
                spdlog::debug!("Skipping board {} of disabled {r}", board.data());
                return Ok(());
            }
            None if !self.use_fake_pd_id => {
                spdlog::warn!("Board {} is not in the cabling map", board.dump());
            }
            _ => (),
        }

        let BankLayout {
            ingresses, error, ..
        } = split_bank(board, version, &bank.data);

        let mut infos = Vec::with_capacity(ingresses.len());
        for IngressBlocks {
            ingress_id,
            header,
            synthetic,
            inputs,
        } in ingresses
        {
            if header.hpds_suppressed() {
                spdlog::info!(
                    "Board {} ingress {} reports hardware suppressed PDs",
                    board.data(),
                    ingress_id.data()
                );
                ctx.tally.board_mut(board.data()).suppressed_ingresses += 1;
            }
            let mut pds = Vec::with_capacity(inputs.len());
            for (input, block) in inputs {
                let position = ReadoutPosition {
                    board,
                    rich,
                    ingress: &header,
                    synthetic,
                    input,
                };
                pds.push((input, self.decode_pd(ctx, &position, block)));
            }
            infos.push(IngressInfo {
                ingress_id,
                header,
                pds,
            });
        }

        let stats = ctx.tally.board_mut(board.data());
        stats.banks += 1;
        stats.words += bank.total_words() as u64;
        map.add_board(board, infos);

        match error {
            Some(source) => Err(BankDecodeError::Corrupted {
                board: board.data(),
                source,
            }),
            None => Ok(()),
        }
    }

    fn resolve_pd_id(&self, position: &ReadoutPosition, block: &PDBlock) -> (RichSmartID, bool) {
        if let Some(id) = block.embedded_pd_id {
            return (id, true);
        }
        if self.use_fake_pd_id {
            let rich = position.rich.unwrap_or(RichDetector::Rich1);
            return (fake_pd_id(rich, position.board, position.input), false);
        }
        let id = self
            .cabling
            .pd_id_from_level0(block.header.level0_id)
            .unwrap_or_default();
        (id, true)
    }

    fn decode_pd(&self, ctx: &mut DecodeContext, position: &ReadoutPosition, block: PDBlock) -> PDInfo {
        let board = position.board;
        let (pd_id, from_cabling) = self.resolve_pd_id(position, &block);
        let level0_id = match block.embedded_pd_id {
            Some(id) => self
                .cabling
                .hardware_location(id)
                .map_or(block.header.level0_id, |l| l.level0),
            None => block.header.level0_id,
        };

        let mut hits = if pd_id.is_valid() {
            block.smart_ids(pd_id)
        } else {
            spdlog::warn!(
                "Board {} {} has no cabling entry for Level0ID {}",
                board.data(),
                position.input,
                level0_id.dump()
            );
            ctx.tally.board_mut(board.data()).unmapped_hits += block.pixels.len() as u64;
            Vec::new()
        };

        let failures = self.check_pd(ctx.odin.as_ref(), position, &block, pd_id, from_cabling);
        for failure in failures.iter() {
            ctx.tally.add_failure(*failure);
        }
        let purged = !failures.is_empty() && self.purge_corrupted_pds;
        if purged {
            hits.clear();
        }

        let suppression = self.policy.apply(pd_id, &mut hits);
        let stats = ctx.tally.board_mut(board.data());
        match suppression {
            Suppression::HighOccupancy(n_hits) => {
                spdlog::info!(
                    "Board {} {pd_id} suppressed: {n_hits} hits over the occupancy limit of {}",
                    board.data(),
                    self.policy.max_occupancy
                );
                stats.suppressed_pds += 1;
            }
            Suppression::HotPixels(n_masked) => stats.masked_hits += n_masked as u64,
            Suppression::None => (),
        }
        if purged {
            stats.purged_pds += 1;
        }
        stats.pds += 1;
        stats.hits += hits.len() as u64;

        PDInfo {
            pd_id,
            level0_id,
            header: block.header,
            footer: block.footer,
            hits,
            failures,
            purged,
            suppression,
        }
    }

    fn check_pd(
        &self,
        odin: Option<&Odin>,
        position: &ReadoutPosition,
        block: &PDBlock,
        pd_id: RichSmartID,
        from_cabling: bool,
    ) -> Vec<IntegrityFailure> {
        let mut failures = Vec::new();
        let board = position.board.data();
        let pd_event_id = block.header.event_id;

        if self.checks.event_ids && !position.synthetic {
            if let Some(event_id) = pd_event_id {
                if event_id != position.ingress.event_id() {
                    spdlog::warn!(
                        "Board {board} {pd_id} event id {} does not match ingress {}",
                        event_id.dump(),
                        position.ingress.event_id().dump()
                    );
                    failures.push(IntegrityFailure::IngressEventId);
                }
            }
        }

        if let Some(odin) = odin {
            if self.checks.odin_event_ids {
                let event_id = if position.synthetic {
                    pd_event_id
                } else {
                    Some(position.ingress.event_id())
                };
                if let Some(event_id) = event_id.filter(|id| *id != odin.event_id()) {
                    spdlog::warn!(
                        "Board {board} {pd_id} event id {} does not match ODIN {}",
                        event_id.dump(),
                        odin.event_id().dump()
                    );
                    failures.push(IntegrityFailure::OdinEventId);
                }
            }
            if self.checks.odin_bx_ids
                && !position.synthetic
                && position.ingress.bx_id() != odin.bx_id()
            {
                spdlog::warn!(
                    "Board {board} {pd_id} BX id {} does not match ODIN {}",
                    position.ingress.bx_id().dump(),
                    odin.bx_id().dump()
                );
                failures.push(IntegrityFailure::OdinBxId);
            }
        }

        if self.checks.board_ids && from_cabling && pd_id.is_valid() {
            if let Some(location) = self.cabling.hardware_location(pd_id) {
                let input_differs = !position.synthetic && location.input != position.input;
                if location.board != position.board || input_differs {
                    spdlog::warn!(
                        "{pd_id} read on board {board} {} but cabled to board {} {}",
                        position.input,
                        location.board.data(),
                        location.input
                    );
                    failures.push(IntegrityFailure::BoardId);
                }
            }
        }

        if self.checks.parity && block.parity_ok == Some(false) {
            spdlog::warn!(
                "Board {board} {pd_id} parity error, footer {}",
                block
                    .footer
                    .first()
                    .map_or(String::new(), |w| bit_dump(*w as u64, 32))
            );
            failures.push(IntegrityFailure::Parity);
        }

        if self.checks.data_size && (!block.size_ok || block.bad_addresses > 0) {
            spdlog::warn!(
                "Board {board} {pd_id} data size error: {} data words, {} bad addresses",
                block.header.n_data_words,
                block.bad_addresses
            );
            failures.push(IntegrityFailure::DataSize);
        }

        failures
    }
}
