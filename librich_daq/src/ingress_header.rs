use bitvec::prelude::*;
use std::fmt;

use super::constants::N_INPUTS_PER_INGRESS;
use super::hardware_id::{bit_dump, EventID, L1IngressID, L1InputWithinIngress, BXID};

/// L1 ingress header word layout
mod constants {
    pub const ACTIVE_INPUTS_BITS: usize = 12;
    pub const INGRESS_ID_SHIFT: u32 = 12;
    pub const INGRESS_ID_MASK: u32 = 0x3;
    pub const HPDS_SUPPRESSED_BIT: u32 = 1 << 14;
    pub const EVENT_ID_SHIFT: u32 = 16;
    pub const EVENT_ID_BITS: u8 = 8;
    pub const BX_ID_SHIFT: u32 = 24;
    pub const BX_ID_BITS: u8 = 8;
    pub const BYTE_MASK: u32 = 0xFF;
}

/// The header word preceding each active ingress in an L1 bank.
///
/// Carries the ingress number, the low bits of the event and BX ids, the hardware
/// suppression flag and a bitmap of which of the 12 inputs sent data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct L1IngressHeader(u32);

impl L1IngressHeader {
    pub const EVENT_ID_BITS: u8 = constants::EVENT_ID_BITS;
    pub const BX_ID_BITS: u8 = constants::BX_ID_BITS;

    /// Wrap a raw header word
    pub fn from_word(word: u32) -> Self {
        Self(word)
    }

    /// Build a header with no active inputs
    pub fn new(ingress: L1IngressID, event_id: EventID, bx_id: BXID) -> Self {
        Self(
            ((ingress.data() & constants::INGRESS_ID_MASK) << constants::INGRESS_ID_SHIFT)
                | (((event_id.data() as u32) & constants::BYTE_MASK) << constants::EVENT_ID_SHIFT)
                | ((bx_id.data() & constants::BYTE_MASK) << constants::BX_ID_SHIFT),
        )
    }

    pub fn word(&self) -> u32 {
        self.0
    }

    pub fn ingress_id(&self) -> L1IngressID {
        L1IngressID::new((self.0 >> constants::INGRESS_ID_SHIFT) & constants::INGRESS_ID_MASK)
    }

    pub fn event_id(&self) -> EventID {
        EventID::new(
            ((self.0 >> constants::EVENT_ID_SHIFT) & constants::BYTE_MASK) as u64,
            constants::EVENT_ID_BITS,
        )
    }

    pub fn bx_id(&self) -> BXID {
        BXID::new(
            (self.0 >> constants::BX_ID_SHIFT) & constants::BYTE_MASK,
            constants::BX_ID_BITS,
        )
    }

    /// Some inputs of this ingress were suppressed by the L1 hardware
    pub fn hpds_suppressed(&self) -> bool {
        self.0 & constants::HPDS_SUPPRESSED_BIT != 0
    }

    pub fn set_hpds_suppressed(&mut self, suppressed: bool) {
        if suppressed {
            self.0 |= constants::HPDS_SUPPRESSED_BIT;
        } else {
            self.0 &= !constants::HPDS_SUPPRESSED_BIT;
        }
    }

    /// Mark an input as active. Returns false for an input number outside the ingress.
    pub fn set_input_active(&mut self, input: L1InputWithinIngress) -> bool {
        if input.data() >= N_INPUTS_PER_INGRESS {
            return false;
        }
        self.0.view_bits_mut::<Lsb0>().set(input.data() as usize, true);
        true
    }

    pub fn is_input_active(&self, input: L1InputWithinIngress) -> bool {
        input.data() < N_INPUTS_PER_INGRESS && self.0.view_bits::<Lsb0>()[input.data() as usize]
    }

    /// The active inputs, in ascending order
    pub fn active_inputs(&self) -> Vec<L1InputWithinIngress> {
        self.0.view_bits::<Lsb0>()[..constants::ACTIVE_INPUTS_BITS]
            .iter_ones()
            .map(|idx| L1InputWithinIngress::new(idx as u32))
            .collect()
    }

    pub fn n_active_inputs(&self) -> usize {
        self.0.view_bits::<Lsb0>()[..constants::ACTIVE_INPUTS_BITS].count_ones()
    }

    pub fn dump(&self) -> String {
        bit_dump(self.0 as u64, 32)
    }
}

impl fmt::Display for L1IngressHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L1IngressHeader ingress {} {} {} active inputs {}{}",
            self.ingress_id().data(),
            self.event_id(),
            self.bx_id(),
            self.n_active_inputs(),
            if self.hpds_suppressed() {
                " [suppressed]"
            } else {
                ""
            }
        )
    }
}
