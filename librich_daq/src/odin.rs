use super::constants::{ODIN_BANK_TYPE, ODIN_BANK_WORDS, ODIN_BX_ID_BITS};
use super::error::OdinError;
use super::hardware_id::{EventID, BXID};
use super::raw_bank::{RawBank, RawEvent};

const BX_ID_MASK: u32 = (1 << ODIN_BX_ID_BITS) - 1;

/// The timing reference of one event: run, event counter and bunch crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Odin {
    pub run_number: u32,
    pub event_number: u64,
    pub bunch_id: u32,
}

impl Odin {
    pub fn new(run_number: u32, event_number: u64, bunch_id: u32) -> Self {
        Self {
            run_number,
            event_number,
            bunch_id: bunch_id & BX_ID_MASK,
        }
    }

    /// Parse an ODIN bank
    pub fn from_bank(bank: &RawBank) -> Result<Self, OdinError> {
        if bank.bank_type != ODIN_BANK_TYPE {
            return Err(OdinError::WrongBankType(bank.bank_type));
        }
        if bank.data.len() < ODIN_BANK_WORDS {
            return Err(OdinError::TooShort(bank.data.len()));
        }
        Ok(Self::new(
            bank.data[0],
            (bank.data[1] as u64) | ((bank.data[2] as u64) << 32),
            bank.data[3],
        ))
    }

    /// The first ODIN bank of an event, if any parses
    pub fn from_raw_event(event: &RawEvent) -> Option<Self> {
        event
            .banks_of_type(ODIN_BANK_TYPE)
            .find_map(|bank| match Self::from_bank(bank) {
                Ok(odin) => Some(odin),
                Err(e) => {
                    spdlog::warn!("Skipping unreadable ODIN bank: {e}");
                    None
                }
            })
    }

    pub fn to_bank(&self) -> RawBank {
        RawBank::new(
            ODIN_BANK_TYPE,
            0,
            0,
            vec![
                self.run_number,
                self.event_number as u32,
                (self.event_number >> 32) as u32,
                self.bunch_id,
            ],
        )
    }

    pub fn event_id(&self) -> EventID {
        EventID::new(self.event_number, 64)
    }

    pub fn bx_id(&self) -> BXID {
        BXID::new(self.bunch_id, ODIN_BX_ID_BITS)
    }
}
