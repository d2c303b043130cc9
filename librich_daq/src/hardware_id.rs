// The read-out hierarchy is board -> ingress -> input -> photodetector. Each level gets
// its own small integer type so that a Level1Input can never be handed to something
// expecting a Level0ID. Construction from a raw integer masks to the field width and
// never fails; the explicit setters range check and report success instead.
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::constants::{N_INGRESS_PER_L1, N_INPUTS_PER_INGRESS};

/// Render the low `n_bits` of a value as a hex word plus a per-bit dump (msb first),
/// grouped by nibble.
pub fn bit_dump(value: u64, n_bits: u32) -> String {
    let n_bits = n_bits.min(64) as usize;
    let bits = value.view_bits::<Lsb0>();
    let mut dump = String::with_capacity(n_bits + n_bits / 4);
    for idx in (0..n_bits).rev() {
        if idx != n_bits - 1 && idx % 4 == 3 {
            dump.push(' ');
        }
        dump.push(if bits[idx] { '1' } else { '0' });
    }
    format!("0x{:0width$X} [{}]", value, dump, width = n_bits.div_ceil(4))
}

macro_rules! hardware_number {
    ($(#[$meta:meta])* $name:ident, $bits:expr, $max:expr) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Number of bits used by this identifier
            pub const BITS: u32 = $bits;
            /// Mask applied on construction
            pub const MASK: u32 = (1 << $bits) - 1;
            /// Largest valid value
            pub const MAX: u32 = $max;

            /// Construct from a raw value, masking it to the field width
            pub fn new(value: u32) -> Self {
                Self(value & Self::MASK)
            }

            /// The raw value
            pub fn data(&self) -> u32 {
                self.0
            }

            /// Set the value if it is in range. Returns false (and leaves the value
            /// unchanged) otherwise.
            pub fn set_data(&mut self, value: u32) -> bool {
                if value > Self::MAX {
                    return false;
                }
                self.0 = value;
                true
            }

            /// Is the stored value within the valid range
            pub fn is_valid(&self) -> bool {
                self.0 <= Self::MAX
            }

            /// Hex and bit dump, for diagnostics
            pub fn dump(&self) -> String {
                bit_dump(self.0 as u64, Self::BITS)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", stringify!($name), self.0)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0
            }
        }
    };
}

hardware_number!(
    /// Identifier of a photodetector on the Level-0 (front-end) side
    Level0ID,
    10,
    (1 << 10) - 1
);
hardware_number!(
    /// Hardware identifier of a Level-1 board. Used as the source id of its raw bank.
    Level1HardwareID,
    16,
    (1 << 16) - 1
);
hardware_number!(
    /// Ingress number on a Level-1 board
    L1IngressID,
    2,
    N_INGRESS_PER_L1 - 1
);
hardware_number!(
    /// Input number within one ingress
    L1InputWithinIngress,
    4,
    N_INPUTS_PER_INGRESS - 1
);

/// Input number on a Level-1 board.
///
/// Derived from (ingress, input within ingress) as `ingress * 12 + input`; only the
/// combined number is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level1Input(u32);

impl Level1Input {
    pub const BITS: u32 = 6;
    pub const MASK: u32 = (1 << Self::BITS) - 1;
    pub const MAX: u32 = N_INGRESS_PER_L1 * N_INPUTS_PER_INGRESS - 1;

    /// Construct from a raw value, masking it to the field width
    pub fn new(value: u32) -> Self {
        Self(value & Self::MASK)
    }

    /// Construct from the ingress and the input within that ingress
    pub fn from_parts(ingress: L1IngressID, input: L1InputWithinIngress) -> Self {
        Self::new(ingress.data() * N_INPUTS_PER_INGRESS + input.data())
    }

    pub fn data(&self) -> u32 {
        self.0
    }

    pub fn set_data(&mut self, value: u32) -> bool {
        if value > Self::MAX {
            return false;
        }
        self.0 = value;
        true
    }

    pub fn is_valid(&self) -> bool {
        self.0 <= Self::MAX
    }

    /// The ingress this input belongs to
    pub fn ingress_id(&self) -> L1IngressID {
        L1IngressID::new(self.0 / N_INPUTS_PER_INGRESS)
    }

    /// The input number within its ingress
    pub fn l1_input_within_ingress(&self) -> L1InputWithinIngress {
        L1InputWithinIngress::new(self.0 % N_INPUTS_PER_INGRESS)
    }

    pub fn dump(&self) -> String {
        bit_dump(self.0 as u64, Self::BITS)
    }
}

impl fmt::Display for Level1Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Level1Input {} (ingress {} input {})",
            self.0,
            self.ingress_id().data(),
            self.l1_input_within_ingress().data()
        )
    }
}

// EventID and BXID are only ever partially known: the front-end carries a handful of
// low bits, ODIN the full counter. Equality therefore only looks at the bits both
// sides have. This is not transitive, so there is no Eq/Hash.

/// Event identifier with a number of significant bits
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EventID {
    id: u64,
    n_bits: u8,
}

impl EventID {
    /// Construct, masking the value to the given number of bits (at most 64)
    pub fn new(id: u64, n_bits: u8) -> Self {
        let n_bits = n_bits.min(64);
        Self {
            id: id & low_mask(n_bits),
            n_bits,
        }
    }

    pub fn data(&self) -> u64 {
        self.id
    }

    pub fn active_bits(&self) -> u8 {
        self.n_bits
    }

    /// Set the value if it fits in the significant bits
    pub fn set_data(&mut self, id: u64) -> bool {
        if id & !low_mask(self.n_bits) != 0 {
            return false;
        }
        self.id = id;
        true
    }

    pub fn dump(&self) -> String {
        bit_dump(self.id, self.n_bits as u32)
    }
}

impl PartialEq for EventID {
    fn eq(&self, other: &Self) -> bool {
        let mask = low_mask(self.n_bits.min(other.n_bits));
        (self.id & mask) == (other.id & mask)
    }
}

impl fmt::Display for EventID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventID {} ({} bits)", self.id, self.n_bits)
    }
}

/// Bunch crossing identifier with a number of significant bits
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BXID {
    id: u32,
    n_bits: u8,
}

impl BXID {
    /// Construct, masking the value to the given number of bits (at most 32)
    pub fn new(id: u32, n_bits: u8) -> Self {
        let n_bits = n_bits.min(32);
        Self {
            id: id & low_mask(n_bits) as u32,
            n_bits,
        }
    }

    pub fn data(&self) -> u32 {
        self.id
    }

    pub fn active_bits(&self) -> u8 {
        self.n_bits
    }

    pub fn set_data(&mut self, id: u32) -> bool {
        if id as u64 & !low_mask(self.n_bits) != 0 {
            return false;
        }
        self.id = id;
        true
    }

    pub fn dump(&self) -> String {
        bit_dump(self.id as u64, self.n_bits as u32)
    }
}

impl PartialEq for BXID {
    fn eq(&self, other: &Self) -> bool {
        let mask = low_mask(self.n_bits.min(other.n_bits)) as u32;
        (self.id & mask) == (other.id & mask)
    }
}

impl fmt::Display for BXID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BXID {} ({} bits)", self.id, self.n_bits)
    }
}

fn low_mask(n_bits: u8) -> u64 {
    if n_bits >= 64 {
        u64::MAX
    } else {
        (1u64 << n_bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_partial_compare() {
        assert_eq!(EventID::new(5, 8), EventID::new(5, 4));
        assert_eq!(EventID::new(21, 8), EventID::new(5, 4));
        assert_ne!(EventID::new(22, 8), EventID::new(5, 4));
    }

    #[test]
    fn test_event_id_masks_on_construction() {
        let id = EventID::new(0x1FF, 8);
        assert_eq!(id.data(), 0xFF);
        let full = EventID::new(u64::MAX, 64);
        assert_eq!(full.data(), u64::MAX);
    }

    #[test]
    fn test_bx_id_compare() {
        assert_eq!(BXID::new(0xABC, 12), BXID::new(0xBC, 8));
        assert_ne!(BXID::new(0xABC, 12), BXID::new(0xBD, 8));
    }

    #[test]
    fn test_setters_range_check() {
        let mut input = L1InputWithinIngress::new(3);
        assert!(!input.set_data(12));
        assert_eq!(input.data(), 3);
        assert!(input.set_data(11));
        assert_eq!(input.data(), 11);

        let mut l0 = Level0ID::new(0);
        assert!(!l0.set_data(1024));
        assert_eq!(l0.data(), 0);

        let mut evt = EventID::new(0, 4);
        assert!(!evt.set_data(16));
        assert!(evt.set_data(15));
        assert_eq!(evt.data(), 15);
    }

    #[test]
    fn test_construction_masks() {
        assert_eq!(Level0ID::new(0x7FF).data(), 0x3FF);
        assert_eq!(L1IngressID::new(5).data(), 1);
        assert_eq!(Level1HardwareID::new(0x1_0002).data(), 2);
    }

    #[test]
    fn test_level1_input_derived_fields() {
        for value in 0..=Level1Input::MAX {
            let input = Level1Input::new(value);
            assert_eq!(
                input.ingress_id().data() * N_INPUTS_PER_INGRESS
                    + input.l1_input_within_ingress().data(),
                input.data()
            );
            let rebuilt =
                Level1Input::from_parts(input.ingress_id(), input.l1_input_within_ingress());
            assert_eq!(rebuilt, input);
        }
    }

    #[test]
    fn test_bit_dump() {
        assert_eq!(bit_dump(0xA5, 8), "0xA5 [1010 0101]");
        assert_eq!(Level1Input::new(5).dump(), "0x05 [00 0101]");
    }
}
