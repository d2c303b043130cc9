// Fixed constants of the RICH L1 read-out.

/// Bytes in one raw data word
pub const BYTES_PER_WORD: usize = 4;

/// Pixel columns per photodetector
pub const PIXEL_COLUMNS: u32 = 32;
/// Pixel rows per photodetector in LHCb mode
pub const PIXEL_ROWS_LHCB_MODE: u32 = 32;
/// Sub-pixels per LHCb mode pixel row in ALICE mode
pub const ALICE_SUB_PIXELS: u32 = 8;
/// Pixel rows per photodetector in ALICE mode
pub const PIXEL_ROWS_ALICE_MODE: u32 = PIXEL_ROWS_LHCB_MODE * ALICE_SUB_PIXELS;
/// Columns covered by one zero-suppressed occupancy byte
pub const COLUMNS_PER_ZS_BLOCK: u32 = 8;
/// Occupancy blocks in one pixel row
pub const ZS_BLOCKS_PER_ROW: u32 = PIXEL_COLUMNS / COLUMNS_PER_ZS_BLOCK;

/// Ingresses on one Level-1 board
pub const N_INGRESS_PER_L1: u32 = 4;
/// Inputs (photodetectors) per ingress
pub const N_INPUTS_PER_INGRESS: u32 = 12;
/// Inputs (photodetectors) per Level-1 board
pub const N_INPUTS_PER_L1: u32 = N_INGRESS_PER_L1 * N_INPUTS_PER_INGRESS;

/// Magic pattern in the first half-word of every raw bank
pub const RAW_BANK_MAGIC: u16 = 0xCBCB;
/// Raw bank header words (magic/size + type/version/source)
pub const RAW_BANK_HEADER_WORDS: usize = 2;
/// Raw bank type of RICH L1 banks
pub const RICH_BANK_TYPE: u8 = 9;
/// Raw bank type of the ODIN timing bank
pub const ODIN_BANK_TYPE: u8 = 16;
/// Data words in an ODIN bank
pub const ODIN_BANK_WORDS: usize = 4;
/// Significant bits of the ODIN bunch id
pub const ODIN_BX_ID_BITS: u8 = 12;

/// Location of the central (non time-offset) raw event
pub const CENTRAL_TAE_LOCATION: &str = "";

/// Default hit count above which zero suppression is not attempted
pub const DEFAULT_ZERO_SUPPRESS_HIT_CUT: usize = 96;
/// Default photodetector occupancy above which hits are force-suppressed
pub const DEFAULT_MAX_HPD_OCCUPANCY: usize = 200;
