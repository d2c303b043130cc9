//! # rich_daq
//!
//! rich_daq is the RICH raw bank codec, written in Rust. It decodes the raw 32-bit word
//! stream produced by the RICH Level-1 read-out boards into per-photodetector hit
//! identifiers (RichSmartIDs), and encodes sets of hit identifiers back into wire
//! compatible raw banks. Eight wire formats are supported: `LHCb0` through `LHCb5`,
//! `FlatList` and `MaPMT0`.
//!
//! ## Installation
//!
//! The only method of install is from source.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./rich_daq_cli` from the top
//! level repository. The binary will be installed to your cargo install location
//! (typically something like `~/.cargo/bin/`).
//!
//! ## Configuration
//!
//! The CLI is driven by a YAML configuration file. `rich_daq_cli -p config.yml new` writes
//! a template with the defaults:
//!
//! ```yml
//! input_path: None
//! output_path: None
//! cabling_path: null
//! bank_version: LHCb5
//! zero_suppress_hit_cut: 96
//! max_hpd_occupancy: 200
//! hot_pixels: []
//! check_event_ids: true
//! check_odin_event_ids: false
//! check_odin_bx_ids: false
//! check_board_ids: false
//! check_parity: true
//! check_data_size: true
//! purge_corrupted_pds: true
//! use_fake_pd_id: false
//! decode_rich1: true
//! decode_rich2: true
//! tae_locations:
//! - ''
//! ```
//!
//! - `bank_version` is the format written when encoding. When decoding, the version is
//! read from each raw bank.
//! - `zero_suppress_hit_cut`: photodetectors with more hits than this are always written
//! as a full bitmap.
//! - `max_hpd_occupancy`: decoded photodetectors with more hits than this are emptied.
//! - `hot_pixels`: RichSmartID words of pixels to mask out of the decoded data.
//! - `check_*`: which integrity checks run. `purge_corrupted_pds` empties photodetectors
//! that fail a check.
//! - `use_fake_pd_id`: skip the cabling lookup and name photodetectors by their read-out
//! position.
//! - `tae_locations`: time-alignment locations. `''` is the central event. With more than
//! one location, each event in the raw file is that many consecutive records, one per
//! location in the listed order.
//!
//! If `cabling_path` is `null` the bundled default cabling is used.
//!
//! ### Cabling Format
//!
//! The cabling is a CSV file with *no* whitespaces and a header line. The columns are:
//!
//! ```csv
//! l1_board,l1_input,l0_id,rich,side,pd_type,pd_col,pd_num
//! ```
//!
//! `rich` is one of `rich1` or `rich2`, `side` is `0` or `1` and `pd_type` is one of `hpd`
//! or `mapmt`.
//!
//! ## Output
//!
//! Decoding writes a hit list with one line per event (and TAE location):
//!
//! ```text
//! 0: 0xF8000021 0xF8000122
//! 0/Prev1: 0xF8040005
//! ```
//!
//! and a summary YAML next to it (`<output_path>.summary.yml`) with per-board counts and
//! the integrity failures seen. Encoding reads the same hit-list format and writes a raw
//! data file. Both write a log file, `rich_daq.log`.
pub mod cabling;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod hardware_id;
pub mod ingress_header;
pub mod l1_bank;
pub mod l1_map;
pub mod odin;
pub mod pd_bank;
pub mod process;
pub mod raw_bank;
pub mod raw_file;
pub mod smart_id;
pub mod summary;
pub mod suppression;
pub mod worker_status;
