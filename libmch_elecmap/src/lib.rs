//! # mch_elecmap
//!
//! mch_elecmap is the generator of the MCH electronic map, written in Rust. It takes the cabling
//! spreadsheet of the muon chambers, which lists for every group of dual sampas the CRU, crate,
//! SOLAR board and group it is read by, and turns it into static lookup tables between the
//! detector view of a dual sampa (detection element, dual sampa id) and its electronics view
//! (SOLAR id, group id, elink index).
//!
//! ## Building & Install
//!
//! To build and install the CLI use `cargo install --path ./mch_elecmap_cli` from the top level
//! repository. The binary is installed to your cargo install location (typically something like
//! `~/.cargo/bin/`). To use the CLI see the `mch_elecmap_cli` documentation.
//!
//! ## Configuration
//!
//! A generation is described by a [`config::Config`], which can be written as YAML:
//!
//! ```yml
//! inputs:
//! - sheets/ch5.csv
//! sheet: CH5R
//! header_rows: 1
//! chamber: CH5R
//! detection_elements: null
//! output_path: ch5r.rs
//! target: rust
//! fec_map_path: null
//! log_path: null
//! verbose: false
//! ```
//!
//! - `inputs`: exports of the cabling spreadsheet. A file is read as is; a directory is taken as
//! an exported workbook containing `<sheet>.csv` or `<sheet>.tsv`. Several inputs are read one
//! after the other.
//! - `sheet`: name of the sheet to read.
//! - `header_rows`: number of records to skip at the top of every input.
//! - `chamber`: optional name appended to the generated table names.
//! - `detection_elements`: `null` keeps every detection element, a list keeps only those.
//! - `output_path` / `target`: where and in which format (`rust`, `binary`, `yaml`) the tables
//! are written.
//! - `fec_map_path`: optional flat text dump of the selected cabling rows.
//!
//! ### Spreadsheet Format
//!
//! The sheet is read as delimited text (comma, or tab for `.tsv`) with the columns:
//!
//! ```csv
//! cru,fiber,crate,solar,solar_local_id,j,slat,length,de,ds1,ds2,ds3,ds4,ds5
//! ```
//!
//! The crate is written `C<number>` and the SOLAR `...-S<position>-J<group>` with 1-based
//! position and group. The SOLAR id is `crate * 8 + position - 1`. The first two dual sampa
//! columns are always filled; the others are blank or 0 when nothing is cabled. Rows without
//! crate, SOLAR, detection element or the first two dual sampas are spreadsheet padding and are
//! skipped.
//!
//! ## Output
//!
//! The tables are:
//!
//! - elec to det: `solar | group << 10 | index << 13` (u16) to `de << 16 | ds` (u32)
//! - cru to solars
//! - detection element to cru
//! - number of SOLAR boards
//!
//! Entries are sorted by key so that regenerated files only differ where the cabling does. A run
//! either writes all of its outputs or none of them: any malformed row, out of range id or
//! doubly-used address or dual sampa stops it before anything is written.
pub mod config;
pub mod constants;
pub mod ds_id;
pub mod elec_map;
pub mod emitter;
pub mod error;
pub mod process;
pub mod row;
pub mod sheet;
