// Bit layout of the 16-bit electronics address code
// solar: bits 0..9, group: bits 10..12, elink index: bits 13..15
pub const SOLAR_ID_MASK: u16 = 0x3FF;
pub const GROUP_ID_MASK: u16 = 0x1C00;
pub const ELINK_INDEX_MASK: u16 = 0xE000;
pub const GROUP_ID_SHIFT: u16 = 10;
pub const ELINK_INDEX_SHIFT: u16 = 13;

pub const MAX_SOLAR_ID: u32 = 1023;
pub const MAX_GROUP_ID: u32 = 7;
pub const MAX_ELINK_INDEX: u32 = 7;

// Bit layout of the 32-bit channel code
// dual sampa: bits 0..15, detection element: bits 16..31
pub const DS_ID_MASK: u32 = 0xFFFF;
pub const DE_ID_SHIFT: u32 = 16;
pub const MAX_DE_ID: u32 = 0xFFFF;
pub const MAX_DS_ID: u32 = 0xFFFF;

// Cabling of the readout crates
pub const SOLARS_PER_CRATE: u32 = 8;
pub const GROUPS_PER_SOLAR: u32 = 8;
pub const DUAL_SAMPAS_PER_GROUP: usize = 5;
// Only the first two dual sampas of a group are always cabled
pub const MANDATORY_DUAL_SAMPAS: usize = 2;
// An elink id is group * 5 + index, so 8 groups give 40 elinks per SOLAR
pub const ELINKS_PER_SOLAR: u8 = 40;

// Spreadsheet columns A..N
pub const SHEET_COLUMNS: usize = 14;
pub const DEFAULT_HEADER_ROWS: usize = 1;

// Binary table format
pub const BINARY_MAGIC: &[u8; 4] = b"MCHE";
pub const BINARY_FORMAT_VERSION: u16 = 1;
