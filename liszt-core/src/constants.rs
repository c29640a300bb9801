//! TigerStyle Constants
//!
//! Limits and defaults with units in the name, largest unit last.

/// Maximum length of a building or unit name in bytes.
pub const NAME_BYTES_MAX: usize = 255;

/// Maximum length of a resident first, middle or last name in bytes.
pub const PERSON_NAME_BYTES_MAX: usize = 128;

/// Length of a rendered identifier in characters.
pub const IDENTIFIER_CHARS_COUNT: usize = 36;

/// Bits of an identifier taken by the millisecond timestamp.
pub const IDENTIFIER_TIMESTAMP_BITS: u32 = 48;

/// Bits of an identifier taken by the per-millisecond counter.
pub const IDENTIFIER_COUNTER_BITS: u32 = 74;

/// Default per-call timeout applied by front ends, in milliseconds.
pub const REQUEST_TIMEOUT_MS_DEFAULT: u64 = 5_000;

/// Maximum connections in the SQL pool.
pub const SQL_POOL_CONNECTIONS_MAX: u32 = 10;

/// Time to wait for a pooled SQL connection, in milliseconds.
pub const SQL_ACQUIRE_TIMEOUT_MS: u64 = 3_000;

/// Time a SQLite writer waits for the database lock, in milliseconds.
pub const SQL_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default document table holding buildings.
pub const BUILDING_TABLE_NAME_DEFAULT: &str = "liszt_buildings";

/// Default document table holding units.
pub const UNIT_TABLE_NAME_DEFAULT: &str = "liszt_units";

/// Default document table holding residents.
pub const RESIDENT_TABLE_NAME_DEFAULT: &str = "liszt_residents";

/// Key attribute of every document item.
pub const ID_ATTRIBUTE_NAME: &str = "id";

/// Maximum items requested per DynamoDB scan page.
pub const SCAN_PAGE_ITEMS_MAX: i32 = 500;
