//! Identifier Generation
//!
//! Identifiers are version 7 UUIDs: globally unique, sortable by creation
//! time, and rendered as fixed-length hyphenated lowercase hex that is safe
//! to embed as a key in any backend.
//!
//! # Layout
//!
//! ```text
//! | 48 bits: timestamp (ms since Unix epoch) | 4: version | 12: counter |
//! | 2: variant | 62: counter |
//! ```
//!
//! The counter starts at a random value in each millisecond. Fixed-width
//! hex keeps string order equal to numeric order.
//!
//! # Monotonicity
//!
//! Within one generator an identifier never sorts before one generated
//! earlier. When the clock has not advanced (same millisecond, or the wall
//! clock stepped backwards) the counter of the previous identifier is
//! incremented; if that overflows, generation moves to the next millisecond.
//! `Uuid::now_v7` alone gives no such guarantee across threads, and cannot
//! run on a simulated clock.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::{Builder, Uuid};

use crate::clock::{Clock, SystemClock};
use crate::constants::{
    IDENTIFIER_CHARS_COUNT, IDENTIFIER_COUNTER_BITS, IDENTIFIER_TIMESTAMP_BITS,
};

/// Mask for the counter (74 bits).
const COUNTER_MASK: u128 = (1 << IDENTIFIER_COUNTER_BITS) - 1;

/// Counter bits stored below the variant.
const COUNTER_LOW_BITS: u32 = 62;

/// Largest representable timestamp (48 bits).
const TIMESTAMP_MS_MAX: u64 = (1 << IDENTIFIER_TIMESTAMP_BITS) - 1;

/// UUID version carried by every identifier.
const IDENTIFIER_VERSION: usize = 7;

// =============================================================================
// Identifier
// =============================================================================

/// A generated, time-sortable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(Uuid);

impl Identifier {
    /// Assemble an identifier from its timestamp and counter.
    ///
    /// Components wider than their field are truncated.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_parts(timestamp_ms: u64, counter: u128) -> Self {
        let counter = counter & COUNTER_MASK;
        let high = (counter >> COUNTER_LOW_BITS) as u16;
        let low = (counter & ((1 << COUNTER_LOW_BITS) - 1)) as u64;

        let mut bytes = [0u8; 10];
        bytes[..2].copy_from_slice(&high.to_be_bytes());
        bytes[2..].copy_from_slice(&low.to_be_bytes());

        let uuid =
            Builder::from_unix_timestamp_millis(timestamp_ms.min(TIMESTAMP_MS_MAX), &bytes)
                .into_uuid();
        Self(uuid)
    }

    /// Milliseconds since the Unix epoch at generation time.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn timestamp_ms(self) -> u64 {
        (self.0.as_u128() >> (128 - IDENTIFIER_TIMESTAMP_BITS)) as u64
    }

    /// The 74-bit counter.
    #[must_use]
    pub fn counter(self) -> u128 {
        let value = self.0.as_u128();
        let high = (value >> 64) & 0x0fff;
        let low = value & ((1 << COUNTER_LOW_BITS) - 1);
        (high << COUNTER_LOW_BITS) | low
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// Errors from parsing an identifier string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The string has the wrong number of characters.
    #[error("identifier must be {expected} characters, got {actual}")]
    Length {
        /// Required length.
        expected: usize,
        /// Observed length.
        actual: usize,
    },

    /// Not a hyphenated UUID.
    #[error("malformed identifier: {0}")]
    Malformed(#[from] uuid::Error),

    /// A UUID of another version.
    #[error("identifier must be a version 7 uuid, got version {0}")]
    Version(usize),
}

impl FromStr for Identifier {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != IDENTIFIER_CHARS_COUNT {
            return Err(IdError::Length {
                expected: IDENTIFIER_CHARS_COUNT,
                actual: s.len(),
            });
        }

        let uuid = Uuid::parse_str(s)?;
        match uuid.get_version_num() {
            IDENTIFIER_VERSION => Ok(Self(uuid)),
            other => Err(IdError::Version(other)),
        }
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// IdGenerator
// =============================================================================

struct GeneratorState {
    last: Option<Identifier>,
    rng: ChaCha8Rng,
}

impl GeneratorState {
    fn fresh_counter(&mut self) -> u128 {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes[6..]);
        // Top counter bit starts clear.
        (u128::from_be_bytes(bytes) & COUNTER_MASK) >> 1
    }
}

/// Monotonic identifier generator, safe for concurrent use.
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// Generator on the system clock with OS-seeded randomness.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Arc::new(SystemClock), ChaCha8Rng::from_entropy())
    }

    /// Deterministic generator for tests: injected clock and fixed seed.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self::build(clock, ChaCha8Rng::seed_from_u64(seed))
    }

    fn build(clock: Arc<dyn Clock>, rng: ChaCha8Rng) -> Self {
        Self {
            clock,
            state: Mutex::new(GeneratorState { last: None, rng }),
        }
    }

    /// Generate the next identifier.
    pub fn new_id(&self) -> Identifier {
        let now_ms = self.clock.now_ms().min(TIMESTAMP_MS_MAX);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let last = state.last;
        let id = match last {
            Some(last) if now_ms <= last.timestamp_ms() => {
                let next = last.counter() + 1;
                if next > COUNTER_MASK {
                    let counter = state.fresh_counter();
                    Identifier::from_parts(last.timestamp_ms().saturating_add(1), counter)
                } else {
                    Identifier::from_parts(last.timestamp_ms(), next)
                }
            }
            _ => {
                let counter = state.fresh_counter();
                Identifier::from_parts(now_ms, counter)
            }
        };

        // Postcondition
        debug_assert!(last.map_or(true, |last| id > last), "identifiers must increase");

        state.last = Some(id);
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator").field("clock", &self.clock).finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
