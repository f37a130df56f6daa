//! Session ID Generation
//!
//! Session IDs are opaque random tokens over a 64-symbol URL-safe alphabet
//! (`A-Z a-z 0-9 - _`). An ID is built from `strength` chunks, each chunk
//! being a cryptographically random draw from `[0, 64^10)` rendered as ten
//! base-64 digits, least-significant digit first. The default strength of 8
//! therefore yields an 80-character ID.
//!
//! The first character of an ID selects its lock shard; the first two
//! characters select its on-disk subdirectory. Neither is special in any
//! other way: the ID is uniform random throughout.
//!
//! The generator does **not** guarantee uniqueness. The store's create path
//! retries on collision, which with a 480-bit ID space is expected to happen
//! approximately never.

use crate::store::error::{SessionError, SessionResult};
use rand::rngs::OsRng;
use rand::TryRngCore;

/// The 64-symbol URL-safe alphabet session IDs are written in.
///
/// Index order matters: `shard_index` maps a symbol back to its position,
/// and the store keeps one shard handler per position.
pub const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Number of base-64 digits rendered per random chunk.
pub const CHUNK_DIGITS: usize = 10;

/// One chunk is a uniform draw from `[0, 64^10)` = `[0, 2^60)`, so masking
/// the low 60 bits of a uniform u64 is an exact uniform draw.
const CHUNK_MASK: u64 = (1 << 60) - 1;

/// Generates a fresh session ID of `strength * 10` characters.
///
/// Randomness comes from the operating system CSPRNG. A failing entropy
/// source is returned as [`SessionError::RandomSource`]; it is never
/// substituted with a weaker generator.
///
/// # Example
///
/// ```
/// let id = sessionfs::id::generate(8).unwrap();
/// assert_eq!(id.len(), 80);
/// ```
pub fn generate(strength: usize) -> SessionResult<String> {
    let mut id = String::with_capacity(strength * CHUNK_DIGITS);

    for _ in 0..strength {
        let mut raw = [0u8; 8];
        OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| SessionError::RandomSource(e.to_string()))?;

        let mut n = u64::from_le_bytes(raw) & CHUNK_MASK;
        for _ in 0..CHUNK_DIGITS {
            id.push(ALPHABET[(n & 0x3f) as usize] as char);
            n >>= 6;
        }
    }

    Ok(id)
}

/// Maps a leading ID byte to its shard slot (`0..64`), or `None` if the
/// byte is not part of the alphabet.
#[inline]
pub fn shard_index(byte: u8) -> Option<usize> {
    match byte {
        b'A'..=b'Z' => Some((byte - b'A') as usize),
        b'a'..=b'z' => Some((byte - b'a') as usize + 26),
        b'0'..=b'9' => Some((byte - b'0') as usize + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

/// Checks whether a caller-supplied ID is safe to route and splice into a
/// filesystem path: at least two characters (the subdirectory prefix) and
/// every byte drawn from the alphabet.
pub fn is_valid(id: &str) -> bool {
    id.len() >= 2 && id.bytes().all(|b| shard_index(b).is_some())
}
