//! Long File Name (VFAT) reassembly (component E).
//!
//! Grounded on `pvt_GetLongNameEntry`: the same three byte ranges per
//! 32-byte sub-entry (`[1,11)`, `[14,26)`, `[28,32)`, two bytes per
//! character of a UTF-16 code unit, little endian) and the same
//! skip-if-zero-or->126 filtering (this core only supports the printable
//! ASCII subset of a long name; anything outside `1..=126` is dropped
//! rather than transcoded).
//!
//! Sub-entries are stored on disk in *descending* ordinal order
//! immediately before the short entry they belong to (ordinal `N` first,
//! ordinal `1` last, adjacent to the short entry). Reassembly walks
//! ordinals `1..=N` ascending to build the name in reading order, which is
//! what `pvt_GetLongNameEntry` already does by stepping backward through
//! the sector from the short entry towards the first sub-entry.
//!
//! Two integrity checks guard that walk, both fatal (`CorruptFatEntry`)
//! when violated, matching `FAT.c`'s `LONG_NAME_LAST_ENTRY_FLAG`/ordinal-1
//! checks (e.g. `FAT.c:382`, `FAT.c:209/226/245/444/504`): the first
//! sub-entry encountered (highest ordinal) must carry `LAST_LONG_ENTRY`,
//! and the last one encountered (right before the short entry) must be
//! ordinal 1. A gap anywhere in the `1..=highest_ordinal` run is likewise
//! corrupt rather than silently truncated.

use super::error::FatError;

pub const MAX_ORDINALS: usize = 20; // 20 * 13 = 260 chars, comfortably above the 255-char VFAT cap.
pub const CHARS_PER_ENTRY: usize = 13;
pub const LONG_NAME_LEN_MAX: usize = MAX_ORDINALS * CHARS_PER_ENTRY;

pub const LAST_LONG_ENTRY: u8 = 0x40;
pub const ORDINAL_MASK: u8 = 0x3F;

/// Accumulates VFAT sub-entries for one name as they're encountered
/// (descending ordinal order) and reassembles the name once the matching
/// short entry is found.
pub struct LongNameAccumulator {
    chars: [u8; LONG_NAME_LEN_MAX],
    present: [bool; MAX_ORDINALS],
    highest_ordinal: u8,
    first_entry_had_last_flag: bool,
    last_fed_ordinal: u8,
}

impl LongNameAccumulator {
    pub fn new() -> Self {
        Self {
            chars: [0; LONG_NAME_LEN_MAX],
            present: [false; MAX_ORDINALS],
            highest_ordinal: 0,
            first_entry_had_last_flag: false,
            last_fed_ordinal: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.highest_ordinal == 0
    }

    pub fn reset(&mut self) {
        self.present = [false; MAX_ORDINALS];
        self.highest_ordinal = 0;
        self.first_entry_had_last_flag = false;
        self.last_fed_ordinal = 0;
    }

    /// Feeds one 32-byte LFN sub-entry. `raw[0]` is the ordinal byte
    /// (with `LAST_LONG_ENTRY` set on the highest ordinal).
    pub fn feed(&mut self, raw: &[u8; 32]) {
        let ordinal_byte = raw[0];
        let ordinal = ordinal_byte & ORDINAL_MASK;
        if ordinal == 0 || ordinal as usize > MAX_ORDINALS {
            return;
        }

        if self.is_empty() {
            self.first_entry_had_last_flag = ordinal_byte & LAST_LONG_ENTRY != 0;
        }

        if ordinal > self.highest_ordinal {
            self.highest_ordinal = ordinal;
        }

        let base = (ordinal as usize - 1) * CHARS_PER_ENTRY;
        let mut idx = base;

        for n in [(1usize, 11usize), (14, 26), (28, 32)] {
            let (lo, hi) = n;
            let mut p = lo;
            while p < hi {
                let b = raw[p];
                if b != 0 && b <= 126 {
                    if idx < self.chars.len() {
                        self.chars[idx] = b;
                        idx += 1;
                    }
                }
                p += 2; // each character is a little-endian UTF-16 code unit; high byte ignored for the ASCII subset.
            }
        }

        self.present[ordinal as usize - 1] = true;
        self.last_fed_ordinal = ordinal;
    }

    /// Reassembles the name in ordinal order, stopping at the first
    /// embedded NUL. Returns `Ok(None)` if no sub-entries were fed, and
    /// `Err(FatError::CorruptFatEntry)` if the first sub-entry encountered
    /// didn't carry `LAST_LONG_ENTRY`, the last one encountered wasn't
    /// ordinal 1, or any ordinal in `1..=highest_ordinal` is missing.
    pub fn finish<'a>(&'a self, out: &'a mut [u8; LONG_NAME_LEN_MAX]) -> Result<Option<&'a str>, FatError> {
        if self.is_empty() {
            return Ok(None);
        }
        if !self.first_entry_had_last_flag || self.last_fed_ordinal != 1 {
            return Err(FatError::CorruptFatEntry);
        }

        let mut len = 0;
        for ord in 1..=self.highest_ordinal {
            if !self.present[ord as usize - 1] {
                return Err(FatError::CorruptFatEntry);
            }
            let base = (ord as usize - 1) * CHARS_PER_ENTRY;
            let mut hit_end = false;
            for i in 0..CHARS_PER_ENTRY {
                let c = self.chars[base + i];
                if c == 0 {
                    hit_end = true;
                    break;
                }
                out[len] = c;
                len += 1;
            }
            if hit_end {
                break;
            }
        }

        Ok(core::str::from_utf8(&out[..len]).ok())
    }
}

impl Default for LongNameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
