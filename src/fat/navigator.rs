//! Directory navigator (component F): a mutable "current directory" cursor
//! with short/long name and parent-path state, plus `cd`, name resolution,
//! and directory listing.
//!
//! Grounded on `pvt_SetCurrentDirectoryToParent`/`pvt_SetCurrentDirectoryToChild`/
//! `pvt_CheckIllegalName` and the search loop in `FAT_SetCurrentDirectory`.
//! The search loop there walks raw sector offsets by hand to find the
//! short-name entry following an LFN chain; this crate gets the same
//! short/long pairing for free from [`super::dir::DirEntryStream`], so
//! `resolve` is just "scan entries, compare whichever name the entry
//! carries".

use super::boot_sector::Bpb;
use super::dir::{AttributeSet, DirEntryInfo, DirEntryStream};
use super::error::FatError;
use super::lfn::LONG_NAME_LEN_MAX;
use super::table::Cluster;
use crate::storage::Storage;

use generic_array::GenericArray;
use typenum::consts::U512;

use core::convert::TryInto;

const SHORT_NAME_MAX: usize = 8;
const PARENT_PATH_MAX: usize = 512;

const ILLEGAL_CHARACTERS: &[u8] = b"\\/:*?\"<>|";

/// `true` if `name` fails the legality pre-check: empty, leading space,
/// one of `\ / : * ? " < > |`, or entirely spaces.
pub fn is_illegal_name(name: &str) -> bool {
    if name.is_empty() || name.as_bytes()[0] == b' ' {
        return true;
    }
    if name.bytes().any(|b| ILLEGAL_CHARACTERS.contains(&b)) {
        return true;
    }
    name.bytes().all(|b| b == b' ')
}

fn set_bounded(buf: &mut [u8], len: &mut usize, s: &str) {
    let n = s.len().min(buf.len());
    buf[..n].copy_from_slice(&s.as_bytes()[..n]);
    *len = n;
}

/// Splits `buf` at the rightmost `/`, returning `(parent-including-slash,
/// name-after-slash)`. Mirrors `strrchr` plus the original's
/// include-the-slash `strlcpy` length.
fn split_last_segment(buf: &[u8]) -> (&[u8], &[u8]) {
    match buf.iter().rposition(|&b| b == b'/') {
        Some(idx) => (&buf[..=idx], &buf[idx + 1..]),
        None => (&buf[..0], buf),
    }
}

/// The "current directory" cursor: a cluster plus the short/long name and
/// parent-path bookkeeping needed to answer `cd ..`/`cd <child>`.
///
/// Invariant: `first_cluster == root_cluster` iff `long_name() == "/"` and
/// `long_parent_path()` is empty.
#[derive(Clone)]
pub struct DirCursor {
    pub first_cluster: Cluster,
    short_name: [u8; SHORT_NAME_MAX],
    short_name_len: usize,
    long_name: [u8; LONG_NAME_LEN_MAX],
    long_name_len: usize,
    short_parent_path: [u8; PARENT_PATH_MAX],
    short_parent_path_len: usize,
    long_parent_path: [u8; PARENT_PATH_MAX],
    long_parent_path_len: usize,
}

impl DirCursor {
    pub fn root(bpb: &Bpb) -> Self {
        let mut c = Self {
            first_cluster: bpb.root_cluster,
            short_name: [0; SHORT_NAME_MAX],
            short_name_len: 0,
            long_name: [0; LONG_NAME_LEN_MAX],
            long_name_len: 0,
            short_parent_path: [0; PARENT_PATH_MAX],
            short_parent_path_len: 0,
            long_parent_path: [0; PARENT_PATH_MAX],
            long_parent_path_len: 0,
        };
        set_bounded(&mut c.short_name, &mut c.short_name_len, "/");
        set_bounded(&mut c.long_name, &mut c.long_name_len, "/");
        c
    }

    pub fn short_name(&self) -> &str {
        core::str::from_utf8(&self.short_name[..self.short_name_len]).unwrap_or("")
    }

    pub fn long_name(&self) -> &str {
        core::str::from_utf8(&self.long_name[..self.long_name_len]).unwrap_or("")
    }

    pub fn short_parent_path(&self) -> &str {
        core::str::from_utf8(&self.short_parent_path[..self.short_parent_path_len]).unwrap_or("")
    }

    pub fn long_parent_path(&self) -> &str {
        core::str::from_utf8(&self.long_parent_path[..self.long_parent_path_len]).unwrap_or("")
    }

    fn is_root(&self) -> bool {
        self.long_name() == "/"
    }

    /// Owned copies of [`Self::long_name`]/[`Self::long_parent_path`], for
    /// hosts with a heap that would rather not re-borrow the cursor's fixed
    /// buffers across calls.
    #[cfg(feature = "alloc")]
    pub fn long_name_owned(&self) -> alloc::string::String {
        alloc::string::ToString::to_string(self.long_name())
    }

    #[cfg(feature = "alloc")]
    pub fn long_parent_path_owned(&self) -> alloc::string::String {
        alloc::string::ToString::to_string(self.long_parent_path())
    }

    /// Promotes the cursor into the child found at `first_cluster`, whose
    /// short/long names are `short`/`long` (short already truncated to
    /// `len(name)` per the original's quirk, not to first-space).
    fn descend_into(&mut self, first_cluster: Cluster, short: &str, long: &str) {
        let at_root = self.is_root();

        let cur_long_len = self.long_name_len;
        let mut cur_long = [0u8; LONG_NAME_LEN_MAX];
        cur_long[..cur_long_len].copy_from_slice(&self.long_name[..cur_long_len]);
        let cur_short_len = self.short_name_len;
        let mut cur_short = [0u8; SHORT_NAME_MAX];
        cur_short[..cur_short_len].copy_from_slice(&self.short_name[..cur_short_len]);

        let lp_len = self.long_parent_path_len;
        self.long_parent_path[lp_len..lp_len + cur_long_len].copy_from_slice(&cur_long[..cur_long_len]);
        self.long_parent_path_len = lp_len + cur_long_len;
        if !at_root {
            self.long_parent_path[self.long_parent_path_len] = b'/';
            self.long_parent_path_len += 1;
        }

        let sp_len = self.short_parent_path_len;
        self.short_parent_path[sp_len..sp_len + cur_short_len].copy_from_slice(&cur_short[..cur_short_len]);
        self.short_parent_path_len = sp_len + cur_short_len;
        if !at_root {
            self.short_parent_path[self.short_parent_path_len] = b'/';
            self.short_parent_path_len += 1;
        }

        set_bounded(&mut self.long_name, &mut self.long_name_len, long);
        set_bounded(&mut self.short_name, &mut self.short_name_len, short);
        self.first_cluster = first_cluster;
    }

    /// Pops the last path segment off the parent paths and promotes it into
    /// `short_name`/`long_name`; sets `first_cluster` to `parent_cluster`.
    fn ascend_to_parent(&mut self, parent_cluster: Cluster) {
        let lp_len = self.long_parent_path_len;
        let mut lp = [0u8; PARENT_PATH_MAX];
        lp[..lp_len].copy_from_slice(&self.long_parent_path[..lp_len]);
        let (new_parent, name) = split_last_segment(&lp[..lp_len]);
        let (new_parent_len, name_len) = (new_parent.len(), name.len());
        self.long_name[..name_len].copy_from_slice(name);
        self.long_name_len = name_len;
        self.long_parent_path[..new_parent_len].copy_from_slice(new_parent);
        self.long_parent_path_len = new_parent_len;

        let sp_len = self.short_parent_path_len;
        let mut sp = [0u8; PARENT_PATH_MAX];
        sp[..sp_len].copy_from_slice(&self.short_parent_path[..sp_len]);
        let (new_parent, name) = split_last_segment(&sp[..sp_len]);
        let (new_parent_len, name_len) = (new_parent.len(), name.len());
        self.short_name[..name_len].copy_from_slice(name);
        self.short_name_len = name_len;
        self.short_parent_path[..new_parent_len].copy_from_slice(new_parent);
        self.short_parent_path_len = new_parent_len;

        self.first_cluster = parent_cluster;
    }

    fn reset_to_root(&mut self, bpb: &Bpb) {
        *self = DirCursor::root(bpb);
    }
}

/// Scans the directory at `dir_cluster` for an entry matching `name`,
/// restricted to entries for which `accept` returns `true`. Entries that
/// match by name but fail `accept` are treated as a non-match and the scan
/// continues, mirroring `FAT_SetCurrentDirectory`'s behavior of skipping a
/// same-named entry of the wrong type rather than failing outright.
///
/// Used by [`cd`]. Short-name matching here is `FAT_SetCurrentDirectory`'s
/// quirk: the whole of `name` (not split on a `.`) is padded to 8 bytes and
/// compared against the raw short-name field, and only attempted when
/// `name` is under 9 bytes. For extension-aware short-name matching (the
/// way `FAT_PrintFile` does it) see [`resolve_with_extension`].
pub fn resolve<S: Storage<SECTOR_SIZE = U512>>(
    storage: &mut S,
    bpb: &Bpb,
    dir_cluster: Cluster,
    name: &str,
    accept: impl Fn(&DirEntryInfo) -> bool,
) -> Result<DirEntryInfo, FatError> {
    let mut stream = DirEntryStream::new(storage, bpb, dir_cluster);
    let name_fits_short = name.len() < 9;

    while let Some(entry) = stream.next_entry()? {
        let matches = if let Some(long) = entry.long_name() {
            long == name
        } else if name_fits_short {
            let mut padded = [b' '; SHORT_NAME_MAX];
            let n = name.len().min(SHORT_NAME_MAX);
            padded[..n].copy_from_slice(&name.as_bytes()[..n]);
            entry.short_name == padded
        } else {
            false
        };

        if matches && accept(&entry) {
            return Ok(entry);
        }
    }

    Err(FatError::NotFound)
}

/// Splits `name` at its first `.` (not counting a leading dot) into a
/// name part and an extension part; no extension if there's no `.`.
fn split_name_ext(name: &str) -> (&str, &str) {
    if name.len() < 2 {
        return (name, "");
    }
    match name[1..].find('.') {
        Some(idx) => (&name[..idx + 1], &name[idx + 2..]),
        None => (name, ""),
    }
}

/// Scans the directory at `dir_cluster` for an entry matching `name`,
/// the way [`file`](super::file) looks files up: entries without a long
/// name match by splitting `name` into an 8-byte name field and a 3-byte
/// extension field (both space-padded) and comparing both against the raw
/// short-name bytes, the way `FAT_PrintFile` does. Unlike [`resolve`],
/// there's no `len(name) < 9` restriction — `name` may include the `.ext`.
pub fn resolve_with_extension<S: Storage<SECTOR_SIZE = U512>>(
    storage: &mut S,
    bpb: &Bpb,
    dir_cluster: Cluster,
    name: &str,
    accept: impl Fn(&DirEntryInfo) -> bool,
) -> Result<DirEntryInfo, FatError> {
    let mut stream = DirEntryStream::new(storage, bpb, dir_cluster);
    let (name_part, ext_part) = split_name_ext(name);
    let short_name_candidate = name.len() <= 12 && !name.is_empty();

    while let Some(entry) = stream.next_entry()? {
        let matches = if let Some(long) = entry.long_name() {
            long == name
        } else if short_name_candidate {
            let mut padded_name = [b' '; SHORT_NAME_MAX];
            let n = name_part.len().min(SHORT_NAME_MAX);
            padded_name[..n].copy_from_slice(&name_part.as_bytes()[..n]);

            let mut padded_ext = [b' '; 3];
            let e = ext_part.len().min(3);
            padded_ext[..e].copy_from_slice(&ext_part.as_bytes()[..e]);

            entry.short_name == padded_name && entry.short_ext == padded_ext
        } else {
            false
        };

        if matches && accept(&entry) {
            return Ok(entry);
        }
    }

    Err(FatError::NotFound)
}

/// Moves `cursor` to `..`: re-reads the `..` entry at offset 32 of the
/// current directory's first sector and either resets to root (parent
/// cluster field is 0) or pops a path segment.
fn cd_dot_dot<S: Storage<SECTOR_SIZE = U512>>(
    storage: &mut S,
    bpb: &Bpb,
    cursor: &mut DirCursor,
) -> Result<(), FatError> {
    if cursor.first_cluster == bpb.root_cluster {
        return Ok(());
    }

    let mut sector: GenericArray<u8, U512> = GenericArray::default();
    storage
        .read_sector(bpb.cluster_to_sector(cursor.first_cluster), &mut sector)
        .map_err(|_| FatError::CorruptFatEntry)?;
    let s = sector.as_slice();
    const DOT_DOT: usize = 32;

    let cluster_hi = u16::from_le_bytes(s[DOT_DOT + 20..DOT_DOT + 22].try_into().unwrap());
    let cluster_lo = u16::from_le_bytes(s[DOT_DOT + 26..DOT_DOT + 28].try_into().unwrap());
    let parent_cluster = ((cluster_hi as u32) << 16) | cluster_lo as u32;

    if parent_cluster == 0 {
        cursor.reset_to_root(bpb);
    } else {
        cursor.ascend_to_parent(parent_cluster);
    }
    Ok(())
}

/// Changes `cursor` to `name`, atomically: the cursor is left untouched on
/// any error.
pub fn cd<S: Storage<SECTOR_SIZE = U512>>(
    storage: &mut S,
    bpb: &Bpb,
    cursor: &mut DirCursor,
    name: &str,
) -> Result<(), FatError> {
    if is_illegal_name(name) {
        return Err(FatError::IllegalName);
    }
    if name == "." {
        return Ok(());
    }
    if name == ".." {
        return cd_dot_dot(storage, bpb, cursor);
    }

    let entry = resolve(storage, bpb, cursor.first_cluster, name, |e| e.attrs.is_dir())?;

    // The short name recorded on the cursor is the on-disk short-name bytes
    // truncated to len(name), not to the first trailing space — matching
    // `pvt_SetCurrentDirectoryToChild`. The long name is simply `name`
    // itself: matching already confirmed it's how this entry is addressed.
    let sn_len = name.len().min(SHORT_NAME_MAX);
    let mut short_buf = [0u8; SHORT_NAME_MAX];
    short_buf[..sn_len].copy_from_slice(&entry.short_name[..sn_len]);
    let short = core::str::from_utf8(&short_buf[..sn_len]).unwrap_or("");

    cursor.descend_into(entry.cluster, short, name);
    Ok(())
}

/// A tiny bitflags stand-in: this crate only needs `contains`/construction
/// from OR'd constants, not the full `bitflags!` surface.
macro_rules! bitflags_lite {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $flag:ident = $val:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name(pub $ty);

        impl $name {
            $(pub const $flag: Self = Self($val);)*

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

bitflags_lite! {
    /// Which fields an entry must have populated (and which kinds of
    /// entries to skip) for [`list_entries`]. Grounded on
    /// `FAT_PrintCurrentDirectory`'s `entryFilter` argument.
    pub struct EntryFilter: u8 {
        const CREATION = 1 << 0;
        const LAST_ACCESS = 1 << 1;
        const LAST_MODIFIED = 1 << 2;
        const HIDDEN = 1 << 3;
        const SHORT_NAME = 1 << 4;
        const LONG_NAME = 1 << 5;
    }
}

/// Streams every entry of the directory at `dir_cluster` to `visit`,
/// skipping hidden entries unless [`EntryFilter::HIDDEN`] is set.
pub fn list_entries<S: Storage<SECTOR_SIZE = U512>>(
    storage: &mut S,
    bpb: &Bpb,
    dir_cluster: Cluster,
    filter: EntryFilter,
    mut visit: impl FnMut(&DirEntryInfo),
) -> Result<(), FatError> {
    let mut stream = DirEntryStream::new(storage, bpb, dir_cluster);
    while let Some(entry) = stream.next_entry()? {
        if entry.attrs.0 & AttributeSet::VOLUME_ID != 0 {
            continue;
        }
        if entry.attrs.is_hidden() && !filter.contains(EntryFilter::HIDDEN) {
            continue;
        }
        visit(&entry);
    }
    Ok(())
}
