//! Directory-entry stream (component D): walks the 32-byte entries of a
//! directory's cluster chain, classifying each as a short entry, a VFAT
//! long-name sub-entry, a deleted entry, or the end-of-directory marker,
//! and folding long-name sub-entries into the [`DirEntryInfo`] for the
//! short entry that follows them.
//!
//! The three ways a long name can sit relative to sector/cluster
//! boundaries (spec: entirely within one sector, ending exactly at a
//! sector boundary, or spanning across one) all fall out of reading
//! 32-byte entries one at a time from [`super::table::next_cluster`]-driven
//! sector stepping — no case-by-case logic is needed since an entry is
//! always fully buffered before it's handed to the long-name accumulator.

use super::boot_sector::Bpb;
use super::error::FatError;
use super::lfn::{LongNameAccumulator, LONG_NAME_LEN_MAX};
use super::table::{self, Cluster, FatEntry};
use crate::storage::Storage;
use crate::util::Bits;

use generic_array::GenericArray;
use typenum::consts::U512;

use core::convert::TryInto;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSet(pub u8);

impl AttributeSet {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
    pub const LONG_NAME: u8 = Self::READ_ONLY | Self::HIDDEN | Self::SYSTEM | Self::VOLUME_ID;

    pub fn is_long_name(self) -> bool {
        self.0 == Self::LONG_NAME
    }
    pub fn is_dir(self) -> bool {
        self.0.bit(4) // DIRECTORY
    }
    pub fn is_hidden(self) -> bool {
        self.0.bit(1) // HIDDEN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Exists,
    Deleted,
    End,
}

fn entry_state(raw: &[u8; 32]) -> EntryState {
    match raw[0] {
        0x00 => EntryState::End,
        0xE5 => EntryState::Deleted,
        _ => EntryState::Exists,
    }
}

/// A fully decoded directory entry: the short name fields plus any
/// reassembled long name that preceded it on disk.
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub short_name: [u8; 8],
    pub short_ext: [u8; 3],
    pub attrs: AttributeSet,
    pub creation_date: u16,
    pub creation_time: u16,
    pub last_access_date: u16,
    pub last_write_date: u16,
    pub last_write_time: u16,
    pub cluster: Cluster,
    pub file_size: u32,
    long_name_buf: [u8; LONG_NAME_LEN_MAX],
    long_name_len: usize,
}

impl DirEntryInfo {
    pub fn long_name(&self) -> Option<&str> {
        if self.long_name_len == 0 {
            None
        } else {
            core::str::from_utf8(&self.long_name_buf[..self.long_name_len]).ok()
        }
    }

    /// Owned copy of [`Self::long_name`] (empty string if there is none),
    /// for hosts with a heap.
    #[cfg(feature = "alloc")]
    pub fn long_name_owned(&self) -> alloc::string::String {
        alloc::string::ToString::to_string(self.long_name().unwrap_or(""))
    }

    /// `NAME    `/`EXT` with trailing spaces dropped, joined with `.` if
    /// there's an extension.
    pub fn short_name_display(&self, out: &mut [u8; 12]) -> usize {
        let mut len = 0;
        for &b in &self.short_name {
            if b == b' ' {
                break;
            }
            out[len] = b;
            len += 1;
        }
        if self.short_ext[0] != b' ' {
            out[len] = b'.';
            len += 1;
            for &b in &self.short_ext {
                if b == b' ' {
                    break;
                }
                out[len] = b;
                len += 1;
            }
        }
        len
    }

    pub(crate) fn from_short_raw(raw: &[u8; 32], long: Option<&str>) -> Self {
        macro_rules! e {
            ($ty:tt, $offset:literal) => {
                $ty::from_le_bytes(raw[$offset..($offset + core::mem::size_of::<$ty>())].try_into().unwrap())
            };
        }

        let cluster_hi: u16 = e!(u16, 20);
        let cluster_lo: u16 = e!(u16, 26);

        let mut long_name_buf = [0u8; LONG_NAME_LEN_MAX];
        let mut long_name_len = 0;
        if let Some(s) = long {
            long_name_len = s.len().min(LONG_NAME_LEN_MAX);
            long_name_buf[..long_name_len].copy_from_slice(&s.as_bytes()[..long_name_len]);
        }

        Self {
            short_name: raw[0..8].try_into().unwrap(),
            short_ext: raw[8..11].try_into().unwrap(),
            attrs: AttributeSet(raw[11]),
            creation_time: e!(u16, 14),
            creation_date: e!(u16, 16),
            last_access_date: e!(u16, 18),
            last_write_time: e!(u16, 22),
            last_write_date: e!(u16, 24),
            cluster: ((cluster_hi as u32) << 16) | (cluster_lo as u32),
            file_size: e!(u32, 28),
            long_name_buf,
            long_name_len,
        }
    }
}

/// Reads raw 32-byte entries from a directory's cluster chain, one sector
/// at a time, stepping to the next cluster via [`table::next_cluster`]
/// when [`table::is_last_sector_of_cluster`] says the current sector is
/// the cluster's last.
struct RawEntryReader<'a, S> {
    storage: &'a mut S,
    bpb: &'a Bpb,
    cluster: Cluster,
    sector_in_cluster: u32,
    offset_in_sector: usize,
    sector_buf: GenericArray<u8, U512>,
    buf_loaded: bool,
    done: bool,
}

impl<'a, S: Storage<SECTOR_SIZE = U512>> RawEntryReader<'a, S> {
    fn new(storage: &'a mut S, bpb: &'a Bpb, start_cluster: Cluster) -> Self {
        Self {
            storage,
            bpb,
            cluster: start_cluster,
            sector_in_cluster: 0,
            offset_in_sector: 0,
            sector_buf: GenericArray::default(),
            buf_loaded: false,
            done: false,
        }
    }

    fn load_sector_if_needed(&mut self) -> Result<(), FatError> {
        if self.buf_loaded {
            return Ok(());
        }
        let lba = self.bpb.cluster_to_sector(self.cluster) + self.sector_in_cluster as u64;
        self.storage
            .read_sector(lba, &mut self.sector_buf)
            .map_err(|_| FatError::CorruptFatEntry)?;
        self.buf_loaded = true;
        Ok(())
    }

    fn advance_past_sector(&mut self) -> Result<(), FatError> {
        if table::is_last_sector_of_cluster(self.bpb, self.sector_in_cluster) {
            match table::next_cluster(self.storage, self.bpb, self.cluster)? {
                FatEntry::Next(c) => {
                    self.cluster = c;
                    self.sector_in_cluster = 0;
                }
                FatEntry::EndOfChain | FatEntry::Free => {
                    self.done = true;
                }
            }
        } else {
            self.sector_in_cluster += 1;
        }
        self.offset_in_sector = 0;
        self.buf_loaded = false;
        Ok(())
    }

    fn next_raw(&mut self) -> Result<Option<[u8; 32]>, FatError> {
        if self.done {
            return Ok(None);
        }
        self.load_sector_if_needed()?;

        let entry: [u8; 32] = self.sector_buf.as_slice()[self.offset_in_sector..self.offset_in_sector + 32]
            .try_into()
            .unwrap();
        self.offset_in_sector += 32;

        if self.offset_in_sector >= self.bpb.bytes_per_sector as usize {
            self.advance_past_sector()?;
        }

        Ok(Some(entry))
    }
}

/// Streams [`DirEntryInfo`] records out of the directory rooted at
/// `start_cluster`, folding preceding VFAT long-name sub-entries into the
/// short entry that follows them. Stops at the end-of-directory marker;
/// deleted entries (and any long-name sub-entries orphaned by one) are
/// skipped silently, matching the original's behavior of simply not
/// printing them.
pub struct DirEntryStream<'a, S> {
    reader: RawEntryReader<'a, S>,
    acc: LongNameAccumulator,
}

impl<'a, S: Storage<SECTOR_SIZE = U512>> DirEntryStream<'a, S> {
    pub fn new(storage: &'a mut S, bpb: &'a Bpb, start_cluster: Cluster) -> Self {
        Self {
            reader: RawEntryReader::new(storage, bpb, start_cluster),
            acc: LongNameAccumulator::new(),
        }
    }

    pub fn next_entry(&mut self) -> Result<Option<DirEntryInfo>, FatError> {
        loop {
            let raw = match self.reader.next_raw()? {
                Some(r) => r,
                None => return Ok(None),
            };

            match entry_state(&raw) {
                EntryState::End => return Ok(None),
                EntryState::Deleted => {
                    self.acc.reset();
                    continue;
                }
                EntryState::Exists => {}
            }

            let attrs = AttributeSet(raw[11]);
            if attrs.is_long_name() {
                self.acc.feed(&raw);
                continue;
            }

            let mut buf = [0u8; LONG_NAME_LEN_MAX];
            let long = self.acc.finish(&mut buf)?;
            let info = DirEntryInfo::from_short_raw(&raw, long);
            self.acc.reset();
            return Ok(Some(info));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fat::lfn::LAST_LONG_ENTRY;
    use crate::storage::{ReadError, WriteError};
    use core::convert::Infallible;
    use std::collections::HashMap;

    struct DiskImage(HashMap<u64, GenericArray<u8, U512>>);

    impl Storage for DiskImage {
        type SECTOR_SIZE = U512;
        type ReadErr = Infallible;
        type WriteErr = Infallible;

        fn read_sector(&mut self, idx: u64, buf: &mut GenericArray<u8, U512>) -> Result<(), ReadError<Infallible>> {
            match self.0.get(&idx) {
                Some(s) => {
                    buf.copy_from_slice(s);
                    Ok(())
                }
                None => Err(ReadError::OutOfRange { requested_sector: idx }),
            }
        }
        fn write_sector(&mut self, _idx: u64, _buf: &GenericArray<u8, U512>) -> Result<(), WriteError<Infallible>> {
            unimplemented!()
        }
        fn sector_count(&self) -> u64 {
            self.0.len() as u64
        }
    }

    fn test_bpb() -> Bpb {
        Bpb {
            boot_sector_lba: 0,
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sector_count: 10,
            num_fats: 1,
            fat_size_sectors: 10,
            root_cluster: 2,
            data_region_first_sector: 20,
        }
    }

    fn lfn_entry(ordinal: u8, last: bool, text: &str) -> [u8; 32] {
        let mut e = [0u8; 32];
        e[0] = ordinal | if last { LAST_LONG_ENTRY } else { 0 };
        e[11] = AttributeSet::LONG_NAME;
        let mut bytes = text.bytes();
        for (lo, hi) in [(1usize, 11usize), (14, 26), (28, 32)] {
            let mut p = lo;
            while p < hi {
                e[p] = bytes.next().unwrap_or(0);
                p += 2;
            }
        }
        e
    }

    fn short_entry(name: &[u8; 8], ext: &[u8; 3], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
        let mut e = [0u8; 32];
        e[0..8].copy_from_slice(name);
        e[8..11].copy_from_slice(ext);
        e[11] = attr;
        e[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
        e[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
        e[28..32].copy_from_slice(&size.to_le_bytes());
        e
    }

    fn end_entry() -> [u8; 32] {
        [0u8; 32]
    }

    fn put_sector(sectors: &mut HashMap<u64, GenericArray<u8, U512>>, lba: u64, entries: &[[u8; 32]]) {
        let mut a: GenericArray<u8, U512> = GenericArray::default();
        for (i, e) in entries.iter().enumerate() {
            a[i * 32..i * 32 + 32].copy_from_slice(e);
        }
        sectors.insert(lba, a);
    }

    #[test]
    fn short_entry_with_single_sector_lfn() {
        let bpb = test_bpb();
        let mut sectors = HashMap::new();
        put_sector(
            &mut sectors,
            20, // cluster 2 -> data_region_first_sector + (2-2)*1
            &[
                lfn_entry(1, true, "notes.txt"),
                short_entry(b"NOTES   ", b"TXT", 0x20, 5, 42),
                end_entry(),
            ],
        );
        let mut storage = DiskImage(sectors);
        let mut stream = DirEntryStream::new(&mut storage, &bpb, 2);

        let e = stream.next_entry().unwrap().unwrap();
        assert_eq!(e.long_name(), Some("notes.txt"));
        assert_eq!(e.cluster, 5);
        assert_eq!(e.file_size, 42);
        assert!(stream.next_entry().unwrap().is_none());
    }

    #[test]
    fn empty_directory_terminates_immediately() {
        let bpb = test_bpb();
        let mut sectors = HashMap::new();
        put_sector(&mut sectors, 20, &[end_entry()]);
        let mut storage = DiskImage(sectors);
        let mut stream = DirEntryStream::new(&mut storage, &bpb, 2);
        assert!(stream.next_entry().unwrap().is_none());
    }

    #[test]
    fn deleted_entry_is_skipped_and_orphans_pending_lfn() {
        let bpb = test_bpb();
        let mut sectors = HashMap::new();
        let mut deleted = short_entry(b"OLD     ", b"TXT", 0x20, 3, 1);
        deleted[0] = 0xE5;
        put_sector(
            &mut sectors,
            20,
            &[
                lfn_entry(1, true, "orphaned.txt"),
                deleted,
                short_entry(b"KEPT    ", b"TXT", 0x20, 6, 2),
                end_entry(),
            ],
        );
        let mut storage = DiskImage(sectors);
        let mut stream = DirEntryStream::new(&mut storage, &bpb, 2);

        let e = stream.next_entry().unwrap().unwrap();
        assert_eq!(e.long_name(), None);
        assert_eq!(e.cluster, 6);
    }

    #[test]
    fn long_name_spanning_a_cluster_boundary_reassembles() {
        let bpb = test_bpb();
        let mut sectors = HashMap::new();
        // cluster 2 -> sector 20 (sectors_per_cluster == 1), chained to cluster 3 -> sector 21.
        // The cluster-2 sector holds 16 entry slots; the ordinal-2 sub-entry
        // must be the last one so the boundary is actually exercised, so the
        // slots before it are filled with deleted (skipped, non-resetting)
        // filler rather than left zeroed (which would read as the
        // end-of-directory marker before the real boundary is reached).
        let mut deleted_filler = end_entry();
        deleted_filler[0] = 0xE5;
        let mut cluster2_entries = [deleted_filler; 16];
        cluster2_entries[15] = lfn_entry(2, true, "ondary_name.md");
        put_sector(&mut sectors, 20, &cluster2_entries);
        put_sector(
            &mut sectors,
            21,
            &[
                lfn_entry(1, false, "a_name_that_crosses_a_bo"),
                short_entry(b"ANAMET~1", b"MD ", 0x20, 9, 7),
                end_entry(),
            ],
        );
        // FAT for cluster 2 points at cluster 3.
        let mut fat_sector: GenericArray<u8, U512> = GenericArray::default();
        fat_sector[8..12].copy_from_slice(&3u32.to_le_bytes()); // entry for cluster 2 (2 * 4 = offset 8)
        sectors.insert(10, fat_sector); // fat_start_sector = boot_sector_lba(0) + reserved(10)

        let mut storage = DiskImage(sectors);
        let mut stream = DirEntryStream::new(&mut storage, &bpb, 2);

        let e = stream.next_entry().unwrap().unwrap();
        assert_eq!(e.long_name(), Some("a_name_that_crosses_a_bondary_name.md"));
        assert_eq!(e.cluster, 9);
    }
}
