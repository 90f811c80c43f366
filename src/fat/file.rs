//! File reader (component G): streams a matched file's cluster chain as
//! bytes, truncated at the directory entry's `file_size`.
//!
//! Grounded on `pvt_PrintFatFile`'s cluster/sector walk (same shape as
//! [`super::dir::RawEntryReader`], but over raw sector bytes instead of
//! 32-byte entries) and on [`super::navigator::resolve`] for finding the
//! entry in the first place. Unlike the original, reads stop at
//! `file_size` instead of running to the last cluster's trailing slack.

use super::boot_sector::Bpb;
use super::dir::DirEntryInfo;
use super::error::FatError;
use super::table::{self, Cluster, FatEntry};
use crate::sink::ByteSink;
use crate::storage::Storage;

use generic_array::GenericArray;
use typenum::consts::U512;

/// A read cursor over one file's cluster chain.
pub struct FileReader<'a, S> {
    storage: &'a mut S,
    bpb: &'a Bpb,
    cluster: Cluster,
    sector_in_cluster: u32,
    offset_in_sector: usize,
    sector_buf: GenericArray<u8, U512>,
    buf_loaded: bool,
    bytes_remaining: u32,
    at_end_of_chain: bool,
}

impl<'a, S: Storage<SECTOR_SIZE = U512>> FileReader<'a, S> {
    pub fn new(storage: &'a mut S, bpb: &'a Bpb, entry: &DirEntryInfo) -> Self {
        Self {
            storage,
            bpb,
            cluster: entry.cluster,
            sector_in_cluster: 0,
            offset_in_sector: 0,
            sector_buf: GenericArray::default(),
            buf_loaded: false,
            bytes_remaining: entry.file_size,
            at_end_of_chain: entry.file_size == 0,
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
                    self.at_end_of_chain = true;
                }
            }
        } else {
            self.sector_in_cluster += 1;
        }
        self.offset_in_sector = 0;
        self.buf_loaded = false;
        Ok(())
    }

    /// Fills `buf` with up to `buf.len()` bytes, stopping early at
    /// `file_size` or the end of the cluster chain. Returns the number of
    /// bytes written.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, FatError> {
        let mut written = 0;
        while written < buf.len() && self.bytes_remaining > 0 && !self.at_end_of_chain {
            self.load_sector_if_needed()?;

            let sector_len = self.bpb.bytes_per_sector as usize;
            let available_in_sector = sector_len - self.offset_in_sector;
            let n = available_in_sector
                .min(buf.len() - written)
                .min(self.bytes_remaining as usize);

            buf[written..written + n]
                .copy_from_slice(&self.sector_buf.as_slice()[self.offset_in_sector..self.offset_in_sector + n]);
            written += n;
            self.offset_in_sector += n;
            self.bytes_remaining -= n as u32;

            if self.offset_in_sector >= sector_len {
                self.advance_past_sector()?;
            }
        }
        Ok(written)
    }
}

/// Streams a matched file's contents to `sink`, expanding `\n` to `\r\n`
/// and dropping `\0`, mirroring `pvt_PrintFatFile`'s byte loop. Stops at
/// `entry.file_size` (see module docs for the deviation from the original).
pub fn read_file_to_sink<S: Storage<SECTOR_SIZE = U512>>(
    storage: &mut S,
    bpb: &Bpb,
    entry: &DirEntryInfo,
    sink: &mut impl ByteSink,
) -> Result<(), FatError> {
    let mut reader = FileReader::new(storage, bpb, entry);
    let mut buf = [0u8; 512];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
        for &b in &buf[..n] {
            match b {
                b'\n' => sink.put_str("\r\n"),
                0 => {}
                _ => sink.put_byte(b),
            }
        }
    }
}
