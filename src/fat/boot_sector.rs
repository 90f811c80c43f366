//! Volume descriptor loader (component B): reads and validates the FAT32
//! BIOS Parameter Block.
//!
//! Grounded on `rrbutani-fatfs/src/fat/boot_sector.rs`'s `e!` byte
//! extraction macro and on `FAT_GetBiosParameterBlock`'s offsets and
//! validation order, trimmed to the fields this core actually consumes.

use crate::fat::error::FatError;
use crate::storage::Storage;

use generic_array::GenericArray;
use typenum::consts::U512;

use core::convert::TryInto;

/// Locates the first sector of a FAT32 volume. How it's found (partition
/// table lookup, a fixed offset, a superfloppy image) is outside this
/// crate's scope — implementors supply it.
pub trait BootSectorLocator<S: Storage<SECTOR_SIZE = U512>> {
    fn find_boot_sector(&mut self, storage: &mut S) -> Result<u64, FatError>;
}

/// A `BootSectorLocator` for volumes that start at a caller-known sector
/// (no partition table to walk).
pub struct FixedBootSector(pub u64);

impl<S: Storage<SECTOR_SIZE = U512>> BootSectorLocator<S> for FixedBootSector {
    fn find_boot_sector(&mut self, _storage: &mut S) -> Result<u64, FatError> {
        Ok(self.0)
    }
}

/// The subset of the FAT32 BIOS Parameter Block this core needs to walk
/// clusters and directories. Everything else in the real 90-byte BPB
/// (media descriptor, volume label, FS info sector, ...) is read by
/// nobody downstream, so it isn't kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bpb {
    pub boot_sector_lba: u64,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sector_count: u16,
    pub num_fats: u8,
    pub fat_size_sectors: u32,
    pub root_cluster: u32,
    /// First sector of the data region, i.e. where cluster 2 begins.
    pub data_region_first_sector: u64,
}

impl Bpb {
    /// Sector holding the FAT's first entry (`fat_lba` for cluster 0..128).
    pub fn fat_start_sector(&self) -> u64 {
        self.boot_sector_lba + self.reserved_sector_count as u64
    }

    pub fn cluster_to_sector(&self, cluster: u32) -> u64 {
        self.data_region_first_sector
            + ((cluster as u64).saturating_sub(2)) * self.sectors_per_cluster as u64
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }
}

/// Reads and validates the BPB at `boot_sector_lba`.
///
/// Validation mirrors `FAT_GetBiosParameterBlock`: boot signature at the
/// end of the sector, `bytes_per_sector == 512`, and `sectors_per_cluster`
/// a power of two in `1..=128`.
pub fn load_bpb<S: Storage<SECTOR_SIZE = U512>>(
    storage: &mut S,
    boot_sector_lba: u64,
) -> Result<Bpb, FatError> {
    let mut sector: GenericArray<u8, U512> = GenericArray::default();
    storage
        .read_sector(boot_sector_lba, &mut sector)
        .map_err(|_| FatError::NotABootSector)?;
    let s = sector.as_slice();

    if s[510] != 0x55 || s[511] != 0xAA {
        return Err(FatError::NotABootSector);
    }

    macro_rules! e {
        ($ty:tt, $offset:literal) => {
            $ty::from_le_bytes(s[$offset..($offset + core::mem::size_of::<$ty>())].try_into().unwrap())
        };
    }

    let bytes_per_sector: u16 = e!(u16, 0x00B);
    if bytes_per_sector != 512 {
        return Err(FatError::UnsupportedSectorSize);
    }

    let sectors_per_cluster: u8 = e!(u8, 0x00D);
    if !matches!(sectors_per_cluster, 1 | 2 | 4 | 8 | 16 | 32 | 64 | 128) {
        return Err(FatError::UnsupportedClusterSize);
    }

    let reserved_sector_count: u16 = e!(u16, 0x00E);
    let num_fats: u8 = e!(u8, 0x010);
    let fat_size_sectors: u32 = e!(u32, 0x024);
    let root_cluster: u32 = e!(u32, 0x02C);

    let data_region_first_sector =
        boot_sector_lba + reserved_sector_count as u64 + (num_fats as u64 * fat_size_sectors as u64);

    Ok(Bpb {
        boot_sector_lba,
        bytes_per_sector,
        sectors_per_cluster,
        reserved_sector_count,
        num_fats,
        fat_size_sectors,
        root_cluster,
        data_region_first_sector,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ReadError, WriteError};
    use core::convert::Infallible;

    struct FixedStorage(GenericArray<u8, U512>);

    impl Storage for FixedStorage {
        type SECTOR_SIZE = U512;
        type ReadErr = Infallible;
        type WriteErr = Infallible;

        fn read_sector(&mut self, idx: u64, buf: &mut GenericArray<u8, U512>) -> Result<(), ReadError<Infallible>> {
            if idx != 0 {
                return Err(ReadError::OutOfRange { requested_sector: idx });
            }
            buf.copy_from_slice(&self.0);
            Ok(())
        }

        fn write_sector(&mut self, _idx: u64, _buf: &GenericArray<u8, U512>) -> Result<(), WriteError<Infallible>> {
            unimplemented!()
        }

        fn sector_count(&self) -> u64 {
            1
        }
    }

    fn sector_with(bytes_per_sector: u16, sectors_per_cluster: u8) -> GenericArray<u8, U512> {
        let mut a = GenericArray::default();
        a[0x00B..0x00D].copy_from_slice(&bytes_per_sector.to_le_bytes());
        a[0x00D] = sectors_per_cluster;
        a[0x00E..0x010].copy_from_slice(&20u16.to_le_bytes());
        a[0x010] = 2;
        a[0x024..0x028].copy_from_slice(&100u32.to_le_bytes());
        a[0x02C..0x030].copy_from_slice(&2u32.to_le_bytes());
        a[510] = 0x55;
        a[511] = 0xAA;
        a
    }

    #[test]
    fn rejects_missing_signature() {
        let mut a = sector_with(512, 8);
        a[511] = 0x00;
        let mut s = FixedStorage(a);
        assert_eq!(load_bpb(&mut s, 0), Err(FatError::NotABootSector));
    }

    #[test]
    fn rejects_wrong_sector_size() {
        let mut s = FixedStorage(sector_with(1024, 8));
        assert_eq!(load_bpb(&mut s, 0), Err(FatError::UnsupportedSectorSize));
    }

    #[test]
    fn rejects_non_power_of_two_cluster_size() {
        let mut s = FixedStorage(sector_with(512, 3));
        assert_eq!(load_bpb(&mut s, 0), Err(FatError::UnsupportedClusterSize));
    }

    #[test]
    fn accepts_valid_bpb_and_computes_data_region() {
        let mut s = FixedStorage(sector_with(512, 8));
        let bpb = load_bpb(&mut s, 200).unwrap();
        assert_eq!(bpb.boot_sector_lba, 200);
        assert_eq!(bpb.reserved_sector_count, 20);
        assert_eq!(bpb.num_fats, 2);
        assert_eq!(bpb.fat_size_sectors, 100);
        assert_eq!(bpb.root_cluster, 2);
        assert_eq!(bpb.data_region_first_sector, 200 + 20 + 2 * 100);
        assert_eq!(bpb.fat_start_sector(), 220);
    }
}
