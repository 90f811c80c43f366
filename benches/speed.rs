//! A read benchmark that measures file-read throughput through
//! [`FatVolume::read_file_to_sink`] over an in-memory disk image.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use generic_array::GenericArray;
use sdfat::fat::{AttributeSet, FatVolume, FixedBootSector};
use sdfat::sink::ByteSink;
use sdfat::storage::{ReadError, Storage, WriteError};

use core::convert::Infallible;
use std::collections::HashMap;

use typenum::consts::U512;

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

/// Drops every byte it's handed; throughput-only, avoids allocation skewing
/// the measurement the way a sink that builds a `String` would.
struct CountingSink(u64);

impl ByteSink for CountingSink {
    fn put_byte(&mut self, _b: u8) {
        self.0 += 1;
    }
}

fn boot_sector() -> GenericArray<u8, U512> {
    let mut a: GenericArray<u8, U512> = GenericArray::default();
    a[0x00B..0x00D].copy_from_slice(&512u16.to_le_bytes());
    a[0x00D] = 1;
    a[0x00E..0x010].copy_from_slice(&10u16.to_le_bytes());
    a[0x010] = 1;
    a[0x024..0x028].copy_from_slice(&10u32.to_le_bytes());
    a[0x02C..0x030].copy_from_slice(&2u32.to_le_bytes());
    a[510] = 0x55;
    a[511] = 0xAA;
    a
}

/// Builds a disk whose root directory holds a single file, `DATA.BIN`,
/// spread across `cluster_count` one-sector clusters (starting at cluster 3,
/// since cluster 2 is the root directory itself) chained via the FAT.
fn disk_with_file(cluster_count: u32) -> DiskImage {
    let mut sectors = HashMap::new();
    sectors.insert(0, boot_sector());

    let file_size = cluster_count * 512;
    let mut root: GenericArray<u8, U512> = GenericArray::default();
    root[0..8].copy_from_slice(b"DATA    ");
    root[8..11].copy_from_slice(b"BIN");
    root[11] = AttributeSet::ARCHIVE;
    root[26..28].copy_from_slice(&3u16.to_le_bytes()); // first cluster: 3
    root[28..32].copy_from_slice(&file_size.to_le_bytes());
    sectors.insert(20, root);

    // data_region_first_sector is 20, so cluster N -> sector 18 + N. The FAT
    // itself starts at sector 10 with 128 four-byte entries per sector.
    const ENTRIES_PER_SECTOR: u32 = 128;
    for c in 3..3 + cluster_count {
        let mut content: GenericArray<u8, U512> = GenericArray::default();
        for (i, b) in content.iter_mut().enumerate() {
            *b = (i as u8).wrapping_add(c as u8);
        }
        sectors.insert(18 + c as u64, content);

        let next = if c + 1 < 3 + cluster_count { c + 1 } else { 0x0FFF_FFFF };
        let fat_sector = 10 + (c / ENTRIES_PER_SECTOR) as u64;
        let off = ((c % ENTRIES_PER_SECTOR) * 4) as usize;
        let fat = sectors.entry(fat_sector).or_insert_with(GenericArray::default);
        fat[off..off + 4].copy_from_slice(&next.to_le_bytes());
    }

    DiskImage(sectors)
}

fn bench_read_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("file read speed");

    for cluster_count in [2u32, 32, 256] {
        let file_bytes = (cluster_count * 512) as u64;
        group.throughput(Throughput::Bytes(file_bytes));
        group.bench_with_input(BenchmarkId::new("read_file_to_sink", file_bytes), &cluster_count, |b, &n| {
            let mut storage = disk_with_file(n);
            let vol = FatVolume::mount(&mut storage, &mut FixedBootSector(0)).unwrap();
            b.iter(|| {
                let mut sink = CountingSink(0);
                vol.read_file_to_sink(&mut storage, "DATA.BIN", &mut sink).unwrap();
                sink.0
            });
        });
    }
}

criterion_group!(benches, bench_read_speed);
criterion_main!(benches);
