//! A read-only FAT32 core (directory traversal, long-name reassembly, file
//! reads) sitting on top of a block-oriented SD-over-SPI transport.
//!
//! The crate has no opinion on how bytes actually move over a wire: callers
//! supply a [`sd::bus::SpiBus`] for the transport layer and a
//! [`fat::boot_sector::BootSectorLocator`] for finding the volume, and get
//! back a [`Storage`] impl (via [`sd::SdCard`]) plus the FAT navigation API
//! in [`fat`].

// Mark the crate as no_std if the feature is enabled (and only)
#![cfg_attr(all(feature = "no_std", not(test)), no_std)]

#[allow(unused_extern_crates)]
extern crate core; // makes rls actually look into the standard library (hack)

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg_attr(target_os = "none", panic_handler)]
#[cfg(target_os = "none")]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

macro_rules! using_std { ($($i:item)*) => ($(#[cfg(feature = "std")]$i)*) }

pub mod storage;
pub use storage::Storage;

pub mod util;
pub mod sink;
pub mod sd;
pub mod fat;
