//! `SdCard<BUS>`: the single/multi-block read, write, and erase sequences
//! for an SD card in SPI mode.
//!
//! Grounded on `sd_ReadSingleBlock`/`sd_WriteSingleBlock`/`sd_EraseBlocks`
//! (single-block read/write/erase command sequencing and timeout
//! constants) and `SD_PrintMultipleBlocks`/`SD_WriteMultipleBlocks`/
//! `SD_GetNumberOfWellWrittenBlocks` (multi-block read/write and the
//! well-written-block count, including its big-endian byte assembly) from
//! the AVR reference implementation this crate's protocol constants are
//! taken from.

use super::bus::{cmd, timeout, token, SpiBus, R1_OUT_OF_IDLE};
use super::status::{TransportError, TransportOutcome, TransportSuccess};
use crate::storage::{ReadError, Storage, WriteError};

use generic_array::GenericArray;
use typenum::consts::U512;

pub const BLOCK_LEN: usize = 512;

/// An SD card accessed in SPI mode over `BUS`.
pub struct SdCard<BUS> {
    bus: BUS,
    block_count: u64,
}

impl<BUS: SpiBus> SdCard<BUS> {
    /// Wraps an already-initialized bus (the `CMD0`/`ACMD41`/`CMD58`
    /// init handshake is an external collaborator per this crate's scope;
    /// by the time this is constructed the card is expected to answer
    /// block commands).
    pub fn new(bus: BUS, block_count: u64) -> Self {
        Self { bus, block_count }
    }

    fn send_command_and_get_r1(&mut self, cmd: u8, arg: u32) -> u8 {
        self.bus.send_command(cmd, arg);
        self.bus.get_r1()
    }

    fn wait_for_token(&mut self, expect: u8, limit: u32) -> Result<(), TransportError> {
        let mut tries = 0;
        loop {
            if self.bus.recv_byte() == expect {
                return Ok(());
            }
            tries += 1;
            if tries > limit {
                return Err(TransportError::StartTokenTimeout);
            }
        }
    }

    fn wait_while_busy(&mut self, limit: u32) -> Result<(), TransportError> {
        let mut tries = 0;
        while self.bus.recv_byte() == 0 {
            tries += 1;
            if tries > limit {
                return Err(TransportError::CardBusyTimeout);
            }
        }
        Ok(())
    }

    /// `sd_ReadSingleBlock` / CMD17.
    pub fn read_block(&mut self, addr: u32, block: &mut [u8; BLOCK_LEN]) -> (TransportOutcome, u8) {
        self.bus.cs_low();
        let r1 = self.send_command_and_get_r1(cmd::READ_SINGLE_BLOCK, addr);
        if r1 != R1_OUT_OF_IDLE {
            self.bus.cs_high();
            return (Err(TransportError::R1Error), r1);
        }

        let outcome = (|| {
            self.wait_for_token(token::START_BLOCK, timeout::SINGLE_BLOCK_TIMEOUT_LIMIT)?;
            for byte in block.iter_mut() {
                *byte = self.bus.recv_byte();
            }
            // 16-bit CRC, ignored (CRC generation/validation is external).
            self.bus.recv_byte();
            self.bus.recv_byte();
            // Trailing byte left in the shift register after the CRC; clocked
            // out here rather than left for the next command's first byte.
            self.bus.recv_byte();
            Ok(TransportSuccess::ReadSuccess)
        })();

        self.bus.cs_high();
        (outcome, r1)
    }

    /// `sd_WriteSingleBlock` / CMD24.
    pub fn write_block(&mut self, addr: u32, block: &[u8; BLOCK_LEN]) -> (TransportOutcome, u8) {
        self.bus.cs_low();
        let r1 = self.send_command_and_get_r1(cmd::WRITE_BLOCK, addr);
        if r1 != R1_OUT_OF_IDLE {
            self.bus.cs_high();
            return (Err(TransportError::R1Error), r1);
        }

        let outcome = self.write_data_block(block);
        self.bus.cs_high();
        (outcome, r1)
    }

    fn write_data_block(&mut self, block: &[u8; BLOCK_LEN]) -> TransportOutcome {
        self.bus.send_byte(token::START_BLOCK);
        for &byte in block.iter() {
            self.bus.send_byte(byte);
        }
        self.bus.send_byte(0xFF);
        self.bus.send_byte(0xFF);

        let mut tries = 0;
        let response = loop {
            let resp = self.bus.recv_byte();
            let masked = resp & token::DATA_RESPONSE_MASK;
            if masked == token::DATA_ACCEPTED
                || masked == token::DATA_CRC_ERROR
                || masked == token::DATA_WRITE_ERROR
            {
                break masked;
            }
            tries += 1;
            if tries > timeout::DATA_RESPONSE {
                return Err(TransportError::DataResponseTimeout);
            }
        };

        match response {
            token::DATA_ACCEPTED => {
                self.wait_while_busy(4 * timeout::SINGLE_BLOCK_TIMEOUT_LIMIT)?;
                Ok(TransportSuccess::DataAccepted)
            }
            token::DATA_CRC_ERROR => Err(TransportError::CrcErrorTokenReceived),
            token::DATA_WRITE_ERROR => Err(TransportError::WriteErrorTokenReceived),
            _ => Err(TransportError::InvalidDataResponse),
        }
    }

    /// `sd_EraseBlocks`: CMD32 (start addr), CMD33 (end addr), CMD38 (erase).
    pub fn erase_blocks(&mut self, start_addr: u32, end_addr: u32) -> TransportOutcome {
        self.bus.cs_low();
        let r1 = self.send_command_and_get_r1(cmd::ERASE_WR_BLK_START_ADDR, start_addr);
        self.bus.cs_high();
        if r1 != R1_OUT_OF_IDLE {
            return Err(TransportError::SetEraseStartAddrError);
        }

        self.bus.cs_low();
        let r1 = self.send_command_and_get_r1(cmd::ERASE_WR_BLK_END_ADDR, end_addr);
        self.bus.cs_high();
        if r1 != R1_OUT_OF_IDLE {
            return Err(TransportError::SetEraseEndAddrError);
        }

        self.bus.cs_low();
        let r1 = self.send_command_and_get_r1(cmd::ERASE, 0);
        if r1 != R1_OUT_OF_IDLE {
            self.bus.cs_high();
            return Err(TransportError::EraseError);
        }

        let result = self
            .wait_while_busy(4 * timeout::SINGLE_BLOCK_TIMEOUT_LIMIT)
            .map(|()| TransportSuccess::EraseSuccessful)
            .map_err(|_| TransportError::EraseBusyTimeout);
        self.bus.cs_high();
        result
    }

    /// `SD_PrintMultipleBlocks` / CMD18, generalized to hand each block to
    /// `on_block` instead of printing it.
    pub fn read_multi_blocks(
        &mut self,
        start_addr: u32,
        count: u32,
        mut on_block: impl FnMut(u32, &[u8; BLOCK_LEN]),
    ) -> TransportOutcome {
        self.bus.cs_low();
        let r1 = self.send_command_and_get_r1(cmd::READ_MULTIPLE_BLOCK, start_addr);
        if r1 != R1_OUT_OF_IDLE {
            self.bus.cs_high();
            return Err(TransportError::R1Error);
        }

        let mut block = [0u8; BLOCK_LEN];
        for i in 0..count {
            if let Err(e) = self.wait_for_token(token::START_BLOCK, timeout::START_TOKEN) {
                self.bus.cs_high();
                return Err(e);
            }
            for byte in block.iter_mut() {
                *byte = self.bus.recv_byte();
            }
            self.bus.recv_byte();
            self.bus.recv_byte();
            on_block(i, &block);
        }

        self.bus.send_command(cmd::STOP_TRANSMISSION, 0);
        self.bus.recv_byte(); // R1b, discarded.
        self.bus.cs_high();
        Ok(TransportSuccess::ReadSuccess)
    }

    /// `SD_WriteMultipleBlocks` / CMD25. `blocks` is the source of each
    /// block, one at a time, to avoid requiring the whole payload resident
    /// at once.
    pub fn write_multi_blocks(
        &mut self,
        start_addr: u32,
        count: u32,
        mut blocks: impl FnMut(u32) -> [u8; BLOCK_LEN],
    ) -> TransportOutcome {
        self.bus.cs_low();
        let r1 = self.send_command_and_get_r1(cmd::WRITE_MULTIPLE_BLOCK, start_addr);
        if r1 != R1_OUT_OF_IDLE {
            self.bus.cs_high();
            return Err(TransportError::R1Error);
        }

        let mut outcome = Ok(TransportSuccess::DataAccepted);
        for i in 0..count {
            let block = blocks(i);
            self.bus.send_byte(token::START_BLOCK_MULTI_WRITE);
            for &byte in block.iter() {
                self.bus.send_byte(byte);
            }
            self.bus.send_byte(0xFF);
            self.bus.send_byte(0xFF);

            let mut tries = 0;
            let response = loop {
                let resp = self.bus.recv_byte();
                let masked = resp & token::DATA_RESPONSE_MASK;
                if masked == token::DATA_ACCEPTED
                    || masked == token::DATA_CRC_ERROR
                    || masked == token::DATA_WRITE_ERROR
                {
                    break masked;
                }
                tries += 1;
                if tries > timeout::DATA_RESPONSE {
                    self.bus.cs_high();
                    return Err(TransportError::DataResponseTimeout);
                }
            };

            match response {
                token::DATA_ACCEPTED => {
                    if let Err(e) = self.wait_while_busy(timeout::CARD_BUSY) {
                        self.bus.cs_high();
                        return Err(e);
                    }
                }
                token::DATA_CRC_ERROR => {
                    outcome = Err(TransportError::CrcErrorTokenReceived);
                    break;
                }
                token::DATA_WRITE_ERROR => {
                    outcome = Err(TransportError::WriteErrorTokenReceived);
                    break;
                }
                _ => unreachable!("masked response only takes the three values checked above"),
            }
        }

        self.bus.send_byte(token::STOP_TRAN);
        if let Err(e) = self.wait_while_busy(timeout::CARD_BUSY) {
            self.bus.cs_high();
            return Err(e);
        }

        self.bus.cs_high();
        outcome
    }

    /// `SD_GetNumberOfWellWrittenBlocks`: ACMD22. The 32-bit count comes
    /// back big-endian even though every other multi-byte field this
    /// crate decodes (BPB fields, FAT entries, directory entry fields) is
    /// little-endian — preserved faithfully rather than "fixed".
    pub fn get_num_well_written_blocks(&mut self) -> Result<u32, TransportError> {
        self.bus.cs_low();
        let r1 = self.send_command_and_get_r1(cmd::APP_CMD, 0);
        if r1 != R1_OUT_OF_IDLE {
            self.bus.cs_high();
            return Err(TransportError::R1Error);
        }

        let r1 = self.send_command_and_get_r1(cmd::SEND_NUM_WR_BLOCKS, 0);
        if r1 != R1_OUT_OF_IDLE {
            self.bus.cs_high();
            return Err(TransportError::R1Error);
        }

        if let Err(e) = self.wait_for_token(token::START_BLOCK, timeout::START_TOKEN) {
            self.bus.cs_high();
            return Err(e);
        }

        let mut count: u32 = 0;
        for _ in 0..4 {
            count <<= 8;
            count |= self.bus.recv_byte() as u32;
        }
        self.bus.recv_byte();
        self.bus.recv_byte();

        self.bus.cs_high();
        Ok(count)
    }
}

impl<BUS: SpiBus> Storage for SdCard<BUS> {
    type SECTOR_SIZE = U512;
    type ReadErr = TransportError;
    type WriteErr = TransportError;

    fn read_sector(
        &mut self,
        sector_idx: u64,
        buffer: &mut GenericArray<u8, U512>,
    ) -> Result<(), ReadError<TransportError>> {
        if sector_idx >= self.block_count {
            return Err(ReadError::OutOfRange { requested_sector: sector_idx });
        }
        let mut block = [0u8; BLOCK_LEN];
        let (outcome, _r1) = self.read_block(sector_idx as u32, &mut block);
        outcome.map_err(ReadError::Other)?;
        buffer.as_mut_slice().copy_from_slice(&block);
        Ok(())
    }

    fn write_sector(
        &mut self,
        sector_idx: u64,
        buffer: &GenericArray<u8, U512>,
    ) -> Result<(), WriteError<TransportError>> {
        if sector_idx >= self.block_count {
            return Err(WriteError::OutOfRange { requested_sector: sector_idx });
        }
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(buffer.as_slice());
        let (outcome, _r1) = self.write_block(sector_idx as u32, &block);
        outcome.map(|_| ()).map_err(WriteError::Other)
    }

    fn sector_count(&self) -> u64 {
        self.block_count
    }
}

