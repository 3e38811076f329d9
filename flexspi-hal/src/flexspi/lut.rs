//! LUT (look-up table) sequences.
//!
//! A LUT sequence is four 32-bit words holding up to eight instructions.
//! Words are built with [`mimxrt600_fcb::flexspi_lut_seq`], which packs two
//! `opcode | pads | operand` instructions per word.

use mimxrt600_fcb::flexspi_lut_seq;
use mimxrt600_fcb::FlexSpiLutOpcode::{
    CADDR_DDR, CMD_DDR, DUMMY_RWDS_DDR, RADDR_DDR, READ_DDR, STOP, WRITE_DDR,
};
use mimxrt600_fcb::FlexSpiNumPads::{Octal, Single};

/// Number of sequences the LUT holds.
pub const LUT_SEQUENCES: usize = 32;

/// Default LUT slot of the PSRAM read-data sequence.
pub const PSRAM_READ_DATA_SEQ: u8 = 11;

/// Default LUT slot of the PSRAM write-data sequence.
pub const PSRAM_WRITE_DATA_SEQ: u8 = 12;

/// One LUT sequence, ready to be written into a slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LutSequence([u32; 4]);

impl LutSequence {
    pub const fn from_words(words: [u32; 4]) -> Self {
        Self(words)
    }

    /// HyperBus read: 0xA0 command, row/column address, RWDS-driven
    /// latency, then DDR data on eight pads.
    pub const fn hyperram_read() -> Self {
        Self([
            flexspi_lut_seq(CMD_DDR, Octal, 0xa0, RADDR_DDR, Octal, 0x18),
            flexspi_lut_seq(CADDR_DDR, Octal, 0x10, DUMMY_RWDS_DDR, Octal, 0x06),
            flexspi_lut_seq(READ_DDR, Octal, 0x04, STOP, Single, 0x00),
            0,
        ])
    }

    /// HyperBus write, same framing as [`Self::hyperram_read`] with the
    /// 0x20 command.
    pub const fn hyperram_write() -> Self {
        Self([
            flexspi_lut_seq(CMD_DDR, Octal, 0x20, RADDR_DDR, Octal, 0x18),
            flexspi_lut_seq(CADDR_DDR, Octal, 0x10, DUMMY_RWDS_DDR, Octal, 0x06),
            flexspi_lut_seq(WRITE_DDR, Octal, 0x04, STOP, Single, 0x00),
            0,
        ])
    }

    pub const fn words(&self) -> [u32; 4] {
        self.0
    }
}
