//! Boot ROM data placed ahead of the image on the FlexSPI0 octal flash of
//! the RT595 EVK (Macronix MX25UM51345G, 64 MiB).

#![no_std]

use mimxrt600_fcb::FlexSpiLutOpcode::{
    CMD_DDR, CMD_SDR, DUMMY_DDR, RADDR_DDR, READ_DDR, READ_SDR, STOP, WRITE_DDR, WRITE_SDR,
};
use mimxrt600_fcb::FlexSpiNumPads::{Octal, Single};
use mimxrt600_fcb::{flexspi_lut_seq, FlexSPIFlashConfigurationBlock};

// boot image version, generated by build.rs from Cargo.toml
include!(concat!(env!("OUT_DIR"), "/biv.rs"));

#[link_section = ".otfad"]
#[used]
static OTFAD: [u8; 256] = [0; 256];

// Must fill the FCB region of memory.x exactly.
const _: () = assert!(core::mem::size_of::<FlexSPIFlashConfigurationBlock>() == 512);

#[rustfmt::skip]
#[link_section = ".fcb"]
#[used]
static FCB: FlexSPIFlashConfigurationBlock = FlexSPIFlashConfigurationBlock::build()
    .sflash_a1_size(0x0400_0000)
    .sflash_b1_size(0)
    .lookup_table([
        // Read
        flexspi_lut_seq(CMD_DDR, Octal, 0xee, CMD_DDR, Octal, 0x11),
        flexspi_lut_seq(RADDR_DDR, Octal, 0x20, DUMMY_DDR, Octal, 0x29),
        flexspi_lut_seq(READ_DDR, Octal, 0x04, STOP, Single, 0x00),
        0,
        // Read status, SPI
        flexspi_lut_seq(CMD_SDR, Single, 0x05, READ_SDR, Single, 0x04),
        0,
        0,
        0,
        // Read status, OPI
        flexspi_lut_seq(CMD_DDR, Octal, 0x05, CMD_DDR, Octal, 0xfa),
        flexspi_lut_seq(RADDR_DDR, Octal, 0x20, DUMMY_DDR, Octal, 0x14),
        flexspi_lut_seq(READ_DDR, Octal, 0x04, STOP, Single, 0x00),
        0,
        // Write enable, SPI
        flexspi_lut_seq(CMD_SDR, Single, 0x06, STOP, Single, 0x00),
        0,
        0,
        0,
        // Write enable, OPI
        flexspi_lut_seq(CMD_DDR, Octal, 0x06, CMD_DDR, Octal, 0xf9),
        0,
        0,
        0,
        // Sector erase
        flexspi_lut_seq(CMD_DDR, Octal, 0x21, CMD_DDR, Octal, 0xde),
        flexspi_lut_seq(RADDR_DDR, Octal, 0x20, STOP, Single, 0x00),
        0,
        0,
        // Switch to OPI DDR
        flexspi_lut_seq(CMD_SDR, Single, 0x72, CMD_SDR, Single, 0x00),
        flexspi_lut_seq(CMD_SDR, Single, 0x00, CMD_SDR, Single, 0x00),
        flexspi_lut_seq(CMD_SDR, Single, 0x00, WRITE_SDR, Single, 0x01),
        0,
        // Unused
        0,
        0,
        0,
        0,
        // Block erase
        flexspi_lut_seq(CMD_DDR, Octal, 0xdc, CMD_DDR, Octal, 0x23),
        flexspi_lut_seq(RADDR_DDR, Octal, 0x20, STOP, Single, 0x00),
        0,
        0,
        // Page program
        flexspi_lut_seq(CMD_DDR, Octal, 0x12, CMD_DDR, Octal, 0xed),
        flexspi_lut_seq(RADDR_DDR, Octal, 0x20, WRITE_DDR, Octal, 0x04),
        0,
        0,
        // Unused
        0,
        0,
        0,
        0,
        // Chip erase
        flexspi_lut_seq(CMD_DDR, Octal, 0x60, CMD_DDR, Octal, 0x9f),
        0,
        0,
        0,
        // Unused
        0, 0, 0, 0,
        0, 0, 0, 0,
        0, 0, 0, 0,
        0, 0, 0, 0,
    ]);

#[link_section = ".keystore"]
#[used]
static KEYSTORE: [u8; 2048] = [0; 2048];
