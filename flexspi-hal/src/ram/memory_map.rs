//! FlexSPI window constants for the RT595 board layout.
//!
//! FlexSPI1 serves octal flash on port A1 and the PSRAM on port B1. With a
//! 64 MiB A1 region the PSRAM lands 64 MiB into the cached window.

/// Cached AMBA alias of FlexSPI0 (boot flash).
pub const FLEXSPI0_AMBA_CACHED_BASE: usize = 0x0800_0000;

/// Cached AMBA alias of FlexSPI1.
pub const FLEXSPI1_AMBA_CACHED_BASE: usize = 0x2800_0000;

/// Size reserved for the port A1 flash, in KiB (`FLSHCR0[A1]`).
pub const PORT_A1_SIZE_KIB: u32 = 64 * 1024;

/// Cached start of the PSRAM on port B1.
pub const PSRAM_CACHE_START: usize = 0x2c00_0000;

/// PSRAM capacity in bytes (8 MiB).
pub const PSRAM_SIZE: usize = 0x0080_0000;

/// Scratch buffer length, in 32-bit words, of the no-init PSRAM buffer.
pub const PSRAM_BUFFER_WORDS: usize = 1024;

const _: () = assert!(
    FLEXSPI1_AMBA_CACHED_BASE + PORT_A1_SIZE_KIB as usize * 1024 == PSRAM_CACHE_START
);
