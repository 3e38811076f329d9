//! HyperRAM-style PSRAM on a FlexSPI port.
//!
//! The device is reachable two ways: IP commands through the controller
//! (`read`/`write`, [`embedded_storage`] traits, [`Psram::run_ip_test`]) and
//! plain loads and stores through the cached AMBA window
//! ([`Psram::ahb_window`], [`Psram::run_ahb_test`]).

use embedded_storage::{ReadStorage, Storage};

use crate::cache::{self, Cache64};
use crate::flexspi::lut::{PSRAM_READ_DATA_SEQ, PSRAM_WRITE_DATA_SEQ};
use crate::flexspi::{Error, FlexSpi, Instance, LutSequence, Port, SealedInstance, Transfer};
use crate::memtest::{run_pattern_test, AccessPath, TestConfig, TestReport, WordAccess};
use crate::ram::{memory_map, MappedWindow};

/// Largest payload moved by one IP command.
const TRANSFER_CHUNK_BYTES: usize = 1024;

/// Device address of the `index`-th chunk of a transfer starting at `base`.
fn chunk_address(base: u32, index: usize) -> Result<u32, Error> {
    index
        .checked_mul(TRANSFER_CHUNK_BYTES)
        .and_then(|step| u32::try_from(step).ok())
        .and_then(|step| base.checked_add(step))
        .ok_or(Error::OutOfBounds)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PsramConfig {
    pub port: Port,
    /// Capacity in bytes, a non-zero multiple of 1 KiB.
    pub size_bytes: u32,
    /// LUT slot of the read-data sequence.
    pub read_seq: u8,
    /// LUT slot of the write-data sequence.
    pub write_seq: u8,
}

impl Default for PsramConfig {
    fn default() -> Self {
        Self {
            port: Port::B1,
            size_bytes: memory_map::PSRAM_SIZE as u32,
            read_seq: PSRAM_READ_DATA_SEQ,
            write_seq: PSRAM_WRITE_DATA_SEQ,
        }
    }
}

impl PsramConfig {
    fn validate(&self) -> Result<(), Error> {
        if self.size_bytes == 0 || self.size_bytes % 1024 != 0 {
            return Err(Error::InvalidLength);
        }
        if self.read_seq == self.write_seq {
            return Err(Error::InvalidSequence);
        }
        Ok(())
    }
}

pub struct Psram<'d, T: Instance> {
    flexspi: FlexSpi<'d, T>,
    config: PsramConfig,
}

impl<'d, T: Instance> Psram<'d, T> {
    /// Programs the port size and both LUT sequences, then resets the
    /// controller so the new configuration is latched.
    pub fn init(mut flexspi: FlexSpi<'d, T>, config: PsramConfig) -> Result<Self, Error> {
        config.validate()?;

        flexspi.set_port_size_kib(config.port, config.size_bytes / 1024);
        flexspi.write_lut_sequence(config.read_seq, &LutSequence::hyperram_read())?;
        flexspi.write_lut_sequence(config.write_seq, &LutSequence::hyperram_write())?;
        flexspi.software_reset()?;

        debug!(
            "psram: {} KiB at device offset {:#x}",
            config.size_bytes / 1024,
            flexspi.port_base_offset(config.port)
        );
        Ok(Self { flexspi, config })
    }

    /// Wraps a controller whose LUT and port size board code already set.
    pub fn new_preconfigured(flexspi: FlexSpi<'d, T>, config: PsramConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { flexspi, config })
    }

    pub fn config(&self) -> &PsramConfig {
        &self.config
    }

    pub fn capacity(&self) -> u32 {
        self.config.size_bytes
    }

    pub fn release(self) -> FlexSpi<'d, T> {
        self.flexspi
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<(), Error> {
        let len = u32::try_from(len).map_err(|_| Error::OutOfBounds)?;
        match offset.checked_add(len) {
            Some(end) if end <= self.config.size_bytes => Ok(()),
            _ => Err(Error::OutOfBounds),
        }
    }

    /// Device address of a byte offset into the PSRAM.
    pub fn device_address(&self, offset: u32) -> Result<u32, Error> {
        self.check_range(offset, 0)?;
        self.flexspi
            .port_base_offset(self.config.port)
            .checked_add(offset)
            .ok_or(Error::OutOfBounds)
    }

    /// Device address of `offset`, with the whole `len`-byte span checked
    /// against the capacity and the 32-bit device address space.
    fn device_span(&self, offset: u32, len: usize) -> Result<u32, Error> {
        self.check_range(offset, len)?;
        let base = self.device_address(offset)?;
        // `check_range` bounds `len` to u32.
        base
            .checked_add(len.saturating_sub(1) as u32)
            .ok_or(Error::OutOfBounds)?;
        Ok(base)
    }

    pub fn read(&mut self, offset: u32, out: &mut [u8]) -> Result<(), Error> {
        let base = self.device_span(offset, out.len())?;
        for (i, chunk) in out.chunks_mut(TRANSFER_CHUNK_BYTES).enumerate() {
            let address = chunk_address(base, i)?;
            let mut transfer = Transfer::read(self.config.port, address, self.config.read_seq, chunk);
            self.flexspi.transfer(&mut transfer)?;
        }
        Ok(())
    }

    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        let base = self.device_span(offset, data.len())?;
        for (i, chunk) in data.chunks(TRANSFER_CHUNK_BYTES).enumerate() {
            let address = chunk_address(base, i)?;
            let mut transfer = Transfer::write(self.config.port, address, self.config.write_seq, chunk);
            self.flexspi.transfer(&mut transfer)?;
        }
        Ok(())
    }

    /// One 32-bit little-endian word over an IP command.
    pub fn read_word(&mut self, offset: u32) -> Result<u32, Error> {
        self.check_range(offset, 4)?;
        if offset % 4 != 0 {
            return Err(Error::NotAligned);
        }
        let mut word = [0u8; 4];
        self.read(offset, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    pub fn write_word(&mut self, offset: u32, value: u32) -> Result<(), Error> {
        self.check_range(offset, 4)?;
        if offset % 4 != 0 {
            return Err(Error::NotAligned);
        }
        self.write(offset, &value.to_le_bytes())
    }

    /// The PSRAM as seen through the cached AMBA alias.
    pub fn ahb_window(&mut self) -> MappedWindow<'_> {
        let base = T::amba_cached_base() + self.flexspi.port_base_offset(self.config.port) as usize;
        // SAFETY: the window maps this port's device for as long as the
        // controller is borrowed, and no Rust references point into it.
        unsafe { MappedWindow::new(base, self.config.size_bytes as usize) }
    }

    /// Fill/fill/verify over IP commands, followed by a controller reset.
    pub fn run_ip_test(&mut self, config: &TestConfig) -> Result<TestReport, Error> {
        self.check_range(0, config.size_bytes as usize)?;
        let report = run_pattern_test(self, config, AccessPath::Ip)?;
        self.flexspi.software_reset()?;
        info!("IP Test completed!");
        Ok(report)
    }

    /// Fill/fill/verify through the cached window. The cache is invalidated
    /// and cleaned before the first store.
    pub fn run_ahb_test<C: cache::Instance>(
        &mut self,
        cache: &mut Cache64<'_, C>,
        config: &TestConfig,
    ) -> Result<TestReport, Error> {
        self.check_range(0, config.size_bytes as usize)?;
        cache.invalidate()?;
        cache.clean()?;
        let mut window = self.ahb_window();
        let report = run_pattern_test(&mut window, config, AccessPath::Ahb)?;
        info!("AHB Test completed!");
        Ok(report)
    }
}

impl<T: Instance> WordAccess for Psram<'_, T> {
    type Error = Error;

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), Error> {
        Psram::write_word(self, offset, value)
    }

    fn read_word(&mut self, offset: u32) -> Result<u32, Error> {
        Psram::read_word(self, offset)
    }
}

impl<T: Instance> ReadStorage for Psram<'_, T> {
    type Error = Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Error> {
        Psram::read(self, offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.config.size_bytes as usize
    }
}

impl<T: Instance> Storage for Psram<'_, T> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Error> {
        Psram::write(self, offset, bytes)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::thread;
    use std::time::{Duration, Instant};
    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::cache::testing::{self as cache_testing, ccr_address, TestCache};
    use crate::cache::{SealedInstance as _, INVALIDATE_BOTH_WAYS, PUSH_BOTH_WAYS};
    use crate::flexspi::regs::MCR0_SWRESET;
    use crate::flexspi::testing::{
        self as flexspi_testing, set_bus_idle, TestFlexSpi, WINDOW_BYTES,
    };
    use crate::flexspi::FlexSpiInitConfig;

    const TEST_POLLS: u32 = 64;

    /// Fresh controller and cache models for the calling test.
    fn controller() -> FlexSpi<'static, TestFlexSpi> {
        flexspi_testing::reset();
        cache_testing::reset();
        let init = FlexSpiInitConfig {
            reset: false,
            max_polls: TEST_POLLS,
        };
        FlexSpi::with_config(TestFlexSpi, init).unwrap()
    }

    fn psram(flexspi: FlexSpi<'static, TestFlexSpi>) -> Psram<'static, TestFlexSpi> {
        let config = PsramConfig {
            size_bytes: WINDOW_BYTES as u32,
            ..PsramConfig::default()
        };
        Psram::new_preconfigured(flexspi, config).unwrap()
    }

    #[test]
    fn device_address_adds_sizes_of_ports_stacked_before() {
        let mut flexspi = controller();
        flexspi.set_port_size_kib(Port::A1, 4);
        flexspi.set_port_size_kib(Port::A2, 1);
        let psram = psram(flexspi);

        assert_eq!(psram.device_address(0x10), Ok(0x1410));
        assert_eq!(psram.device_address(WINDOW_BYTES as u32 + 4), Err(Error::OutOfBounds));
    }

    #[test]
    fn device_address_past_u32_is_out_of_bounds() {
        let mut flexspi = controller();
        flexspi.set_port_size_kib(Port::A1, 0x3f_f000);
        let config = PsramConfig {
            port: Port::B1,
            ..PsramConfig::default()
        };
        let mut psram = Psram::new_preconfigured(flexspi, config).unwrap();

        assert_eq!(psram.device_address(0x3f_fffc), Ok(0xffff_fffc));
        assert_eq!(psram.device_address(0x7f_fffc), Err(Error::OutOfBounds));
        assert_eq!(psram.read_word(0x7f_fffc), Err(Error::OutOfBounds));
        // Start fits, last byte does not.
        let mut buf = [0u8; 8];
        assert_eq!(psram.read(0x3f_fffc, &mut buf), Err(Error::OutOfBounds));
        assert_eq!(TestFlexSpi::regs().ipcmd.read(), 0);
    }

    #[test]
    fn word_access_checks_bounds_then_alignment_before_any_command() {
        let mut psram = psram(controller());
        set_bus_idle();
        let end = WINDOW_BYTES as u32;

        assert_eq!(psram.read_word(2), Err(Error::NotAligned));
        assert_eq!(psram.write_word(6, 0), Err(Error::NotAligned));
        assert_eq!(psram.read_word(end), Err(Error::OutOfBounds));
        assert_eq!(psram.write_word(end - 2, 0), Err(Error::OutOfBounds));
        assert_eq!(TestFlexSpi::regs().ipcmd.read(), 0);
    }

    #[test]
    fn chunk_addresses_step_by_one_kib() {
        assert_eq!(chunk_address(0x1000, 0), Ok(0x1000));
        assert_eq!(chunk_address(0x1000, 3), Ok(0x1c00));
        assert_eq!(chunk_address(0xffff_fc00, 0), Ok(0xffff_fc00));
        assert_eq!(chunk_address(0xffff_fc00, 1), Err(Error::OutOfBounds));
        assert_eq!(chunk_address(0, usize::MAX), Err(Error::OutOfBounds));
    }

    #[test]
    fn long_write_is_issued_in_one_kib_commands() {
        let mut psram = psram(controller());
        set_bus_idle();
        let data = vec![0x5au8; 2 * TRANSFER_CHUNK_BYTES + 4];

        // The register model never clears error flags, so the first command
        // fails and its programming is what remains.
        assert_eq!(psram.write(0x100, &data), Err(Error::IpCommandSequenceError));
        let regs = TestFlexSpi::regs();
        assert_eq!(regs.ipcr0.read(), 0x100);
        assert_eq!(regs.ipcr1.read() & 0xffff, TRANSFER_CHUNK_BYTES as u32);
        assert_eq!((regs.ipcr1.read() >> 16) & 0x1f, PSRAM_WRITE_DATA_SEQ as u32);
    }

    #[test]
    fn ip_test_resets_controller_after_the_pattern() {
        let mut psram = psram(controller());
        set_bus_idle();
        let config = TestConfig {
            size_bytes: 8,
            ..TestConfig::default()
        };

        // SWRESET never self-clears here, so the trailing reset times out.
        assert_eq!(psram.run_ip_test(&config), Err(Error::Timeout));
        let regs = TestFlexSpi::regs();
        assert_eq!(regs.ipcr0.read(), 4);
        assert_ne!(regs.ipcmd.read(), 0);
        assert_ne!(regs.mcr0.read() & MCR0_SWRESET, 0);
    }

    #[test]
    fn tests_reject_range_larger_than_capacity() {
        let mut psram = psram(controller());
        let config = TestConfig {
            size_bytes: WINDOW_BYTES as u32 + 4,
            ..TestConfig::default()
        };

        assert_eq!(psram.run_ip_test(&config), Err(Error::OutOfBounds));
        let mut cache = Cache64::with_max_polls(TestCache, TEST_POLLS);
        assert_eq!(psram.run_ahb_test(&mut cache, &config), Err(Error::OutOfBounds));

        let regs = TestFlexSpi::regs();
        assert_eq!(regs.mcr0.read(), 0);
        assert_eq!(regs.ipcmd.read(), 0);
        assert_eq!(TestCache::regs().ccr.read(), 0);
    }

    #[test]
    fn ahb_test_invalidates_then_cleans_before_first_store() {
        const SENTINEL: u32 = 0xa5a5_a5a5;
        const GO: u32 = 1 << 31;

        let mut psram = psram(controller());
        let window = TestFlexSpi::amba_cached_base();
        // SAFETY: first word of this thread's fake window.
        unsafe { core::ptr::write_volatile(window as *mut u32, SENTINEL) };

        // Plays the cache controller: records each command with the first
        // window word at that moment, then drops GO.
        let ccr = ccr_address();
        let hw = thread::spawn(move || {
            let mut seen: Vec<(u32, u32)> = Vec::new();
            let deadline = Instant::now() + Duration::from_secs(10);
            while seen.len() < 2 && Instant::now() < deadline {
                // SAFETY: the block and window are leaked for the process lifetime.
                unsafe {
                    let value = core::ptr::read_volatile(ccr as *const u32);
                    if value & GO != 0 {
                        let word = core::ptr::read_volatile(window as *const u32);
                        seen.push((value & (INVALIDATE_BOTH_WAYS | PUSH_BOTH_WAYS), word));
                        core::ptr::write_volatile(ccr as *mut u32, value & !GO);
                    }
                }
                core::hint::spin_loop();
            }
            seen
        });

        let mut cache = Cache64::with_max_polls(TestCache, u32::MAX);
        let config = TestConfig {
            size_bytes: WINDOW_BYTES as u32,
            ..TestConfig::default()
        };
        let report = psram.run_ahb_test(&mut cache, &config).unwrap();

        let seen = hw.join().unwrap();
        assert_eq!(
            seen,
            vec![(INVALIDATE_BOTH_WAYS, SENTINEL), (PUSH_BOTH_WAYS, SENTINEL)]
        );
        assert!(report.passed());
        assert_eq!(report.words_verified, (WINDOW_BYTES / 4) as u32);
    }

    #[test]
    fn default_config_targets_port_b1_with_hyperram_slots() {
        let config = PsramConfig::default();
        assert_eq!(config.port, Port::B1);
        assert_eq!(config.size_bytes, 8 * 1024 * 1024);
        assert_eq!((config.read_seq, config.write_seq), (11, 12));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn config_rejects_odd_sizes_and_shared_slots() {
        let odd = PsramConfig {
            size_bytes: 1000,
            ..PsramConfig::default()
        };
        assert_eq!(odd.validate(), Err(Error::InvalidLength));

        let shared = PsramConfig {
            write_seq: PSRAM_READ_DATA_SEQ,
            ..PsramConfig::default()
        };
        assert_eq!(shared.validate(), Err(Error::InvalidSequence));
    }
}
