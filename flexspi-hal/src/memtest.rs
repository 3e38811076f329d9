//! Fill/fill/verify memory test shared by the IP and AHB paths.
//!
//! Every word is first written with the fill value, then overwritten with
//! its own word index, then read back and compared against that index. The
//! second fill catches stuck bits the first one hides; the index pattern
//! catches address aliasing.
//!
//! Write and read errors are logged and counted without stopping the test.
//! The first data mismatch is logged and ends the verify pass.

use crate::flexspi::Error;
use crate::ram::{memory_map, MappedWindow};

/// Numeric code printed next to an access failure.
pub trait FailureCode {
    fn failure_code(&self) -> u32;
}

impl FailureCode for Error {
    fn failure_code(&self) -> u32 {
        self.code()
    }
}

/// Word-granular access to the memory under test. Offsets are in bytes.
pub trait WordAccess {
    type Error: FailureCode;

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), Self::Error>;

    fn read_word(&mut self, offset: u32) -> Result<u32, Self::Error>;

    /// Address shown in diagnostics for `offset`.
    fn report_address(&self, offset: u32) -> u32 {
        offset
    }
}

impl WordAccess for MappedWindow<'_> {
    type Error = Error;

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), Error> {
        MappedWindow::write_word(self, offset as usize, value)
    }

    fn read_word(&mut self, offset: u32) -> Result<u32, Error> {
        MappedWindow::read_word(self, offset as usize)
    }

    fn report_address(&self, offset: u32) -> u32 {
        self.address_of(offset as usize) as u32
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessPath {
    /// Register-driven IP command transfers.
    Ip,
    /// Loads and stores through the cached AMBA window.
    Ahb,
}

impl AccessPath {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ip => "IP",
            Self::Ahb => "AHB",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TestConfig {
    /// Bytes under test, starting at offset 0. Must be a non-zero multiple of 4.
    pub size_bytes: u32,
    /// Value of the first fill pass.
    pub fill_value: u32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            size_bytes: memory_map::PSRAM_SIZE as u32,
            fill_value: 0xffff_ffff,
        }
    }
}

impl TestConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.size_bytes == 0 {
            return Err(Error::InvalidLength);
        }
        if self.size_bytes % 4 != 0 {
            return Err(Error::NotAligned);
        }
        Ok(())
    }

    pub const fn word_count(&self) -> u32 {
        self.size_bytes / 4
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mismatch {
    /// Reported address (see [`WordAccess::report_address`]).
    pub address: u32,
    pub read: u32,
    pub expected: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TestReport {
    pub write_failures: u32,
    pub read_failures: u32,
    pub mismatch: Option<Mismatch>,
    /// Words that read back as expected before the verify pass ended.
    pub words_verified: u32,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.write_failures == 0 && self.read_failures == 0 && self.mismatch.is_none()
    }
}

fn fill<A: WordAccess>(
    access: &mut A,
    path: AccessPath,
    pass: u8,
    words: u32,
    value_for: impl Fn(u32) -> u32,
) -> u32 {
    let mut failures = 0;
    for index in 0..words {
        let offset = index * 4;
        if let Err(e) = access.write_word(offset, value_for(index)) {
            failures += 1;
            error!(
                "{} {} Write Failure {:#x} - {:#x}, Failure code : {:#x}!",
                pass,
                path.label(),
                access.report_address(offset),
                index,
                e.failure_code()
            );
        }
    }
    failures
}

/// Runs fill-A, fill-B and verify over `config.size_bytes`.
pub fn run_pattern_test<A: WordAccess>(
    access: &mut A,
    config: &TestConfig,
    path: AccessPath,
) -> Result<TestReport, Error> {
    config.validate()?;
    let words = config.word_count();
    let mut report = TestReport::default();

    debug!("{} fill with {:#x}", path.label(), config.fill_value);
    report.write_failures += fill(access, path, 0, words, |_| config.fill_value);

    debug!("{} fill with word index", path.label());
    report.write_failures += fill(access, path, 1, words, |index| index);

    debug!("{} verify {} words", path.label(), words);
    for index in 0..words {
        let offset = index * 4;
        let read = match access.read_word(offset) {
            Ok(value) => value,
            Err(e) => {
                report.read_failures += 1;
                error!(
                    "{} Read Failure {:#x} - {:#x}, Failure code : {:#x}!",
                    path.label(),
                    access.report_address(offset),
                    index,
                    e.failure_code()
                );
                0
            }
        };

        if read != index {
            let mismatch = Mismatch {
                address: access.report_address(offset),
                read,
                expected: index,
            };
            error!("Compare error at address : {:#x}!", mismatch.address);
            error!(
                "Read value {:#x}, Expected value {:#x}",
                mismatch.read, mismatch.expected
            );
            report.mismatch = Some(mismatch);
            break;
        }
        report.words_verified += 1;
    }

    Ok(report)
}
