#![cfg_attr(not(test), no_std)]
#![doc = "FlexSPI controller and external PSRAM support for i.MX RT5xx MCUs."]
#![doc = ""]
#![doc = "Covers IP-command transfers, LUT programming, the CACHE64 controller in"]
#![doc = "front of the AMBA window, and a fill/verify test for attached PSRAM."]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod cache;
pub mod flexspi;
pub mod memtest;
pub mod psram;
pub mod ram;

pub use embassy_hal_internal::{Peripheral, PeripheralRef};

embassy_hal_internal::peripherals!(FLEXSPI0, FLEXSPI1, CACHE64_CTRL0, CACHE64_CTRL1);

#[non_exhaustive]
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Enable the CACHE64 controller in front of the PSRAM window (FlexSPI1).
    pub enable_psram_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_psram_cache: true,
        }
    }
}

/// Takes the peripheral singletons and applies `config`.
///
/// Panics if called more than once.
pub fn init(config: Config) -> Peripherals {
    let mut p = Peripherals::take();
    if config.enable_psram_cache {
        enable_psram_cache(&mut p);
    }
    p
}

#[cfg(feature = "mimxrt595s")]
fn enable_psram_cache(p: &mut Peripherals) {
    let mut cache = cache::Cache64::new(&mut p.CACHE64_CTRL1);
    if let Err(e) = cache.enable() {
        warn!("CACHE64_CTRL1 enable failed: {}", e.code());
    }
}

#[cfg(not(feature = "mimxrt595s"))]
fn enable_psram_cache(_p: &mut Peripherals) {}
