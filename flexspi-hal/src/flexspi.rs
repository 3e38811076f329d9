//! FlexSPI memory controller.
//!
//! Two ways into the attached device: register-driven IP commands through
//! [`FlexSpi::transfer`], and memory-mapped AHB access through the AMBA
//! window (see [`crate::ram::MappedWindow`]).

use crate::Peripheral;

pub(crate) type Regs = regs::Regs;

pub(crate) trait SealedInstance {
    fn regs() -> Regs;
    /// Start of the cached AMBA window that maps port A1 offset 0.
    fn amba_cached_base() -> usize;
}

#[allow(private_bounds)]
pub trait Instance: Peripheral<P = Self> + SealedInstance + 'static + Send {}

mod controller;
pub mod lut;
pub(crate) mod regs;
mod shared;

mod types {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Error {
        Busy,
        SequenceExecutionTimeout,
        IpCommandSequenceError,
        IpCommandGrantTimeout,
        Timeout,
        InvalidSequence,
        InvalidLength,
        NotAligned,
        OutOfBounds,
    }

    impl Error {
        /// Numeric status in the vendor SDK's `status_t` space, for
        /// diagnostics that print a failure code.
        pub const fn code(self) -> u32 {
            match self {
                Self::OutOfBounds => 3,
                Self::InvalidSequence | Self::InvalidLength | Self::NotAligned => 4,
                Self::Timeout => 5,
                Self::Busy => 7000,
                Self::SequenceExecutionTimeout => 7001,
                Self::IpCommandSequenceError => 7002,
                Self::IpCommandGrantTimeout => 7003,
            }
        }
    }

    impl core::fmt::Display for Error {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            let msg = match self {
                Self::Busy => "controller busy",
                Self::SequenceExecutionTimeout => "LUT sequence execution timed out",
                Self::IpCommandSequenceError => "IP command sequence error",
                Self::IpCommandGrantTimeout => "IP command grant timed out",
                Self::Timeout => "status poll timed out",
                Self::InvalidSequence => "invalid LUT sequence index or count",
                Self::InvalidLength => "invalid transfer length",
                Self::NotAligned => "address not aligned",
                Self::OutOfBounds => "address out of bounds",
            };
            f.write_str(msg)
        }
    }

    /// Device port on the controller; address space is stacked in this order.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Port {
        A1,
        A2,
        B1,
        B2,
    }

    impl Port {
        pub const fn index(self) -> usize {
            match self {
                Self::A1 => 0,
                Self::A2 => 1,
                Self::B1 => 2,
                Self::B2 => 3,
            }
        }
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct FlexSpiInitConfig {
        /// Issue a software reset when taking the controller.
        pub reset: bool,
        /// Poll budget for every status wait.
        pub max_polls: u32,
    }

    impl Default for FlexSpiInitConfig {
        fn default() -> Self {
            Self {
                reset: true,
                max_polls: super::shared::DEFAULT_TIMEOUT_POLLS,
            }
        }
    }

    impl FlexSpiInitConfig {
        /// Keep whatever boot ROM or board code already programmed.
        pub const fn preconfigured() -> Self {
            Self {
                reset: false,
                max_polls: super::shared::DEFAULT_TIMEOUT_POLLS,
            }
        }
    }
}

#[cfg(feature = "mimxrt595s")]
mod instance_impl {
    use super::{Instance, Regs, SealedInstance};

    macro_rules! impl_instance {
        ($periph:ty, $regs:expr, $cached:expr) => {
            impl SealedInstance for $periph {
                #[inline(always)]
                fn regs() -> Regs {
                    // SAFETY: fixed peripheral address from the chip memory map.
                    unsafe { Regs::from_ptr($regs as *const _) }
                }

                #[inline(always)]
                fn amba_cached_base() -> usize {
                    $cached
                }
            }

            impl Instance for $periph {}
        };
    }

    use crate::ram::memory_map::{FLEXSPI0_AMBA_CACHED_BASE, FLEXSPI1_AMBA_CACHED_BASE};

    impl_instance!(crate::peripherals::FLEXSPI0, 0x4013_4000usize, FLEXSPI0_AMBA_CACHED_BASE);
    impl_instance!(crate::peripherals::FLEXSPI1, 0x4013_c000usize, FLEXSPI1_AMBA_CACHED_BASE);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Host stand-in for a controller instance. Each test thread gets its own
    //! zeroed register block and a RAM buffer acting as the AMBA window.

    extern crate std;

    use std::boxed::Box;
    use std::vec;

    use super::regs::fake::FakeFlexSpi;
    use super::regs::RegisterBlock;
    use super::{Instance, Regs, SealedInstance};

    /// Bytes backing the fake AMBA window.
    pub(crate) const WINDOW_BYTES: usize = 4096;

    pub(crate) const STS0_OFFSET: usize = 0x0e0;

    pub(crate) struct TestFlexSpi;

    embassy_hal_internal::impl_peripheral!(TestFlexSpi);

    struct Fake {
        regs: FakeFlexSpi,
        window: usize,
    }

    std::thread_local! {
        static FAKE: Fake = Fake {
            regs: FakeFlexSpi::new(),
            window: Box::leak(vec![0u32; WINDOW_BYTES / 4].into_boxed_slice()).as_mut_ptr() as usize,
        };
    }

    impl SealedInstance for TestFlexSpi {
        fn regs() -> Regs {
            FAKE.with(|f| f.regs.regs())
        }

        fn amba_cached_base() -> usize {
            FAKE.with(|f| f.window)
        }
    }

    impl Instance for TestFlexSpi {}

    /// Zeroes this thread's registers and window.
    pub(crate) fn reset() {
        FAKE.with(|f| {
            for offset in (0..core::mem::size_of::<RegisterBlock>()).step_by(4) {
                f.regs.set_raw(offset, 0);
            }
            // SAFETY: the window is WINDOW_BYTES long and never freed.
            unsafe { core::ptr::write_bytes(f.window as *mut u8, 0, WINDOW_BYTES) };
        });
    }

    /// Pokes a status register of this thread's block.
    pub(crate) fn set_raw(offset: usize, value: u32) {
        FAKE.with(|f| f.regs.set_raw(offset, value));
    }

    pub(crate) fn set_bus_idle() {
        set_raw(STS0_OFFSET, super::regs::STS0_ARBIDLE | super::regs::STS0_SEQIDLE);
    }
}

pub use controller::{FlexSpi, Transfer, TransferData};
pub(crate) use shared::DEFAULT_TIMEOUT_POLLS;
pub use lut::LutSequence;
pub use types::{Error, FlexSpiInitConfig, Port};

#[cfg(all(test, feature = "mimxrt595s"))]
mod tests {
    use super::SealedInstance;
    use crate::peripherals::{FLEXSPI0, FLEXSPI1};
    use crate::ram::memory_map::{
        FLEXSPI0_AMBA_CACHED_BASE, FLEXSPI1_AMBA_CACHED_BASE, PORT_A1_SIZE_KIB, PSRAM_CACHE_START,
    };

    #[test]
    fn instances_use_board_window_bases() {
        assert_eq!(FLEXSPI0::amba_cached_base(), FLEXSPI0_AMBA_CACHED_BASE);
        assert_eq!(FLEXSPI1::amba_cached_base(), FLEXSPI1_AMBA_CACHED_BASE);
        assert_eq!(
            FLEXSPI1::amba_cached_base() + PORT_A1_SIZE_KIB as usize * 1024,
            PSRAM_CACHE_START
        );
    }
}
