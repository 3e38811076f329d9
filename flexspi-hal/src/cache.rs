//! CACHE64 controller in front of a FlexSPI AMBA window.
//!
//! AHB accesses to the cached alias go through this cache, so data written
//! by IP commands is only visible there after an invalidate, and CPU stores
//! only reach the device after a clean (push).

use core::hint::spin_loop;
use core::ops::Deref;

use embassy_hal_internal::{into_ref, PeripheralRef};
use volatile_register::RW;

use crate::flexspi::Error;
use crate::Peripheral;

#[allow(dead_code)]
#[repr(C)]
pub(crate) struct RegisterBlock {
    _reserved0: [u32; 0x200],
    pub ccr: RW<u32>,
    pub clcr: RW<u32>,
    pub csar: RW<u32>,
    pub ccvr: RW<u32>,
}

const CCR_ENCACHE: u32 = 1 << 0;
const CCR_ENWRBUF: u32 = 1 << 1;
const CCR_INVW0: u32 = 1 << 24;
const CCR_PUSHW0: u32 = 1 << 25;
const CCR_INVW1: u32 = 1 << 26;
const CCR_PUSHW1: u32 = 1 << 27;
const CCR_GO: u32 = 1 << 31;

pub(crate) const INVALIDATE_BOTH_WAYS: u32 = CCR_INVW0 | CCR_INVW1;
pub(crate) const PUSH_BOTH_WAYS: u32 = CCR_PUSHW0 | CCR_PUSHW1;

#[derive(Clone, Copy)]
pub(crate) struct Regs(*const RegisterBlock);

impl Regs {
    /// # Safety
    ///
    /// `ptr` must point at a CACHE64 controller block for the handle's lifetime.
    pub(crate) const unsafe fn from_ptr(ptr: *const RegisterBlock) -> Self {
        Self(ptr)
    }
}

impl Deref for Regs {
    type Target = RegisterBlock;

    #[inline(always)]
    fn deref(&self) -> &RegisterBlock {
        // SAFETY: validity is the contract of `Regs::from_ptr`.
        unsafe { &*self.0 }
    }
}

pub(crate) trait SealedInstance {
    fn regs() -> Regs;
}

#[allow(private_bounds)]
pub trait Instance: Peripheral<P = Self> + SealedInstance + 'static + Send {}

#[cfg(target_arch = "arm")]
fn barrier() {
    // SAFETY: barrier instructions only.
    unsafe {
        core::arch::asm!("dsb sy", options(nostack, preserves_flags));
        core::arch::asm!("isb sy", options(nostack, preserves_flags));
    }
}

#[cfg(not(target_arch = "arm"))]
fn barrier() {
    core::sync::atomic::fence(core::sync::atomic::Ordering::SeqCst);
}

/// Runs one way-maintenance command and waits for `GO` to drop.
fn run_command(regs: Regs, ways: u32, max_polls: u32) -> Result<(), Error> {
    barrier();
    // SAFETY: GO starts the maintenance command on the selected ways.
    unsafe { regs.ccr.modify(|v| v | ways | CCR_GO) };
    let mut done = false;
    for _ in 0..max_polls {
        if regs.ccr.read() & CCR_GO == 0 {
            done = true;
            break;
        }
        spin_loop();
    }
    // SAFETY: command bits are cleared whether or not GO dropped.
    unsafe { regs.ccr.modify(|v| v & !ways) };
    barrier();
    if done {
        Ok(())
    } else {
        Err(Error::Timeout)
    }
}

pub struct Cache64<'d, T: Instance> {
    _inner: PeripheralRef<'d, T>,
    max_polls: u32,
}

impl<'d, T: Instance> Cache64<'d, T> {
    pub fn new(inner: impl Peripheral<P = T> + 'd) -> Self {
        Self::with_max_polls(inner, crate::flexspi::DEFAULT_TIMEOUT_POLLS)
    }

    /// Like [`Self::new`], with a custom poll budget for maintenance commands.
    pub fn with_max_polls(inner: impl Peripheral<P = T> + 'd, max_polls: u32) -> Self {
        into_ref!(inner);
        Self {
            _inner: inner,
            max_polls,
        }
    }

    pub fn is_enabled(&self) -> bool {
        T::regs().ccr.read() & CCR_ENCACHE != 0
    }

    /// Invalidates, then turns on the cache and its write buffer.
    pub fn enable(&mut self) -> Result<(), Error> {
        if self.is_enabled() {
            return Ok(());
        }
        run_command(T::regs(), INVALIDATE_BOTH_WAYS, self.max_polls)?;
        // SAFETY: enable bits on an owned cache controller.
        unsafe { T::regs().ccr.modify(|v| v | CCR_ENCACHE | CCR_ENWRBUF) };
        Ok(())
    }

    /// Pushes dirty lines, then disables the cache.
    pub fn disable(&mut self) -> Result<(), Error> {
        if !self.is_enabled() {
            return Ok(());
        }
        run_command(T::regs(), PUSH_BOTH_WAYS, self.max_polls)?;
        // SAFETY: clears enable bits on an owned cache controller.
        unsafe { T::regs().ccr.modify(|v| v & !(CCR_ENCACHE | CCR_ENWRBUF)) };
        Ok(())
    }

    pub fn invalidate(&mut self) -> Result<(), Error> {
        run_command(T::regs(), INVALIDATE_BOTH_WAYS, self.max_polls)
    }

    pub fn clean(&mut self) -> Result<(), Error> {
        run_command(T::regs(), PUSH_BOTH_WAYS, self.max_polls)
    }

    pub fn clean_invalidate(&mut self) -> Result<(), Error> {
        run_command(T::regs(), PUSH_BOTH_WAYS | INVALIDATE_BOTH_WAYS, self.max_polls)
    }
}

#[cfg(feature = "mimxrt595s")]
mod instance_impl {
    use super::{Instance, Regs, SealedInstance};

    macro_rules! impl_instance {
        ($periph:ty, $regs:expr) => {
            impl SealedInstance for $periph {
                #[inline(always)]
                fn regs() -> Regs {
                    // SAFETY: fixed peripheral address from the chip memory map.
                    unsafe { Regs::from_ptr($regs as *const _) }
                }
            }

            impl Instance for $periph {}
        };
    }

    impl_instance!(crate::peripherals::CACHE64_CTRL0, 0x4003_3000usize);
    impl_instance!(crate::peripherals::CACHE64_CTRL1, 0x4003_4000usize);
}
