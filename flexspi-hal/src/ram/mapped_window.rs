//! Bounds-checked volatile accessor for a memory-mapped device window.
//!
//! Confines the raw-pointer access of AHB reads and writes to one type, so
//! callers deal in byte offsets and get `OutOfBounds`/`NotAligned` back
//! instead of faulting the bus.

use core::marker::PhantomData;

use crate::flexspi::Error;

/// A window of device memory defined by base address and length in bytes.
///
/// # Usage
///
/// ```ignore
/// use flexspi_hal::ram::{memory_map, MappedWindow};
///
/// let psram = unsafe {
///     MappedWindow::new(memory_map::PSRAM_CACHE_START, memory_map::PSRAM_SIZE)
/// };
/// psram.write_word(0, 0xffff_ffff)?;
/// let first = psram.read_word(0)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct MappedWindow<'a> {
    addr: usize,
    len: usize,
    _borrow: PhantomData<&'a ()>,
}

impl<'a> MappedWindow<'a> {
    /// Create a window over `addr..addr + len`.
    ///
    /// # Safety
    ///
    /// The range must be mapped, readable and writable for `'a`, and must not
    /// alias memory Rust code holds references into.
    #[inline]
    pub const unsafe fn new(addr: usize, len: usize) -> Self {
        Self {
            addr,
            len,
            _borrow: PhantomData,
        }
    }

    /// Base address.
    #[inline]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    /// Length in bytes.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bus address of a byte offset inside the window.
    #[inline]
    pub fn address_of(&self, offset: usize) -> usize {
        self.addr + offset
    }

    #[inline]
    fn check_word(&self, offset: usize) -> Result<*mut u32, Error> {
        match offset.checked_add(4) {
            Some(end) if end <= self.len => {}
            _ => return Err(Error::OutOfBounds),
        }
        let addr = self.addr + offset;
        if addr % 4 != 0 {
            return Err(Error::NotAligned);
        }
        Ok(addr as *mut u32)
    }

    /// Volatile 32-bit load at `offset`.
    #[inline]
    pub fn read_word(&self, offset: usize) -> Result<u32, Error> {
        let ptr = self.check_word(offset)?;
        // SAFETY: in bounds and aligned; mapping is the contract of `new`.
        Ok(unsafe { core::ptr::read_volatile(ptr) })
    }

    /// Volatile 32-bit store at `offset`.
    #[inline]
    pub fn write_word(&self, offset: usize, value: u32) -> Result<(), Error> {
        let ptr = self.check_word(offset)?;
        // SAFETY: in bounds and aligned; mapping is the contract of `new`.
        unsafe { core::ptr::write_volatile(ptr, value) };
        Ok(())
    }

    /// Create a sub-window at `offset` bytes with `len` bytes.
    #[inline]
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self, Error> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(Self {
                addr: self.addr + offset,
                len,
                _borrow: PhantomData,
            }),
            _ => Err(Error::OutOfBounds),
        }
    }
}
