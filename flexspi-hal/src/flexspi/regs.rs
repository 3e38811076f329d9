//! FlexSPI register block.
//!
//! Layout follows the RT5xx reference manual (FlexSPI chapter). Only the
//! fields the IP/AHB paths touch get named bit constants.

use core::ops::Deref;

use volatile_register::{RO, RW, WO};

#[allow(dead_code)]
#[repr(C)]
pub(crate) struct RegisterBlock {
    pub mcr0: RW<u32>,
    pub mcr1: RW<u32>,
    pub mcr2: RW<u32>,
    pub ahbcr: RW<u32>,
    pub inten: RW<u32>,
    pub intr: RW<u32>,
    pub lutkey: RW<u32>,
    pub lutcr: RW<u32>,
    pub ahbrxbufcr0: [RW<u32>; 8],
    _reserved0: [u32; 8],
    /// Per-port device size in KiB, ordered A1, A2, B1, B2.
    pub flshcr0: [RW<u32>; 4],
    pub flshcr1: [RW<u32>; 4],
    pub flshcr2: [RW<u32>; 4],
    _reserved1: u32,
    pub flshcr4: RW<u32>,
    _reserved2: [u32; 2],
    pub ipcr0: RW<u32>,
    pub ipcr1: RW<u32>,
    _reserved3: [u32; 2],
    pub ipcmd: RW<u32>,
    pub dlpr: RW<u32>,
    pub iprxfcr: RW<u32>,
    pub iptxfcr: RW<u32>,
    pub dllcr: [RW<u32>; 2],
    _reserved4: [u32; 6],
    pub sts0: RO<u32>,
    pub sts1: RO<u32>,
    pub sts2: [RO<u32>; 2],
    pub ahbspndsts: RO<u32>,
    pub iprxfsts: RO<u32>,
    pub iptxfsts: RO<u32>,
    _reserved5: u32,
    pub rfdr: [RO<u32>; 32],
    pub tfdr: [WO<u32>; 32],
    pub lut: [RW<u32>; LUT_WORDS],
}

pub(crate) const LUT_WORDS: usize = 128;

pub(crate) const MCR0_SWRESET: u32 = 1 << 0;
pub(crate) const MCR0_MDIS: u32 = 1 << 1;

pub(crate) const INTR_IPCMDDONE: u32 = 1 << 0;
pub(crate) const INTR_IPCMDGE: u32 = 1 << 1;
pub(crate) const INTR_AHBCMDGE: u32 = 1 << 2;
pub(crate) const INTR_IPCMDERR: u32 = 1 << 3;
pub(crate) const INTR_AHBCMDERR: u32 = 1 << 4;
pub(crate) const INTR_IPRXWA: u32 = 1 << 5;
pub(crate) const INTR_IPTXWE: u32 = 1 << 6;
pub(crate) const INTR_SEQTIMEOUT: u32 = 1 << 11;

pub(crate) const LUTCR_LOCK: u32 = 1 << 0;
pub(crate) const LUTCR_UNLOCK: u32 = 1 << 1;

pub(crate) const FLSHCR2_CLRINSTRPTR: u32 = 1 << 31;

pub(crate) const IPCR1_IDATSZ_MASK: u32 = 0xffff;
pub(crate) const IPCR1_ISEQID_SHIFT: u32 = 16;
pub(crate) const IPCR1_ISEQID_MASK: u32 = 0x1f;
pub(crate) const IPCR1_ISEQNUM_SHIFT: u32 = 24;
pub(crate) const IPCR1_ISEQNUM_MASK: u32 = 0x7;

pub(crate) const IPCMD_TRG: u32 = 1 << 0;

pub(crate) const IPFCR_CLRFIFO: u32 = 1 << 0;
pub(crate) const IPFCR_WMRK_SHIFT: u32 = 2;
pub(crate) const IPFCR_WMRK_MASK: u32 = 0x7f;

pub(crate) const IPRXFSTS_FILL_MASK: u32 = 0xff;

pub(crate) const STS0_SEQIDLE: u32 = 1 << 0;
pub(crate) const STS0_ARBIDLE: u32 = 1 << 1;

/// Copyable handle to a FlexSPI register block.
#[derive(Clone, Copy)]
pub(crate) struct Regs(*const RegisterBlock);

impl Regs {
    /// # Safety
    ///
    /// `ptr` must point at a FlexSPI register block (or memory laid out like
    /// one) that stays valid for every use of the returned handle.
    pub(crate) const unsafe fn from_ptr(ptr: *const RegisterBlock) -> Self {
        Self(ptr)
    }

    #[cfg(test)]
    pub(crate) fn as_ptr(self) -> *const RegisterBlock {
        self.0
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
