//! Blocking FlexSPI controller driver.

use embassy_hal_internal::{into_ref, PeripheralRef};

use super::lut::{LutSequence, LUT_SEQUENCES};
use super::shared::{
    self, check_and_clear_error, ipcr1_value, port_base_offset, ram_software_reset,
    read_port_sizes, start_ip_command, wait_bus_idle,
};
use super::regs::MCR0_MDIS;
use super::types::{Error, FlexSpiInitConfig, Port};
use super::{Instance, Regs};
use crate::Peripheral;

pub struct FlexSpi<'d, T: Instance> {
    _inner: PeripheralRef<'d, T>,
    max_polls: u32,
}

impl<'d, T: Instance> FlexSpi<'d, T> {
    pub fn with_config(
        inner: impl Peripheral<P = T> + 'd,
        init: FlexSpiInitConfig,
    ) -> Result<Self, Error> {
        into_ref!(inner);

        let mut this = Self {
            _inner: inner,
            max_polls: init.max_polls,
        };
        if init.reset {
            this.software_reset()?;
        }
        Ok(this)
    }

    pub fn new(inner: impl Peripheral<P = T> + 'd) -> Result<Self, Error> {
        Self::with_config(inner, FlexSpiInitConfig::default())
    }

    /// Takes a controller the board code already set up, leaving it untouched.
    pub fn new_preconfigured(inner: impl Peripheral<P = T> + 'd) -> Self {
        into_ref!(inner);
        Self {
            _inner: inner,
            max_polls: FlexSpiInitConfig::preconfigured().max_polls,
        }
    }

    #[inline(always)]
    fn regs(&self) -> Regs {
        T::regs()
    }

    pub fn max_polls(&self) -> u32 {
        self.max_polls
    }

    /// Module-disable gate (`MCR0.MDIS`).
    pub fn enable(&mut self, enable: bool) {
        let regs = self.regs();
        // SAFETY: single-bit gate on an owned controller.
        unsafe {
            regs.mcr0.modify(|v| if enable { v & !MCR0_MDIS } else { v | MCR0_MDIS });
        }
    }

    /// Software reset; busy-waits for `MCR0.SWRESET` to self-clear.
    pub fn software_reset(&mut self) -> Result<(), Error> {
        if ram_software_reset(self.regs(), self.max_polls) {
            Ok(())
        } else {
            Err(Error::Timeout)
        }
    }

    pub fn write_lut_sequence(&mut self, index: u8, seq: &LutSequence) -> Result<(), Error> {
        if index as usize >= LUT_SEQUENCES {
            return Err(Error::InvalidSequence);
        }
        shared::write_lut(self.regs(), index as usize, seq.words());
        Ok(())
    }

    pub fn set_port_size_kib(&mut self, port: Port, kib: u32) {
        // SAFETY: FLSHCR0 only takes effect on the next access to the port.
        unsafe { self.regs().flshcr0[port.index()].write(kib) };
    }

    pub fn port_size_kib(&self, port: Port) -> u32 {
        self.regs().flshcr0[port.index()].read()
    }

    /// Offset that turns a port-relative address into a device address.
    pub fn port_base_offset(&self, port: Port) -> u32 {
        port_base_offset(read_port_sizes(self.regs()), port)
    }

    pub fn transfer(&mut self, transfer: &mut Transfer<'_>) -> Result<(), Error> {
        let regs = self.regs();
        let ipcr1 = ipcr1_value(transfer.seq_index, transfer.seq_count, transfer.data_len())?;

        if wait_bus_idle(regs, self.max_polls).is_err() {
            return Err(Error::Busy);
        }

        start_ip_command(regs, transfer.port, transfer.device_address, ipcr1);

        let data_result = match &mut transfer.data {
            TransferData::None => Ok(()),
            TransferData::Read(out) => shared::read_fifo(regs, out, self.max_polls),
            TransferData::Write(data) => shared::write_fifo(regs, data, self.max_polls),
        };

        wait_bus_idle(regs, self.max_polls)?;
        data_result?;
        check_and_clear_error(regs, regs.intr.read())
    }
}

pub enum TransferData<'a> {
    None,
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

pub struct Transfer<'a> {
    pub port: Port,
    /// Absolute device address, port offset already applied.
    pub device_address: u32,
    pub seq_index: u8,
    pub seq_count: u8,
    pub data: TransferData<'a>,
}

impl<'a> Transfer<'a> {
    pub const fn command(port: Port, device_address: u32, seq_index: u8) -> Self {
        Self {
            port,
            device_address,
            seq_index,
            seq_count: 1,
            data: TransferData::None,
        }
    }

    pub fn read(port: Port, device_address: u32, seq_index: u8, out: &'a mut [u8]) -> Self {
        Self {
            port,
            device_address,
            seq_index,
            seq_count: 1,
            data: TransferData::Read(out),
        }
    }

    pub const fn write(port: Port, device_address: u32, seq_index: u8, data: &'a [u8]) -> Self {
        Self {
            port,
            device_address,
            seq_index,
            seq_count: 1,
            data: TransferData::Write(data),
        }
    }

    pub fn data_len(&self) -> usize {
        match &self.data {
            TransferData::None => 0,
            TransferData::Read(out) => out.len(),
            TransferData::Write(data) => data.len(),
        }
    }
}
