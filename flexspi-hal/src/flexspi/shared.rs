use core::cmp::min;
use core::hint::spin_loop;

use super::regs::*;
use super::types::{Error, Port};

pub(super) const FIFO_WINDOW_BYTES: usize = 32 * 4;
pub(super) const MAX_IP_DATA_BYTES: usize = IPCR1_IDATSZ_MASK as usize;
pub(super) const MAX_SEQ_COUNT: u8 = 8;
pub(super) const LUT_KEY: u32 = 0x5af0_5af0;
pub(crate) const DEFAULT_TIMEOUT_POLLS: u32 = 2_000_000;

const IP_ERROR_FLAGS: u32 = INTR_SEQTIMEOUT | INTR_IPCMDERR | INTR_IPCMDGE;
const STALE_FLAGS: u32 =
    INTR_AHBCMDERR | INTR_IPCMDERR | INTR_AHBCMDGE | INTR_IPCMDGE | INTR_IPCMDDONE;

// ============================================================================
// Pure register-value helpers
// ============================================================================

/// Maps IP error flags in `INTR` to an error, most severe first.
pub(super) const fn decode_ip_error(intr: u32) -> Option<Error> {
    if intr & INTR_SEQTIMEOUT != 0 {
        Some(Error::SequenceExecutionTimeout)
    } else if intr & INTR_IPCMDERR != 0 {
        Some(Error::IpCommandSequenceError)
    } else if intr & INTR_IPCMDGE != 0 {
        Some(Error::IpCommandGrantTimeout)
    } else {
        None
    }
}

pub(super) fn ipcr1_value(seq_index: u8, seq_count: u8, data_len: usize) -> Result<u32, Error> {
    if seq_index as u32 > IPCR1_ISEQID_MASK {
        return Err(Error::InvalidSequence);
    }
    if seq_count == 0 || seq_count > MAX_SEQ_COUNT {
        return Err(Error::InvalidSequence);
    }
    if data_len > MAX_IP_DATA_BYTES {
        return Err(Error::InvalidLength);
    }
    Ok((data_len as u32 & IPCR1_IDATSZ_MASK)
        | ((seq_index as u32 & IPCR1_ISEQID_MASK) << IPCR1_ISEQID_SHIFT)
        | (((seq_count - 1) as u32 & IPCR1_ISEQNUM_MASK) << IPCR1_ISEQNUM_SHIFT))
}

/// Bytes moved per FIFO watermark event for an `IPRXFCR`/`IPTXFCR` value.
pub(super) fn watermark_bytes(fcr: u32) -> usize {
    let level = ((fcr >> IPFCR_WMRK_SHIFT) & IPFCR_WMRK_MASK) as usize + 1;
    min(level * 8, FIFO_WINDOW_BYTES)
}

/// Byte offset of `port` inside the controller's flat device address space.
///
/// Ports are stacked A1, A2, B1, B2; each `FLSHCR0` entry holds a size in KiB.
pub(super) fn port_base_offset(sizes_kib: [u32; 4], port: Port) -> u32 {
    sizes_kib[..port.index()]
        .iter()
        .fold(0u32, |acc, kib| acc.wrapping_add(kib.wrapping_mul(1024)))
}

pub(super) fn pack_le_word(data: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word[..data.len()].copy_from_slice(data);
    u32::from_le_bytes(word)
}

// ============================================================================
// Register sequences
// ============================================================================

pub(super) fn check_and_clear_error(regs: Regs, intr: u32) -> Result<(), Error> {
    let Some(err) = decode_ip_error(intr) else {
        return Ok(());
    };
    // SAFETY: W1C flags and self-clearing FIFO reset bits.
    unsafe {
        regs.intr.write(intr & IP_ERROR_FLAGS);
        regs.iptxfcr.modify(|v| v | IPFCR_CLRFIFO);
        regs.iprxfcr.modify(|v| v | IPFCR_CLRFIFO);
    }
    Err(err)
}

fn wait_intr(regs: Regs, mask: u32, max_polls: u32) -> Result<(), Error> {
    for _ in 0..max_polls {
        let intr = regs.intr.read();
        check_and_clear_error(regs, intr)?;
        if intr & mask != 0 {
            return Ok(());
        }
        spin_loop();
    }
    Err(Error::Timeout)
}

fn wait_rx_fill(regs: Regs, bytes: usize, max_polls: u32) -> Result<(), Error> {
    for _ in 0..max_polls {
        let filled = (regs.iprxfsts.read() & IPRXFSTS_FILL_MASK) as usize * 8;
        if filled >= bytes {
            return check_and_clear_error(regs, regs.intr.read());
        }
        check_and_clear_error(regs, regs.intr.read())?;
        spin_loop();
    }
    Err(Error::Timeout)
}

pub(super) fn wait_bus_idle(regs: Regs, max_polls: u32) -> Result<(), Error> {
    const IDLE: u32 = STS0_ARBIDLE | STS0_SEQIDLE;
    for _ in 0..max_polls {
        if regs.sts0.read() & IDLE == IDLE {
            return Ok(());
        }
        spin_loop();
    }
    Err(Error::Timeout)
}

/// Arms and triggers one IP command; data phases are driven by the caller.
pub(super) fn start_ip_command(regs: Regs, port: Port, address: u32, ipcr1: u32) {
    // SAFETY: plain register programming on an owned controller.
    unsafe {
        regs.flshcr2[port.index()].modify(|v| v | FLSHCR2_CLRINSTRPTR);
        regs.intr.write(STALE_FLAGS);
        regs.ipcr0.write(address);
        regs.iptxfcr.modify(|v| v | IPFCR_CLRFIFO);
        regs.iprxfcr.modify(|v| v | IPFCR_CLRFIFO);
        regs.ipcr1.write(ipcr1);
        regs.ipcmd.modify(|v| v | IPCMD_TRG);
    }
}

pub(super) fn write_fifo(regs: Regs, data: &[u8], max_polls: u32) -> Result<(), Error> {
    let burst = watermark_bytes(regs.iptxfcr.read());
    for chunk in data.chunks(burst) {
        wait_intr(regs, INTR_IPTXWE, max_polls)?;
        for (slot, bytes) in regs.tfdr.iter().zip(chunk.chunks(4)) {
            // SAFETY: TX FIFO window write.
            unsafe { slot.write(pack_le_word(bytes)) };
        }
        // SAFETY: pushes the burst into the TX FIFO.
        unsafe { regs.intr.write(INTR_IPTXWE) };
    }
    Ok(())
}

pub(super) fn read_fifo(regs: Regs, out: &mut [u8], max_polls: u32) -> Result<(), Error> {
    let burst = watermark_bytes(regs.iprxfcr.read());
    for chunk in out.chunks_mut(burst) {
        if chunk.len() == burst {
            wait_intr(regs, INTR_IPRXWA, max_polls)?;
        } else {
            wait_rx_fill(regs, chunk.len(), max_polls)?;
        }
        for (slot, bytes) in regs.rfdr.iter().zip(chunk.chunks_mut(4)) {
            let word = slot.read().to_le_bytes();
            bytes.copy_from_slice(&word[..bytes.len()]);
        }
        // SAFETY: pops the burst from the RX FIFO.
        unsafe { regs.intr.write(INTR_IPRXWA) };
    }
    Ok(())
}

pub(super) fn write_lut(regs: Regs, seq_index: usize, words: [u32; 4]) {
    let base = seq_index * 4;
    // SAFETY: LUT is unlocked only for the duration of the four writes.
    unsafe {
        regs.lutkey.write(LUT_KEY);
        regs.lutcr.write(LUTCR_UNLOCK);
        for (slot, word) in regs.lut[base..base + 4].iter().zip(words) {
            slot.write(word);
        }
        regs.lutkey.write(LUT_KEY);
        regs.lutcr.write(LUTCR_LOCK);
    }
}

pub(super) fn read_port_sizes(regs: Regs) -> [u32; 4] {
    let mut sizes = [0u32; 4];
    for (size, reg) in sizes.iter_mut().zip(regs.flshcr0.iter()) {
        *size = reg.read();
    }
    sizes
}

// ============================================================================
// RAM-resident reset
// ============================================================================
//
// The controller may also serve the flash the CPU executes from, so the
// reset and its wait loop must not fetch from the FlexSPI window.

#[inline(never)]
#[cfg_attr(target_os = "none", link_section = ".data.ramfunc")]
pub(super) fn ram_software_reset(regs: Regs, max_polls: u32) -> bool {
    // SAFETY: SWRESET self-clears once the controller has reset.
    unsafe { regs.mcr0.modify(|v| v | MCR0_SWRESET) };
    for _ in 0..max_polls {
        if regs.mcr0.read() & MCR0_SWRESET == 0 {
            return true;
        }
        spin_loop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::super::regs::fake::FakeFlexSpi;
    use super::*;

    const STS0_OFFSET: usize = 0x0e0;
    const INTR_OFFSET: usize = 0x014;

    #[test]
    fn ipcr1_encodes_read_data_sequence() {
        let value = ipcr1_value(11, 1, 4).unwrap();
        assert_eq!(value, 4 | (11 << 16));
    }

    #[test]
    fn ipcr1_encodes_sequence_count_minus_one() {
        let value = ipcr1_value(12, 3, 0).unwrap();
        assert_eq!(value, (12 << 16) | (2 << 24));
    }

    #[test]
    fn ipcr1_rejects_out_of_range_fields() {
        assert_eq!(ipcr1_value(32, 1, 4), Err(Error::InvalidSequence));
        assert_eq!(ipcr1_value(0, 0, 4), Err(Error::InvalidSequence));
        assert_eq!(ipcr1_value(0, 9, 4), Err(Error::InvalidSequence));
        assert_eq!(ipcr1_value(0, 1, 0x1_0000), Err(Error::InvalidLength));
    }

    #[test]
    fn ip_errors_decode_in_priority_order() {
        assert_eq!(decode_ip_error(0), None);
        assert_eq!(decode_ip_error(INTR_IPCMDDONE), None);
        assert_eq!(
            decode_ip_error(INTR_IPCMDGE),
            Some(Error::IpCommandGrantTimeout)
        );
        assert_eq!(
            decode_ip_error(INTR_IPCMDGE | INTR_IPCMDERR),
            Some(Error::IpCommandSequenceError)
        );
        assert_eq!(
            decode_ip_error(INTR_SEQTIMEOUT | INTR_IPCMDERR),
            Some(Error::SequenceExecutionTimeout)
        );
    }

    #[test]
    fn watermark_counts_64bit_entries_and_caps_at_window() {
        assert_eq!(watermark_bytes(0), 8);
        assert_eq!(watermark_bytes(3 << IPFCR_WMRK_SHIFT), 32);
        assert_eq!(watermark_bytes(IPFCR_WMRK_MASK << IPFCR_WMRK_SHIFT), 128);
        // FIFO clear bit does not leak into the level.
        assert_eq!(watermark_bytes(IPFCR_CLRFIFO), 8);
    }

    #[test]
    fn port_b1_sits_after_port_a1() {
        // 64 MiB flash on A1, nothing on A2.
        let sizes = [64 * 1024, 0, 8 * 1024, 0];
        assert_eq!(port_base_offset(sizes, Port::A1), 0);
        assert_eq!(port_base_offset(sizes, Port::B1), 0x0400_0000);
        assert_eq!(port_base_offset(sizes, Port::B2), 0x0480_0000);
    }

    #[test]
    fn unconfigured_ports_add_no_offset() {
        assert_eq!(port_base_offset([0; 4], Port::B1), 0);
    }

    #[test]
    fn pack_le_word_zero_fills_tail() {
        assert_eq!(pack_le_word(&[0x11, 0x22, 0x33, 0x44]), 0x4433_2211);
        assert_eq!(pack_le_word(&[0xaa, 0xbb]), 0x0000_bbaa);
    }

    #[test]
    fn write_lut_fills_the_selected_sequence_and_relocks() {
        let fake = FakeFlexSpi::new();
        let regs = fake.regs();
        write_lut(regs, 12, [1, 2, 3, 4]);

        assert_eq!(regs.lut[47].read(), 0);
        assert_eq!(regs.lut[48].read(), 1);
        assert_eq!(regs.lut[51].read(), 4);
        assert_eq!(regs.lut[52].read(), 0);
        assert_eq!(regs.lutkey.read(), LUT_KEY);
        assert_eq!(regs.lutcr.read(), LUTCR_LOCK);
    }

    #[test]
    fn start_ip_command_programs_address_and_sequence() {
        let fake = FakeFlexSpi::new();
        let regs = fake.regs();
        let ipcr1 = ipcr1_value(12, 1, 4).unwrap();
        start_ip_command(regs, Port::B1, 0x0400_0010, ipcr1);

        assert_eq!(regs.ipcr0.read(), 0x0400_0010);
        assert_eq!(regs.ipcr1.read(), ipcr1);
        assert_eq!(regs.ipcmd.read() & IPCMD_TRG, IPCMD_TRG);
        assert_ne!(regs.flshcr2[2].read() & FLSHCR2_CLRINSTRPTR, 0);
        assert_eq!(regs.flshcr2[0].read(), 0);
    }

    #[test]
    fn idle_wait_times_out_on_busy_bus() {
        let fake = FakeFlexSpi::new();
        assert_eq!(wait_bus_idle(fake.regs(), 16), Err(Error::Timeout));

        fake.set_raw(STS0_OFFSET, STS0_ARBIDLE | STS0_SEQIDLE);
        assert_eq!(wait_bus_idle(fake.regs(), 16), Ok(()));
    }

    #[test]
    fn fifo_write_reports_pending_command_error() {
        let fake = FakeFlexSpi::new();
        fake.set_raw(INTR_OFFSET, INTR_IPCMDERR);
        assert_eq!(
            write_fifo(fake.regs(), &[0u8; 4], 16),
            Err(Error::IpCommandSequenceError)
        );
    }

    #[test]
    fn fifo_write_times_out_without_watermark_event() {
        let fake = FakeFlexSpi::new();
        assert_eq!(write_fifo(fake.regs(), &[0u8; 4], 16), Err(Error::Timeout));
    }

    #[test]
    fn fifo_write_places_words_little_endian() {
        let fake = FakeFlexSpi::new();
        fake.set_raw(INTR_OFFSET, INTR_IPTXWE);
        write_fifo(fake.regs(), &0x0012_3456u32.to_le_bytes(), 16).unwrap();

        let tfdr0 = unsafe {
            core::ptr::read_volatile(
                (fake.regs().as_ptr() as *const u8).add(0x180) as *const u32,
            )
        };
        assert_eq!(tfdr0, 0x0012_3456);
    }

    #[test]
    fn fifo_read_tail_waits_for_fill_level() {
        let fake = FakeFlexSpi::new();
        let mut out = [0u8; 4];
        assert_eq!(read_fifo(fake.regs(), &mut out, 16), Err(Error::Timeout));

        fake.set_raw(0x0f4, 1);
        fake.set_raw(0x100, 0xdead_beef);
        read_fifo(fake.regs(), &mut out, 16).unwrap();
        assert_eq!(u32::from_le_bytes(out), 0xdead_beef);
    }

    #[test]
    fn software_reset_reports_stuck_reset_bit() {
        let fake = FakeFlexSpi::new();
        assert!(!ram_software_reset(fake.regs(), 16));
        assert_ne!(fake.regs().mcr0.read() & MCR0_SWRESET, 0);
    }
}
