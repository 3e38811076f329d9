//! PSRAM polling-transfer check on FlexSPI1 port B1.
//!
//! Runs the fill/fill/verify pattern over the whole 8 MiB, first with IP
//! commands and then through the cached AMBA window.

#![no_std]
#![no_main]

use core::mem::MaybeUninit;
use core::ptr::{addr_of, addr_of_mut};

use defmt::*;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embedded_storage::{ReadStorage, Storage};
use panic_probe as _;
use rt595 as _;

use flexspi_hal::cache::Cache64;
use flexspi_hal::flexspi::FlexSpi;
use flexspi_hal::memtest::{TestConfig, TestReport};
use flexspi_hal::psram::{Psram, PsramConfig};
use flexspi_hal::ram::memory_map::{PSRAM_BUFFER_WORDS, PSRAM_CACHE_START};

const SCRATCH_BYTES: usize = 1024;

static mut WRITE_BUFFER: [u8; SCRATCH_BYTES] = [0; SCRATCH_BYTES];
static mut READ_BUFFER: [u8; SCRATCH_BYTES] = [0; SCRATCH_BYTES];

#[used]
#[link_section = ".psram_bss"]
static mut PSRAM_NOINIT_BUFFER: MaybeUninit<[u32; PSRAM_BUFFER_WORDS]> = MaybeUninit::uninit();

fn print_report(path: &str, report: &TestReport) {
    if report.passed() {
        info!("{} path: {} words verified", path, report.words_verified);
    } else {
        error!(
            "{} path: {} write failures, {} read failures, {} words verified",
            path, report.write_failures, report.read_failures, report.words_verified
        );
        if let Some(m) = report.mismatch {
            error!(
                "{} path: first mismatch at {:#x}, read {:#x}, expected {:#x}",
                path, m.address, m.read, m.expected
            );
        }
    }
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = flexspi_hal::init(Default::default());

    // Clocks, pins and the HyperBus timing of FlexSPI1 come from board init.
    let flexspi = FlexSpi::new_preconfigured(p.FLEXSPI1);
    let mut psram = unwrap!(Psram::init(flexspi, PsramConfig::default()));

    info!("FLEXSPI example started!");

    let window_base = psram.ahb_window().addr();
    if window_base != PSRAM_CACHE_START {
        warn!(
            "PSRAM window at {:#x}, linker script expects {:#x}",
            window_base, PSRAM_CACHE_START
        );
    }

    // SAFETY: main is the only user of these statics.
    let (tx, rx, noinit) = unsafe {
        (
            &mut *addr_of_mut!(WRITE_BUFFER),
            &mut *addr_of_mut!(READ_BUFFER),
            addr_of!(PSRAM_NOINIT_BUFFER) as usize,
        )
    };
    info!("PSRAM no-init buffer at {:#x}", noinit);

    for (i, byte) in tx.iter_mut().enumerate() {
        *byte = i as u8;
    }
    unwrap!(Storage::write(&mut psram, 0, &tx[..]));
    unwrap!(ReadStorage::read(&mut psram, 0, &mut rx[..]));
    let mut all_checks_ok = tx[..] == rx[..];
    if !all_checks_ok {
        error!("Scratch buffer round trip mismatch");
    }

    let config = TestConfig::default();

    let ip = unwrap!(psram.run_ip_test(&config));
    print_report("IP", &ip);
    all_checks_ok &= ip.passed();

    let mut cache = Cache64::new(p.CACHE64_CTRL1);
    let ahb = unwrap!(psram.run_ahb_test(&mut cache, &config));
    print_report("AHB", &ahb);
    all_checks_ok &= ahb.passed();

    if all_checks_ok {
        info!("PSRAM polling transfer PASSED");
    } else {
        error!("PSRAM polling transfer FAILED");
    }

    loop {
        cortex_m::asm::wfi();
    }
}
