fn main() {
    // Put `memory.x` in our output directory and ensure it's on the linker search path.
    let out = std::env::var("OUT_DIR").unwrap();
    let out_dir = std::path::Path::new(&out);
    std::fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    std::fs::copy("psram.x", out_dir.join("psram.x")).unwrap();
    println!("cargo:rustc-link-search={out}");

    // Boot image version: version in the low half, its complement in the high half.
    let major: u32 = std::env::var("CARGO_PKG_VERSION_MAJOR").unwrap().parse().unwrap();
    let minor: u32 = std::env::var("CARGO_PKG_VERSION_MINOR").unwrap().parse().unwrap();
    let version = ((major & 0xff) << 8) | (minor & 0xff);
    let biv = (!version << 16) | version;
    std::fs::write(
        out_dir.join("biv.rs"),
        format!("#[link_section = \".biv\"]\n#[used]\nstatic BOOT_IMAGE_VERSION: u32 = {biv:#010x};\n"),
    )
    .unwrap();
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=psram.x");

    // `--nmagic` is required if memory section addresses are not aligned to 0x10000,
    // for example the FLASH section in `memory.x`, which follows the boot header.
    println!("cargo:rustc-link-arg=--nmagic");

    println!("cargo:rustc-link-arg=-Tlink.x");
    println!("cargo:rustc-link-arg=-Tpsram.x");

    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}
