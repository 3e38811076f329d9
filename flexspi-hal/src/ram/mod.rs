//! Memory-mapped access to devices behind the FlexSPI AMBA windows.
//!
//! - [`MappedWindow`]: bounds-checked volatile word accessor
//! - [`memory_map`]: window and PSRAM placement constants
pub mod mapped_window;
pub mod memory_map;
pub use mapped_window::MappedWindow;
