//! Logging shim: forwards to `defmt` or `log`, or compiles the macros out.
//!
//! The macros are textual, so `mod fmt` is declared first in `lib.rs` with `#[macro_use]` and
//! every later module calls them without an import.

#![allow(unused_macros)]

cfg_if::cfg_if! {
    if #[cfg(feature = "defmt")] {
        macro_rules! trace {
            ($($arg:tt)*) => { ::defmt::trace!($($arg)*) };
        }
        macro_rules! debug {
            ($($arg:tt)*) => { ::defmt::debug!($($arg)*) };
        }
        macro_rules! info {
            ($($arg:tt)*) => { ::defmt::info!($($arg)*) };
        }
        macro_rules! warn {
            ($($arg:tt)*) => { ::defmt::warn!($($arg)*) };
        }
        macro_rules! error {
            ($($arg:tt)*) => { ::defmt::error!($($arg)*) };
        }
    } else if #[cfg(feature = "log")] {
        macro_rules! trace {
            ($($arg:tt)*) => { ::log::trace!($($arg)*) };
        }
        macro_rules! debug {
            ($($arg:tt)*) => { ::log::debug!($($arg)*) };
        }
        macro_rules! info {
            ($($arg:tt)*) => { ::log::info!($($arg)*) };
        }
        macro_rules! warn {
            ($($arg:tt)*) => { ::log::warn!($($arg)*) };
        }
        macro_rules! error {
            ($($arg:tt)*) => { ::log::error!($($arg)*) };
        }
    } else {
        macro_rules! trace {
            ($($arg:tt)*) => {};
        }
        macro_rules! debug {
            ($($arg:tt)*) => {};
        }
        macro_rules! info {
            ($($arg:tt)*) => {};
        }
        macro_rules! warn {
            ($($arg:tt)*) => {};
        }
        macro_rules! error {
            ($($arg:tt)*) => {};
        }
    }
}
