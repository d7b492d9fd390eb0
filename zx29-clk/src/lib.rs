// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Control the clock tree of the Sanechips ZX297520V3.
//!
//! The clock controllers are described by static tables of fixed
//! clocks, multiplexers, and gates. Select the tables for your
//! controller with [`bind`], then enable, disable, reparent, and
//! measure clocks through the returned [`ClockHandle`].
//!
//! Registers are reached through a [`RegisterBank`]. Use [`Mmio`] when
//! running on the SoC, or [`ProbeMemory`] to drive a target attached to
//! a debug probe. If you're looking for the command line tool, that's
//! provided in a separate package.
//!
//! ```no_run
//! use zx29_clk::{ClockId, Mmio};
//!
//! let clocks = zx29_clk::bind("sanechips,zx297520v3-matrix-clk", Some(0x0130_0000))?;
//! // Safety: the matrix clock block is mapped here, and nothing else uses it.
//! let mut regs = unsafe { Mmio::new(0x0130_0000..0x0130_1000) };
//!
//! clocks.set_parent(ClockId::CPU_WCLK, ClockId::CLK624M, &mut regs)?;
//! assert_eq!(clocks.get_rate(ClockId::CPU_WCLK, &mut regs), 624_000_000);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod bank;
mod descriptor;
mod domain;
mod engine;

pub use bank::{read_field, write_field, AccessError, Mmio, ProbeMemory, RegisterBank};
pub use descriptor::{ClockDescriptor, ClockId, ClockKind, Field};
pub use domain::{Domain, TableError, CATALOG, MATRIX_V1, MATRIX_V2, TOP};
pub use engine::{bind, ClockError, ClockHandle, ConfigError, RateError};
