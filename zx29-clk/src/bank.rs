// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Register banks, and bit field access on top of them.

use std::ops::Range;

use probe_rs::MemoryInterface;

use crate::descriptor::Field;

/// Word access to a bank of 32-bit registers.
///
/// Addresses are absolute byte addresses.
pub trait RegisterBank {
    /// Load the 32-bit register at `address`.
    fn read_word(&mut self, address: u64) -> Result<u32, AccessError>;
    /// Store `value` to the 32-bit register at `address`.
    fn write_word(&mut self, address: u64, value: u32) -> Result<(), AccessError>;
}

/// A register access failed.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("address {0:#010x} is outside of the register window")]
    OutOfWindow(u64),
    #[error("address {0:#010x} isn't word aligned")]
    Misaligned(u64),
    #[error("register offset {offset:#x} from base {base:#010x} overflows the address space")]
    AddressOverflow { base: u64, offset: u32 },
    #[error("{what} at {address:#010x}")]
    Backend {
        what: &'static str,
        address: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn context<E: std::error::Error + Send + Sync + 'static>(
    what: &'static str,
    address: u64,
) -> impl FnOnce(E) -> AccessError {
    move |source| AccessError::Backend {
        what,
        address,
        source: Box::new(source),
    }
}

fn field_address(base: u64, field: Field) -> Result<u64, AccessError> {
    base.checked_add(u64::from(field.offset))
        .ok_or(AccessError::AddressOverflow {
            base,
            offset: field.offset,
        })
}

/// Read a bit field, shifted down to bit zero.
pub fn read_field(
    bank: &mut dyn RegisterBank,
    base: u64,
    field: Field,
) -> Result<u32, AccessError> {
    let word = bank.read_word(field_address(base, field)?)?;
    Ok((word & field.mask())
        .checked_shr(u32::from(field.shift))
        .unwrap_or(0))
}

/// Replace a bit field, keeping every other bit of the register.
///
/// Bits of `value` that don't fit in the field are dropped.
pub fn write_field(
    bank: &mut dyn RegisterBank,
    base: u64,
    field: Field,
    value: u32,
) -> Result<(), AccessError> {
    let address = field_address(base, field)?;
    let mask = field.mask();
    let value = value.checked_shl(u32::from(field.shift)).unwrap_or(0) & mask;

    let word = bank.read_word(address)?;
    bank.write_word(address, (word & !mask) | value)
}

/// Memory mapped registers of the running system.
///
/// Use this when the library runs on the target itself.
#[derive(Debug)]
pub struct Mmio {
    window: Range<u64>,
}

impl Mmio {
    /// Access the registers within `window`.
    ///
    /// Accesses outside of the window fail without touching memory.
    ///
    /// # Safety
    ///
    /// Every word aligned address in `window` must be a valid register
    /// for volatile 32-bit loads and stores, and nothing else may hold
    /// a reference into that memory.
    pub const unsafe fn new(window: Range<u64>) -> Self {
        Self { window }
    }

    fn pointer(&self, address: u64) -> Result<*mut u32, AccessError> {
        if address % 4 != 0 {
            return Err(AccessError::Misaligned(address));
        }
        if !self.window.contains(&address) {
            return Err(AccessError::OutOfWindow(address));
        }
        Ok(address as usize as *mut u32)
    }
}

impl RegisterBank for Mmio {
    fn read_word(&mut self, address: u64) -> Result<u32, AccessError> {
        let ptr = self.pointer(address)?;
        // Safety: the window was vouched for in `new`.
        Ok(unsafe { ptr.read_volatile() })
    }

    fn write_word(&mut self, address: u64, value: u32) -> Result<(), AccessError> {
        let ptr = self.pointer(address)?;
        // Safety: the window was vouched for in `new`.
        unsafe { ptr.write_volatile(value) };
        Ok(())
    }
}

/// Registers of a target attached to a debug probe.
pub struct ProbeMemory<'a> {
    mem: &'a mut dyn MemoryInterface,
}

impl<'a> ProbeMemory<'a> {
    /// Access registers through a probe-rs memory interface, like a core.
    pub fn new(mem: &'a mut dyn MemoryInterface) -> Self {
        Self { mem }
    }
}

impl RegisterBank for ProbeMemory<'_> {
    fn read_word(&mut self, address: u64) -> Result<u32, AccessError> {
        self.mem
            .read_word_32(address)
            .map_err(context("reading a register", address))
    }

    fn write_word(&mut self, address: u64, value: u32) -> Result<(), AccessError> {
        self.mem
            .write_word_32(address, value)
            .map_err(context("writing a register", address))?;

        // Force the probe to dispatch the write before anyone reads it back.
        self.mem
            .flush()
            .map_err(context("flushing a register write", address))
    }
}
