// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! The clock domains of the ZX297520V3, and how to search them.

use crate::descriptor::{fixed, gate, mux, ClockDescriptor, ClockId, ClockKind};

/// A clock controller variant.
///
/// Each domain sees the shared fixed clocks plus its own local table.
/// Domains are `static`s of the library; select one with [`Domain::lookup`].
#[derive(Debug)]
pub struct Domain {
    /// The device tree compatible string that selects this domain.
    key: &'static str,
    fixed: &'static [ClockDescriptor],
    locals: &'static [&'static [ClockDescriptor]],
    /// Register base, when it's fixed for every board.
    default_base: Option<u64>,
}

/// Start of the top system clock block.
const TOP_SYSCLK_BASE: u64 = 0x0013_b000;

static FIXED_CLKS: [ClockDescriptor; 10] = [
    fixed(ClockId::CLK25M, "CLK25M", 25_000_000),
    fixed(ClockId::CLK26M, "CLK26M", 26_000_000),
    fixed(ClockId::CLK39M, "CLK39M", 39_000_000),
    fixed(ClockId::CLK50M, "CLK50M", 50_000_000),
    fixed(ClockId::CLK78M, "CLK78M", 78_000_000),
    fixed(ClockId::CLK100M, "CLK100M", 100_000_000),
    fixed(ClockId::CLK104M, "CLK104M", 104_000_000),
    fixed(ClockId::CLK156M, "CLK156M", 156_000_000),
    fixed(ClockId::CLK312M, "CLK312M", 312_000_000),
    fixed(ClockId::CLK624M, "CLK624M", 624_000_000),
];

const AHB_PARENTS: &[ClockId] = &[ClockId::CLK26M, ClockId::CLK104M, ClockId::CLK78M];

const UART_WCLK_PARENTS: &[ClockId] = &[ClockId::CLK26M, ClockId::CLK104M];

static TOP_CLKS: [ClockDescriptor; 6] = [
    mux(ClockId::AHB_MUX, "AHB_MUX", 0x3c, 4, 2, AHB_PARENTS),
    mux(
        ClockId::UART0_WCLK_MUX,
        "UART0_WCLK_MUX",
        0x40,
        2,
        1,
        UART_WCLK_PARENTS,
    ),
    gate(ClockId::USB_24M, "USB_24M", 0x6c, 3),
    gate(ClockId::USB_AHB, "USB_AHB", 0x6c, 4),
    gate(ClockId::UART0_WCLK, "UART0_WCLK", 0x5c, 12),
    gate(ClockId::UART0_PCLK, "UART0_PCLK", 0x5c, 13),
];

const CPU_WCLK_PARENTS: &[ClockId] = &[
    ClockId::CLK26M,
    ClockId::CLK624M,
    ClockId::CLK312M,
    ClockId::CLK156M,
];

const SD1_WCLK_PARENTS: &[ClockId] = &[
    ClockId::CLK26M,
    ClockId::CLK100M,
    ClockId::CLK78M,
    ClockId::CLK50M,
    ClockId::CLK39M,
    ClockId::CLK25M,
];

static MATRIX_CLKS_V1: [ClockDescriptor; 4] = [
    mux(ClockId::CPU_WCLK, "CPU_WCLK", 0x20, 0, 2, CPU_WCLK_PARENTS),
    mux(
        ClockId::SD1_WCLK_MUX,
        "SD1_WCLK_MUX",
        0x50,
        8,
        3,
        SD1_WCLK_PARENTS,
    ),
    gate(ClockId::SD1_PCLK, "SD1_PCLK", 0x50, 4),
    gate(ClockId::SD1_WCLK, "SD1_WCLK", 0x50, 5),
];

// The second matrix revision moved the CPU selector and lost the SD1 gates.
static MATRIX_CLKS_V2: [ClockDescriptor; 2] = [
    mux(ClockId::CPU_WCLK, "CPU_WCLK", 0x40, 0, 2, CPU_WCLK_PARENTS),
    mux(
        ClockId::SD1_WCLK_MUX,
        "SD1_WCLK_MUX",
        0x50,
        8,
        3,
        SD1_WCLK_PARENTS,
    ),
];

/// The top clock and reset manager.
pub static TOP: Domain = Domain::new(
    "sanechips,zx297520v3-topcrm-clk",
    &FIXED_CLKS,
    &[&TOP_CLKS],
    Some(TOP_SYSCLK_BASE),
);

/// The first revision of the matrix clock block.
pub static MATRIX_V1: Domain = Domain::new(
    "sanechips,zx297520v3-matrix-clk",
    &FIXED_CLKS,
    &[&MATRIX_CLKS_V1],
    None,
);

/// The second revision of the matrix clock block.
///
/// Same identifiers as [`MATRIX_V1`], different register layout.
pub static MATRIX_V2: Domain = Domain::new(
    "sanechips,zx297520v3-matrix-clk-v2",
    &FIXED_CLKS,
    &[&MATRIX_CLKS_V2],
    None,
);

/// Every known domain.
pub static CATALOG: [&Domain; 3] = [&TOP, &MATRIX_V1, &MATRIX_V2];

/// A broken descriptor table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("clock {0} is described more than once")]
    Duplicate(ClockId),
    #[error("mux {0} has no parents")]
    NoParents(ClockId),
    #[error("mux {clock} has {parents} parents but its selector holds {capacity} values")]
    SelectorTooNarrow {
        clock: ClockId,
        parents: usize,
        capacity: u64,
    },
    #[error("mux {clock} names parent {parent}, which isn't in the domain")]
    UnknownParent { clock: ClockId, parent: ClockId },
    #[error("clock {0} controls bits outside of a 32-bit register")]
    FieldOutOfRange(ClockId),
}

impl Domain {
    pub(crate) const fn new(
        key: &'static str,
        fixed: &'static [ClockDescriptor],
        locals: &'static [&'static [ClockDescriptor]],
        default_base: Option<u64>,
    ) -> Self {
        Self {
            key,
            fixed,
            locals,
            default_base,
        }
    }

    /// Find the domain selected by a compatible string.
    pub fn lookup(key: &str) -> Option<&'static Domain> {
        CATALOG.iter().copied().find(|domain| domain.key == key)
    }

    /// The compatible string that selects this domain.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Returns the register base shared by every board, if there is one.
    pub fn default_base(&self) -> Option<u64> {
        self.default_base
    }

    /// Every descriptor in this domain; fixed clocks first, then the local tables.
    pub fn descriptors(&self) -> impl Iterator<Item = &'static ClockDescriptor> + '_ {
        self.fixed
            .iter()
            .chain(self.locals.iter().copied().flatten())
    }

    /// The number of descriptors visible from this domain.
    pub fn len(&self) -> usize {
        self.fixed.len() + self.locals.iter().map(|table| table.len()).sum::<usize>()
    }

    /// True if the domain has no descriptors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the descriptor for `id`.
    ///
    /// The fixed table is searched before the local tables.
    pub fn find(&self, id: ClockId) -> Option<&'static ClockDescriptor> {
        self.descriptors().find(|desc| desc.id() == id)
    }

    /// Look up a clock by name.
    ///
    /// Names are case insensitive, and a missing `_MUX` suffix is
    /// tolerated.
    pub fn lookup_name(&self, name: &str) -> Option<&'static ClockDescriptor> {
        let name = name.to_uppercase();

        if let Some(desc) = self.descriptors().find(|desc| desc.name() == name) {
            return Some(desc);
        }

        if !name.ends_with("_MUX") {
            let name = format!("{name}_MUX");
            return self.descriptors().find(|desc| desc.name() == name);
        }

        None
    }

    /// Check the table invariants, returning the first violation.
    pub fn validate(&self) -> Result<(), TableError> {
        for (idx, desc) in self.descriptors().enumerate() {
            if self.descriptors().skip(idx + 1).any(|other| other.id() == desc.id()) {
                return Err(TableError::Duplicate(desc.id()));
            }

            if let Some(field) = desc.field() {
                if !field.fits_word() {
                    return Err(TableError::FieldOutOfRange(desc.id()));
                }
            }

            if let ClockKind::Mux { field, parents } = desc.kind() {
                if parents.is_empty() {
                    return Err(TableError::NoParents(desc.id()));
                }
                if (parents.len() as u64) > field.capacity() {
                    return Err(TableError::SelectorTooNarrow {
                        clock: desc.id(),
                        parents: parents.len(),
                        capacity: field.capacity(),
                    });
                }
                if let Some(parent) = parents.iter().find(|parent| self.find(**parent).is_none()) {
                    return Err(TableError::UnknownParent {
                        clock: desc.id(),
                        parent: *parent,
                    });
                }
            }
        }
        Ok(())
    }
}
