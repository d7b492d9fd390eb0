// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Clock identifiers and the static descriptors behind them.

/// A logical clock identifier.
///
/// Identifiers are stable and unique within everything a
/// [`Domain`](crate::Domain) can see. The named constants cover every
/// ZX297520V3 clock; their numbering is local to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockId(u32);

impl ClockId {
    /// 25 MHz fixed clock.
    pub const CLK25M: Self = Self(0);
    /// 26 MHz crystal oscillator.
    pub const CLK26M: Self = Self(1);
    /// 39 MHz fixed clock.
    pub const CLK39M: Self = Self(2);
    /// 50 MHz fixed clock.
    pub const CLK50M: Self = Self(3);
    /// 78 MHz fixed clock.
    pub const CLK78M: Self = Self(4);
    /// 100 MHz fixed clock.
    pub const CLK100M: Self = Self(5);
    /// 104 MHz fixed clock.
    pub const CLK104M: Self = Self(6);
    /// 156 MHz fixed clock.
    pub const CLK156M: Self = Self(7);
    /// 312 MHz fixed clock.
    pub const CLK312M: Self = Self(8);
    /// 624 MHz fixed clock.
    pub const CLK624M: Self = Self(9);

    /// AHB bus clock selector.
    pub const AHB_MUX: Self = Self(10);
    /// UART0 work clock selector.
    pub const UART0_WCLK_MUX: Self = Self(11);
    /// USB 24 MHz reference gate.
    pub const USB_24M: Self = Self(12);
    /// USB bus clock gate.
    pub const USB_AHB: Self = Self(13);
    /// UART0 work clock gate.
    pub const UART0_WCLK: Self = Self(14);
    /// UART0 register clock gate.
    pub const UART0_PCLK: Self = Self(15);

    /// CPU work clock selector.
    pub const CPU_WCLK: Self = Self(16);
    /// SD1 work clock selector.
    pub const SD1_WCLK_MUX: Self = Self(17);
    /// SD1 register clock gate.
    pub const SD1_PCLK: Self = Self(18);
    /// SD1 work clock gate.
    pub const SD1_WCLK: Self = Self(19);

    /// Use a raw identifier.
    ///
    /// Nothing checks that the identifier names a real clock; operations
    /// on an unknown identifier report [`NotFound`](crate::ClockError::NotFound).
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ClockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A bit field within one 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Byte offset of the register from the bank base.
    pub offset: u32,
    /// Position of the field's least significant bit.
    pub shift: u8,
    /// Number of bits in the field.
    pub width: u8,
}

impl Field {
    /// Define a `width` bit field at `shift` in the register at `offset`.
    pub const fn new(offset: u32, shift: u8, width: u8) -> Self {
        Self {
            offset,
            shift,
            width,
        }
    }

    /// A single bit field.
    pub const fn bit(offset: u32, shift: u8) -> Self {
        Self::new(offset, shift, 1)
    }

    /// The field's mask, already shifted into place.
    ///
    /// Bits that would fall outside of a 32-bit word are dropped.
    pub const fn mask(&self) -> u32 {
        let ones = if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        };
        if self.shift >= 32 {
            0
        } else {
            ones << self.shift
        }
    }

    /// How many distinct values the field can hold.
    pub const fn capacity(&self) -> u64 {
        match 1u64.checked_shl(self.width as u32) {
            Some(capacity) => capacity,
            None => u64::MAX,
        }
    }

    /// True if the field lies entirely within a 32-bit word.
    pub const fn fits_word(&self) -> bool {
        self.width > 0 && (self.shift as u32 + self.width as u32) <= 32
    }
}

/// What a clock node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    /// A constant frequency source. Never touches a register.
    Fixed { rate: u64 },
    /// Follows one of `parents`, chosen by the selector in `field`.
    ///
    /// The position within `parents` is the value the hardware expects,
    /// so the order must mirror the silicon's encoding.
    Mux {
        field: Field,
        parents: &'static [ClockId],
    },
    /// A single enable bit.
    Gate { offset: u32, shift: u8 },
}

/// Describes one node in a clock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDescriptor {
    id: ClockId,
    name: &'static str,
    kind: ClockKind,
}

/// Define a fixed rate clock.
pub const fn fixed(id: ClockId, name: &'static str, rate: u64) -> ClockDescriptor {
    ClockDescriptor {
        id,
        name,
        kind: ClockKind::Fixed { rate },
    }
}

/// Define a multiplexer.
pub const fn mux(
    id: ClockId,
    name: &'static str,
    offset: u32,
    shift: u8,
    width: u8,
    parents: &'static [ClockId],
) -> ClockDescriptor {
    ClockDescriptor {
        id,
        name,
        kind: ClockKind::Mux {
            field: Field::new(offset, shift, width),
            parents,
        },
    }
}

/// Define a gate.
pub const fn gate(id: ClockId, name: &'static str, offset: u32, shift: u8) -> ClockDescriptor {
    ClockDescriptor {
        id,
        name,
        kind: ClockKind::Gate { offset, shift },
    }
}

impl ClockDescriptor {
    /// Returns the clock's identifier.
    pub const fn id(&self) -> ClockId {
        self.id
    }

    /// The clock's name, as spelled in the reference manual.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns what the clock does.
    pub const fn kind(&self) -> &ClockKind {
        &self.kind
    }

    /// The register field this clock controls, if any.
    ///
    /// Gates report a one bit field.
    pub const fn field(&self) -> Option<Field> {
        match self.kind {
            ClockKind::Fixed { .. } => None,
            ClockKind::Mux { field, .. } => Some(field),
            ClockKind::Gate { offset, shift } => Some(Field::bit(offset, shift)),
        }
    }

    /// Byte offset of the controlling register. Zero for fixed clocks.
    pub const fn register_offset(&self) -> u32 {
        match self.field() {
            Some(field) => field.offset,
            None => 0,
        }
    }

    /// Position of the controlling field. Zero for fixed clocks.
    pub const fn bit_shift(&self) -> u8 {
        match self.field() {
            Some(field) => field.shift,
            None => 0,
        }
    }

    /// Selector width of a mux. Zero for everything else.
    pub const fn bit_width(&self) -> u8 {
        match self.kind {
            ClockKind::Mux { field, .. } => field.width,
            _ => 0,
        }
    }

    /// Mux parents in selector order. Empty for everything else.
    pub const fn parents(&self) -> &'static [ClockId] {
        match self.kind {
            ClockKind::Mux { parents, .. } => parents,
            _ => &[],
        }
    }

    /// The rate (Hz) of a fixed clock.
    pub const fn fixed_rate(&self) -> Option<u64> {
        match self.kind {
            ClockKind::Fixed { rate } => Some(rate),
            _ => None,
        }
    }

    /// A short label for the clock's kind.
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            ClockKind::Fixed { .. } => "fixed",
            ClockKind::Mux { .. } => "mux",
            ClockKind::Gate { .. } => "gate",
        }
    }
}
