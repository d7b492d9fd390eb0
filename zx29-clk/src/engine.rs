// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Bind a clock domain to its registers, and control its clocks.

use crate::bank::{read_field, write_field, AccessError, RegisterBank};
use crate::descriptor::{ClockDescriptor, ClockId, ClockKind, Field};
use crate::domain::Domain;

/// The domain couldn't be bound.
///
/// The controller is unusable; don't issue any other operations for it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no clock domain is selected by '{0}'")]
    UnknownDomain(String),
    #[error("clock domain '{0}' has no register base")]
    MissingBase(&'static str),
}

/// A control operation failed.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("clock {0} isn't in this domain")]
    NotFound(ClockId),
    #[error("clock {0} doesn't support this operation")]
    TypeMismatch(ClockId),
    #[error("clock {parent} isn't a parent of mux {clock}")]
    InvalidParent { clock: ClockId, parent: ClockId },
    #[error("clock {0} has no known rate")]
    NoRate(ClockId),
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Why a clock has no rate.
///
/// [`ClockHandle::get_rate`] collapses all of these into a zero rate.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("clock {0} isn't in this domain")]
    NotFound(ClockId),
    #[error("clock {0} is a gate, and has no rate of its own")]
    Gated(ClockId),
    #[error("mux {clock} selects {index}, which isn't a parent")]
    UnmappedSelector { clock: ClockId, index: u32 },
    #[error("the parents of clock {0} never reach a rate")]
    TooDeep(ClockId),
    #[error(transparent)]
    Access(#[from] AccessError),
}

/// A clock controller bound to its registers.
///
/// Create this once, at bring-up, with [`bind`]. Every operation takes
/// the register bank by exclusive reference; callers that share a bank
/// across threads must serialize operations on it.
#[derive(Debug, Clone, Copy)]
pub struct ClockHandle {
    base: u64,
    domain: &'static Domain,
}

/// Select the domain for `domain_key`, and bind it to `register_base`.
///
/// A missing or zero register base is a configuration error.
pub fn bind(domain_key: &str, register_base: Option<u64>) -> Result<ClockHandle, ConfigError> {
    let domain = Domain::lookup(domain_key)
        .ok_or_else(|| ConfigError::UnknownDomain(domain_key.into()))?;
    match register_base {
        Some(base) if base != 0 => Ok(ClockHandle { base, domain }),
        _ => Err(ConfigError::MissingBase(domain.key())),
    }
}

impl ClockHandle {
    /// Bind the domain at its well-known register base.
    pub fn bind_default(domain_key: &str) -> Result<ClockHandle, ConfigError> {
        let base = Domain::lookup(domain_key).and_then(Domain::default_base);
        bind(domain_key, base)
    }

    /// Returns the register base this handle was bound to.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Returns the domain selected at bind time.
    pub fn domain(&self) -> &'static Domain {
        self.domain
    }

    /// Find the descriptor for `id`.
    pub fn descriptor(&self, id: ClockId) -> Result<&'static ClockDescriptor, ClockError> {
        self.domain.find(id).ok_or(ClockError::NotFound(id))
    }

    /// Ungate a clock.
    ///
    /// Clocks that aren't gates are always on; enabling them succeeds
    /// without touching a register.
    pub fn enable(&self, id: ClockId, bank: &mut dyn RegisterBank) -> Result<(), ClockError> {
        self.gate(id, bank, true)
    }

    /// Gate a clock.
    ///
    /// Like [`enable`](Self::enable), this does nothing for clocks that
    /// aren't gates.
    pub fn disable(&self, id: ClockId, bank: &mut dyn RegisterBank) -> Result<(), ClockError> {
        self.gate(id, bank, false)
    }

    fn gate(&self, id: ClockId, bank: &mut dyn RegisterBank, on: bool) -> Result<(), ClockError> {
        if let ClockKind::Gate { offset, shift } = *self.descriptor(id)?.kind() {
            write_field(bank, self.base, Field::bit(offset, shift), u32::from(on))?;
        }
        Ok(())
    }

    /// Route `parent` to the mux `id`.
    ///
    /// The register is untouched if `parent` isn't one of the mux's parents.
    pub fn set_parent(
        &self,
        id: ClockId,
        parent: ClockId,
        bank: &mut dyn RegisterBank,
    ) -> Result<(), ClockError> {
        let ClockKind::Mux { field, parents } = *self.descriptor(id)?.kind() else {
            return Err(ClockError::TypeMismatch(id));
        };

        let index = parents
            .iter()
            .position(|candidate| *candidate == parent)
            .ok_or(ClockError::InvalidParent { clock: id, parent })?;

        // Tables never have more than a 32-bit selector's worth of parents.
        write_field(bank, self.base, field, index as u32)?;
        Ok(())
    }

    /// Returns the parent currently selected by the mux `id`.
    ///
    /// Returns `None` if the selector holds a reserved value.
    pub fn parent(
        &self,
        id: ClockId,
        bank: &mut dyn RegisterBank,
    ) -> Result<Option<ClockId>, ClockError> {
        let ClockKind::Mux { field, parents } = *self.descriptor(id)?.kind() else {
            return Err(ClockError::TypeMismatch(id));
        };

        let index = read_field(bank, self.base, field)?;
        Ok(parents.get(index as usize).copied())
    }

    /// Compute a clock's rate (Hz), explaining why there isn't one.
    ///
    /// Muxes are followed through their selected parents until a fixed
    /// clock is found. The walk gives up once it has taken more steps
    /// than the domain has clocks, so a cycle in the tables can't hang
    /// the caller.
    pub fn rate(&self, id: ClockId, bank: &mut dyn RegisterBank) -> Result<u64, RateError> {
        let mut current = id;
        // One visit per clock, plus one to resolve the last selected parent.
        for _ in 0..=self.domain.len() {
            let desc = self
                .domain
                .find(current)
                .ok_or(RateError::NotFound(current))?;

            match *desc.kind() {
                ClockKind::Fixed { rate } => return Ok(rate),
                ClockKind::Gate { .. } => return Err(RateError::Gated(current)),
                ClockKind::Mux { field, parents } => {
                    let index = read_field(bank, self.base, field)?;
                    current = *parents
                        .get(index as usize)
                        .ok_or(RateError::UnmappedSelector {
                            clock: current,
                            index,
                        })?;
                }
            }
        }
        Err(RateError::TooDeep(id))
    }

    /// Returns a clock's rate (Hz), or zero if it's unknown.
    ///
    /// Unknown clocks, gates, reserved selector values, and failed
    /// register reads all produce zero. Use [`rate`](Self::rate) to
    /// tell them apart.
    pub fn get_rate(&self, id: ClockId, bank: &mut dyn RegisterBank) -> u64 {
        self.rate(id, bank).unwrap_or(0)
    }

    /// Returns a clock's rate (Hz), treating zero as an error.
    ///
    /// Peripheral drivers that derive their timing from a clock can't
    /// work with an unknown rate.
    pub fn require_rate(
        &self,
        id: ClockId,
        bank: &mut dyn RegisterBank,
    ) -> Result<u64, ClockError> {
        match self.rate(id, bank) {
            Ok(0) => Err(ClockError::NoRate(id)),
            Ok(rate) => Ok(rate),
            // Names the clock that's missing, which may be a parent of `id`.
            Err(RateError::NotFound(missing)) => Err(ClockError::NotFound(missing)),
            Err(RateError::Access(err)) => Err(ClockError::Access(err)),
            Err(_) => Err(ClockError::NoRate(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::fake::FakeBank;
    use crate::descriptor::{fixed, mux};
    use crate::domain::{CATALOG, MATRIX_V1, TOP};

    const MATRIX_BASE: u64 = 0x0130_0000;

    fn matrix_v1() -> ClockHandle {
        bind("sanechips,zx297520v3-matrix-clk", Some(MATRIX_BASE)).unwrap()
    }

    fn top() -> ClockHandle {
        ClockHandle::bind_default("sanechips,zx297520v3-topcrm-clk").unwrap()
    }

    #[test]
    fn bind_selects_by_key() {
        let handle = matrix_v1();
        assert!(std::ptr::eq(handle.domain(), &MATRIX_V1));
        assert_eq!(handle.base(), MATRIX_BASE);

        let handle = top();
        assert!(std::ptr::eq(handle.domain(), &TOP));
        assert_eq!(handle.base(), 0x0013_b000);
    }

    #[test]
    fn bind_failures() {
        assert_eq!(
            bind("sanechips,zx297520v3-matrix-clk-v3", Some(MATRIX_BASE)).unwrap_err(),
            ConfigError::UnknownDomain("sanechips,zx297520v3-matrix-clk-v3".into())
        );
        assert_eq!(
            bind("sanechips,zx297520v3-matrix-clk", None).unwrap_err(),
            ConfigError::MissingBase("sanechips,zx297520v3-matrix-clk")
        );
        assert_eq!(
            bind("sanechips,zx297520v3-matrix-clk", Some(0)).unwrap_err(),
            ConfigError::MissingBase("sanechips,zx297520v3-matrix-clk")
        );
        assert!(matches!(
            ClockHandle::bind_default("sanechips,zx297520v3-matrix-clk-v2"),
            Err(ConfigError::MissingBase(_))
        ));
    }

    #[test]
    fn fixed_rates_ignore_registers() {
        for domain in CATALOG {
            let handle = bind(domain.key(), Some(MATRIX_BASE)).unwrap();
            let mut bank = FakeBank::default();
            for desc in domain.descriptors() {
                if let Some(rate) = desc.fixed_rate() {
                    assert_eq!(handle.get_rate(desc.id(), &mut bank), rate);
                }
            }
            assert_eq!(bank.reads, 0);
            assert_eq!(bank.writes, 0);
        }
    }

    #[test]
    fn cpu_wclk_follows_its_parent() {
        let handle = matrix_v1();
        let mut bank = FakeBank::default().with_word(MATRIX_BASE + 0x20, 0xffff_ff00);

        handle
            .set_parent(ClockId::CPU_WCLK, ClockId::CLK624M, &mut bank)
            .unwrap();
        assert_eq!(handle.get_rate(ClockId::CPU_WCLK, &mut bank), 624_000_000);
        assert_eq!(bank.word(MATRIX_BASE + 0x20), 0xffff_ff01);

        handle
            .set_parent(ClockId::CPU_WCLK, ClockId::CLK26M, &mut bank)
            .unwrap();
        assert_eq!(bank.word(MATRIX_BASE + 0x20) & 0b11, 0);
        assert_eq!(handle.get_rate(ClockId::CPU_WCLK, &mut bank), 26_000_000);
        assert_eq!(
            handle.parent(ClockId::CPU_WCLK, &mut bank).unwrap(),
            Some(ClockId::CLK26M)
        );
    }

    #[test]
    fn every_mux_parent_round_trips() {
        for domain in CATALOG {
            let handle = bind(domain.key(), Some(MATRIX_BASE)).unwrap();
            let mut bank = FakeBank::default();
            for desc in domain.descriptors() {
                for parent in desc.parents() {
                    handle.set_parent(desc.id(), *parent, &mut bank).unwrap();
                    assert_eq!(
                        handle.get_rate(desc.id(), &mut bank),
                        handle.get_rate(*parent, &mut bank),
                        "{} -> {}",
                        desc.name(),
                        parent
                    );
                }
            }
        }
    }

    #[test]
    fn invalid_parent_leaves_selector_alone() {
        let handle = matrix_v1();
        let address = MATRIX_BASE + 0x50;
        let mut bank = FakeBank::default().with_word(address, 0x0000_0230);

        let err = handle
            .set_parent(ClockId::SD1_WCLK_MUX, ClockId::CLK624M, &mut bank)
            .unwrap_err();
        assert!(matches!(
            err,
            ClockError::InvalidParent {
                clock: ClockId::SD1_WCLK_MUX,
                parent: ClockId::CLK624M
            }
        ));
        assert_eq!(bank.word(address), 0x0000_0230);
        assert_eq!(bank.writes, 0);
    }

    #[test]
    fn set_parent_needs_a_mux() {
        let handle = matrix_v1();
        let mut bank = FakeBank::default();

        for id in [ClockId::CLK26M, ClockId::SD1_PCLK] {
            assert!(matches!(
                handle.set_parent(id, ClockId::CLK26M, &mut bank),
                Err(ClockError::TypeMismatch(clock)) if clock == id
            ));
        }
        assert!(matches!(
            handle.set_parent(ClockId::AHB_MUX, ClockId::CLK26M, &mut bank),
            Err(ClockError::NotFound(ClockId::AHB_MUX))
        ));
        assert_eq!(bank.writes, 0);
    }

    #[test]
    fn gates_toggle_one_bit() {
        let handle = top();
        let address = 0x0013_b000 + 0x6c;
        let pattern = 0x5a5a_5a5a & !(1 << 4);
        let mut bank = FakeBank::default().with_word(address, pattern);

        handle.enable(ClockId::USB_AHB, &mut bank).unwrap();
        assert_eq!(bank.word(address), pattern | (1 << 4));

        handle.disable(ClockId::USB_AHB, &mut bank).unwrap();
        assert_eq!(bank.word(address), pattern);

        // The sibling gate in the same register.
        handle.disable(ClockId::USB_24M, &mut bank).unwrap();
        assert_eq!(bank.word(address), pattern & !(1 << 3));
    }

    #[test]
    fn gating_other_kinds_writes_nothing() {
        let handle = top();
        let mut bank = FakeBank::default();

        for id in [ClockId::CLK26M, ClockId::AHB_MUX, ClockId::UART0_WCLK_MUX] {
            handle.enable(id, &mut bank).unwrap();
            handle.disable(id, &mut bank).unwrap();
        }
        assert_eq!(bank.writes, 0);

        assert!(matches!(
            handle.enable(ClockId::CPU_WCLK, &mut bank),
            Err(ClockError::NotFound(ClockId::CPU_WCLK))
        ));
    }

    #[test]
    fn unmapped_selector_has_no_rate() {
        let handle = top();
        let address = 0x0013_b000 + 0x3c;
        // AHB_MUX has three parents in a two bit field.
        let mut bank = FakeBank::default().with_word(address, 0b11 << 4);

        assert_eq!(handle.get_rate(ClockId::AHB_MUX, &mut bank), 0);
        assert!(matches!(
            handle.rate(ClockId::AHB_MUX, &mut bank),
            Err(RateError::UnmappedSelector {
                clock: ClockId::AHB_MUX,
                index: 3
            })
        ));
        assert_eq!(handle.parent(ClockId::AHB_MUX, &mut bank).unwrap(), None);

        bank.set_word(address, 0b10 << 4);
        assert_eq!(handle.get_rate(ClockId::AHB_MUX, &mut bank), 78_000_000);
    }

    #[test]
    fn unknown_and_gated_rates_are_zero() {
        let handle = top();
        let mut bank = FakeBank::default().with_word(0x0013_b000 + 0x5c, u32::MAX);

        assert_eq!(handle.get_rate(ClockId::UART0_WCLK, &mut bank), 0);
        assert_eq!(handle.get_rate(ClockId::new(0xdead), &mut bank), 0);
        assert!(matches!(
            handle.rate(ClockId::UART0_WCLK, &mut bank),
            Err(RateError::Gated(ClockId::UART0_WCLK))
        ));
        assert!(matches!(
            handle.rate(ClockId::SD1_PCLK, &mut bank),
            Err(RateError::NotFound(ClockId::SD1_PCLK))
        ));
    }

    #[test]
    fn require_rate_rejects_zero() {
        let handle = top();
        let mut bank = FakeBank::default();

        assert_eq!(
            handle.require_rate(ClockId::UART0_WCLK_MUX, &mut bank).unwrap(),
            26_000_000
        );
        assert!(matches!(
            handle.require_rate(ClockId::UART0_PCLK, &mut bank),
            Err(ClockError::NoRate(ClockId::UART0_PCLK))
        ));
        assert!(matches!(
            handle.require_rate(ClockId::CPU_WCLK, &mut bank),
            Err(ClockError::NotFound(ClockId::CPU_WCLK))
        ));
    }

    #[test]
    fn overflowing_base_is_an_access_error() {
        let handle = bind("sanechips,zx297520v3-matrix-clk", Some(u64::MAX - 0x10)).unwrap();
        let mut bank = FakeBank::default();

        assert_eq!(handle.get_rate(ClockId::CPU_WCLK, &mut bank), 0);
        assert!(matches!(
            handle.rate(ClockId::CPU_WCLK, &mut bank),
            Err(RateError::Access(AccessError::AddressOverflow { offset: 0x20, .. }))
        ));
        assert!(matches!(
            handle.enable(ClockId::SD1_PCLK, &mut bank),
            Err(ClockError::Access(AccessError::AddressOverflow { .. }))
        ));
        assert!(matches!(
            handle.set_parent(ClockId::CPU_WCLK, ClockId::CLK26M, &mut bank),
            Err(ClockError::Access(AccessError::AddressOverflow { .. }))
        ));
        assert_eq!(bank.writes, 0);

        // The fixed clocks never touch a register.
        assert_eq!(handle.get_rate(ClockId::CLK26M, &mut bank), 26_000_000);
    }

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<ClockError>();
        assert_send_sync::<RateError>();
        assert_send_sync::<ConfigError>();
    }

    #[test]
    fn require_rate_names_the_missing_parent() {
        static PARTIAL: [ClockDescriptor; 1] = [mux(
            ClockId::CPU_WCLK,
            "CPU_WCLK",
            0x20,
            0,
            1,
            &[ClockId::CLK624M],
        )];
        static PARTIAL_DOMAIN: Domain = Domain::new("test", &[], &[&PARTIAL], None);

        let handle = ClockHandle {
            base: MATRIX_BASE,
            domain: &PARTIAL_DOMAIN,
        };
        let mut bank = FakeBank::default();

        assert!(matches!(
            handle.require_rate(ClockId::CPU_WCLK, &mut bank),
            Err(ClockError::NotFound(ClockId::CLK624M))
        ));
    }

    #[test]
    fn cycles_give_up() {
        static LOOP: [ClockDescriptor; 3] = [
            fixed(ClockId::CLK26M, "CLK26M", 26_000_000),
            mux(
                ClockId::AHB_MUX,
                "AHB_MUX",
                0x00,
                0,
                1,
                &[ClockId::UART0_WCLK_MUX, ClockId::CLK26M],
            ),
            mux(
                ClockId::UART0_WCLK_MUX,
                "UART0_WCLK_MUX",
                0x04,
                0,
                1,
                &[ClockId::AHB_MUX],
            ),
        ];
        static LOOPED: Domain = Domain::new("test", &LOOP, &[], None);

        let handle = ClockHandle {
            base: MATRIX_BASE,
            domain: &LOOPED,
        };
        let mut bank = FakeBank::default();

        assert!(matches!(
            handle.rate(ClockId::AHB_MUX, &mut bank),
            Err(RateError::TooDeep(ClockId::AHB_MUX))
        ));
        assert_eq!(handle.get_rate(ClockId::UART0_WCLK_MUX, &mut bank), 0);

        handle
            .set_parent(ClockId::AHB_MUX, ClockId::CLK26M, &mut bank)
            .unwrap();
        assert_eq!(handle.get_rate(ClockId::UART0_WCLK_MUX, &mut bank), 26_000_000);
    }
}
