//! Byte budget bookkeeping shared by [`BufReader`](crate::io::BufReader) and
//! [`BufWriter`](crate::io::BufWriter).
//!
//! A budget is the number of bytes an adapter may still move across its channel. Readers use it to
//! detect truncated input before copying anything, writers to reject output that would overrun a
//! declared size.

use core::fmt;

/// Construction-time constraint settings of an adapter.
///
/// A budget may only be supplied together with the constraint flag. A constrained configuration
/// without an explicit budget starts out unbounded (`usize::MAX`) and is meant to be raised or drained
/// as the caller learns more about the stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BudgetConfig {
    constrained: bool,
    budget: Option<usize>,
}

impl BudgetConfig {
    /// No constraint, no budget.
    pub const fn new() -> Self {
        Self {
            constrained: false,
            budget: None,
        }
    }

    /// Constraint enabled with `budget` bytes available.
    pub const fn constrained(budget: usize) -> Self {
        Self {
            constrained: true,
            budget: Some(budget),
        }
    }

    pub fn with_constraint(mut self, value: bool) -> Self {
        self.constrained = value;
        self
    }

    pub fn with_budget(mut self, value: impl Into<Option<usize>>) -> Self {
        self.budget = value.into();
        self
    }

    pub fn is_constrained(&self) -> bool {
        self.constrained
    }

    /// Validate the settings, returning the budget to enforce, if any.
    pub(crate) fn build(self) -> Result<Option<Budget>, ConfigError> {
        match (self.constrained, self.budget) {
            (false, None) => Ok(None),
            (false, Some(_)) => Err(ConfigError::BudgetWithoutConstraint),
            (true, budget) => Ok(Some(Budget::new(budget.unwrap_or(usize::MAX)))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Budget {
    remaining: usize,
}

impl Budget {
    pub(crate) const fn new(remaining: usize) -> Self {
        Self { remaining }
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    /// Whether `amt` bytes can be served given `buffered` bytes already held outside the budget.
    #[inline]
    pub(crate) fn covers(&self, buffered: usize, amt: usize) -> bool {
        buffered.saturating_add(self.remaining) >= amt
    }

    /// Charge `amt` transferred bytes against the budget.
    pub(crate) fn take(&mut self, amt: usize) -> Result<(), Underflow> {
        self.remaining = self.remaining.checked_sub(amt).ok_or(Underflow {
            requested: amt,
            remaining: self.remaining,
        })?;
        Ok(())
    }

    pub(crate) fn increase(&mut self, amt: usize) {
        self.remaining = self.remaining.saturating_add(amt);
        tracing::debug!(amt, remaining = self.remaining, "byte budget raised");
    }
}

/// Invalid adapter configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A budget was given while the constraint is disabled.
    BudgetWithoutConstraint,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetWithoutConstraint => {
                write!(f, "a byte budget must not be set when the constraint is disabled")
            }
        }
    }
}

impl core::error::Error for ConfigError {}

/// More bytes were charged than the budget had left. Only reachable through a bookkeeping bug.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Underflow {
    pub requested: usize,
    pub remaining: usize,
}

impl fmt::Display for Underflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "byte budget underflow: charged {} with {} remaining",
            self.requested, self.remaining
        )
    }
}
