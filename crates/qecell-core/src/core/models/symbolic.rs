use super::ids::ListenerId;
use super::listeners::{Listeners, Observable};
use crate::core::lattice::bravais::{Bravais, Param};
use crate::core::lattice::error::LatticeError;
use crate::core::lattice::params::LatticeParams;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of one scalar field of the symbolic lattice description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LatticeKey {
    Ibrav,
    /// `celldm(n)` for `n` in `1..=6`.
    Celldm(u8),
    A,
    B,
    C,
    CosAB,
    CosAC,
    CosBC,
}

impl LatticeKey {
    pub fn celldm(slot: usize) -> Option<Self> {
        (1..=6)
            .contains(&slot)
            .then_some(LatticeKey::Celldm(slot as u8))
    }

    /// The named-form key carrying `param`.
    pub fn named(param: Param) -> Self {
        match param {
            Param::A => LatticeKey::A,
            Param::B => LatticeKey::B,
            Param::C => LatticeKey::C,
            Param::CosAB => LatticeKey::CosAB,
            Param::CosAC => LatticeKey::CosAC,
            Param::CosBC => LatticeKey::CosBC,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown lattice parameter '{0}'")]
pub struct ParseLatticeKeyError(pub String);

impl FromStr for LatticeKey {
    type Err = ParseLatticeKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let key = match lowered.as_str() {
            "ibrav" => Some(LatticeKey::Ibrav),
            "a" => Some(LatticeKey::A),
            "b" => Some(LatticeKey::B),
            "c" => Some(LatticeKey::C),
            "cosab" => Some(LatticeKey::CosAB),
            "cosac" => Some(LatticeKey::CosAC),
            "cosbc" => Some(LatticeKey::CosBC),
            other => other
                .strip_prefix("celldm(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|slot| slot.trim().parse::<usize>().ok())
                .and_then(LatticeKey::celldm),
        };
        key.ok_or_else(|| ParseLatticeKeyError(s.to_string()))
    }
}

impl fmt::Display for LatticeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LatticeKey::Ibrav => f.write_str("ibrav"),
            LatticeKey::Celldm(slot) => write!(f, "celldm({slot})"),
            LatticeKey::A => f.write_str("A"),
            LatticeKey::B => f.write_str("B"),
            LatticeKey::C => f.write_str("C"),
            LatticeKey::CosAB => f.write_str("cosAB"),
            LatticeKey::CosAC => f.write_str("cosAC"),
            LatticeKey::CosBC => f.write_str("cosBC"),
        }
    }
}

/// Which of the two equivalent parameter spellings a description uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterForm {
    /// `celldm(1..6)`: `a` in Bohr, ratios `b/a`, `c/a`, and cosines.
    #[default]
    Celldm,
    /// `A, B, C, cosAB, cosAC, cosBC`: lengths in Angstrom and cosines.
    Named,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolicEvent {
    Changed {
        key: LatticeKey,
        previous: Option<f64>,
        current: Option<f64>,
    },
    /// Several values were replaced at once.
    Reset,
}

impl SymbolicEvent {
    /// Whether this event may have changed the value of `key`.
    pub fn touches(&self, key: LatticeKey) -> bool {
        match self {
            SymbolicEvent::Changed { key: changed, .. } => *changed == key,
            SymbolicEvent::Reset => true,
        }
    }
}

/// Named scalar lattice parameters with change notification.
///
/// Values are stored exactly as written (`celldm(1)` in Bohr, `A` in Angstrom);
/// [`SymbolicLatticeModel::lattice_params`] interprets them. When `celldm(1)` is
/// present the `celldm` form wins over the named form.
#[derive(Debug, Default)]
pub struct SymbolicLatticeModel {
    values: RefCell<BTreeMap<LatticeKey, f64>>,
    listeners: Listeners<SymbolicEvent>,
}

impl SymbolicLatticeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_value(&self, key: LatticeKey) -> Option<f64> {
        self.values.borrow().get(&key).copied()
    }

    /// Stores a value, notifying listeners only when it differs from the old one.
    pub fn set_value(&self, key: LatticeKey, value: f64) {
        let previous = self.values.borrow_mut().insert(key, value);
        if previous != Some(value) {
            self.listeners.notify(&SymbolicEvent::Changed {
                key,
                previous,
                current: Some(value),
            });
        }
    }

    pub fn clear_value(&self, key: LatticeKey) {
        let previous = self.values.borrow_mut().remove(&key);
        if previous.is_some() {
            self.listeners.notify(&SymbolicEvent::Changed {
                key,
                previous,
                current: None,
            });
        }
    }

    /// Replaces every value at once and sends a single [`SymbolicEvent::Reset`].
    pub fn assign(&self, values: impl IntoIterator<Item = (LatticeKey, f64)>) {
        let values: BTreeMap<LatticeKey, f64> = values.into_iter().collect();
        let previous = self.values.replace(values);
        if previous != *self.values.borrow() {
            self.listeners.notify(&SymbolicEvent::Reset);
        }
    }

    pub fn snapshot(&self) -> Vec<(LatticeKey, f64)> {
        self.values
            .borrow()
            .iter()
            .map(|(key, value)| (*key, *value))
            .collect()
    }

    /// Registers a listener that only hears about changes to `key`.
    pub fn add_listener(
        &self,
        key: LatticeKey,
        listener: impl Fn(&SymbolicEvent) + 'static,
    ) -> ListenerId {
        self.listeners.add(move |event: &SymbolicEvent| {
            if event.touches(key) {
                listener(event);
            }
        })
    }

    /// Interprets `ibrav`.
    ///
    /// # Errors
    ///
    /// [`LatticeError::MissingCode`] when unset, [`LatticeError::NonIntegralCode`] for
    /// a fractional value and [`LatticeError::UnsupportedCode`] outside the domain.
    pub fn bravais(&self) -> Result<Bravais, LatticeError> {
        let value = self
            .get_value(LatticeKey::Ibrav)
            .ok_or(LatticeError::MissingCode)?;
        if value.fract() != 0.0 || !value.is_finite() || value.abs() > i32::MAX as f64 {
            return Err(LatticeError::NonIntegralCode(value));
        }
        Bravais::try_from(value as i32)
    }

    /// The form the stored values are written in, if either is present.
    pub fn parameter_form(&self) -> Option<ParameterForm> {
        if self.get_value(LatticeKey::Celldm(1)).is_some() {
            Some(ParameterForm::Celldm)
        } else if self.get_value(LatticeKey::A).is_some() {
            Some(ParameterForm::Named)
        } else {
            None
        }
    }

    /// Reads the free parameters for `bravais` in Angstrom and cosines.
    pub fn lattice_params(&self, bravais: Bravais) -> LatticeParams {
        if self.parameter_form() == Some(ParameterForm::Celldm) {
            let mut celldm = [None; 6];
            for (slot, value) in celldm.iter_mut().enumerate() {
                *value = LatticeKey::celldm(slot + 1).and_then(|key| self.get_value(key));
            }
            return LatticeParams::from_celldm(bravais, &celldm);
        }
        let mut params = LatticeParams::new();
        for param in Param::ALL {
            params.set(param, self.get_value(LatticeKey::named(param)));
        }
        params
    }

    /// Rewrites the whole description as `ibrav` plus the parameters `bravais`
    /// requires, in the given form. `a` is always written when known since it
    /// also defines `alat`.
    pub fn write_params(&self, bravais: Bravais, params: &LatticeParams, form: ParameterForm) {
        let mut values = vec![(LatticeKey::Ibrav, f64::from(bravais.code()))];
        match form {
            ParameterForm::Celldm => {
                let celldm = params.to_celldm(bravais);
                values.extend(celldm.iter().enumerate().filter_map(|(slot, value)| {
                    Some((LatticeKey::celldm(slot + 1)?, (*value)?))
                }));
            }
            ParameterForm::Named => {
                if let Some(a) = params.a {
                    values.push((LatticeKey::A, a));
                }
                for &param in bravais.required().iter().filter(|p| **p != Param::A) {
                    if let Some(value) = params.get(param) {
                        values.push((LatticeKey::named(param), value));
                    }
                }
            }
        }
        self.assign(values);
    }
}

impl Observable for SymbolicLatticeModel {
    type Event = SymbolicEvent;

    fn listeners(&self) -> &Listeners<SymbolicEvent> {
        &self.listeners
    }
}
