//! Parameter definition and constraint flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Advisory constraints attached to a parameter.
///
/// The solver only enforces these when
/// [`LmConfig::project_constraints`](crate::lm::LmConfig::project_constraints)
/// is enabled. Otherwise they are metadata for callers, e.g. to clamp user input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraints(u8);

impl Constraints {
    /// No constraint.
    pub const NONE: Self = Self(0);
    /// The value must be an integer.
    pub const INTEGER: Self = Self(1);
    /// The value must be strictly positive.
    pub const POSITIVE: Self = Self(1 << 1);
    /// The value must be zero or positive.
    pub const NON_NEGATIVE: Self = Self(1 << 2);

    /// Returns true if every flag in `other` is also set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no flag is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Projects `value` onto the constrained set.
    ///
    /// Rounding is applied before the sign constraints, so an integer positive
    /// parameter never rounds back down to zero.
    pub fn clamp(self, value: f64) -> f64 {
        let mut value = value;
        if self.contains(Self::INTEGER) {
            value = value.round();
        }
        if self.contains(Self::POSITIVE) && value <= 0.0 {
            value = if self.contains(Self::INTEGER) {
                1.0
            } else {
                f64::MIN_POSITIVE
            };
        } else if self.contains(Self::NON_NEGATIVE) && value < 0.0 {
            value = 0.0;
        }
        value
    }
}

impl BitOr for Constraints {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Constraints {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(Self::INTEGER) {
            names.push("integer");
        }
        if self.contains(Self::POSITIVE) {
            names.push("positive");
        }
        if self.contains(Self::NON_NEGATIVE) {
            names.push("non-negative");
        }
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// One scalar parameter of a fitting model.
///
/// Parameters are immutable metadata. The values being optimized live in a
/// plain `Vec<f64>` that is index-aligned with the model's parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name of the parameter
    name: String,

    /// Constraint flags
    #[serde(default)]
    constraints: Constraints,

    /// Value used as a starting guess when the caller has none
    initial_value: f64,
}

impl Parameter {
    /// Create a new unconstrained parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use decayfit::parameters::Parameter;
    ///
    /// let param = Parameter::new("amplitude", 10.0);
    /// assert_eq!(param.name(), "amplitude");
    /// assert_eq!(param.initial_value(), 10.0);
    /// assert!(param.constraints().is_empty());
    /// ```
    pub fn new(name: &str, initial_value: f64) -> Self {
        Self {
            name: name.to_string(),
            constraints: Constraints::NONE,
            initial_value,
        }
    }

    /// Create a new parameter with the given constraint flags.
    ///
    /// The initial value is projected onto the constrained set.
    pub fn with_constraints(name: &str, initial_value: f64, constraints: Constraints) -> Self {
        Self {
            name: name.to_string(),
            constraints,
            initial_value: constraints.clamp(initial_value),
        }
    }

    /// Get the name of the parameter
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the constraint flags of the parameter
    pub fn constraints(&self) -> Constraints {
        self.constraints
    }

    /// Get the initial value of the parameter
    pub fn initial_value(&self) -> f64 {
        self.initial_value
    }
}

/// Collects the initial values of a parameter list into a parameter vector.
pub fn initial_values(parameters: &[Parameter]) -> Vec<f64> {
    parameters.iter().map(Parameter::initial_value).collect()
}
