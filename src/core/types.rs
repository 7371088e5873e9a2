use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ===== ENUMS =====

/// Direction of an optimization objective, spelled the way Xopt expects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectiveDirection {
    Minimize,
    Maximize,
}

impl ObjectiveDirection {
    /// True when `candidate` is strictly better than `incumbent`.
    pub fn improves(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Minimize => candidate < incumbent,
            Self::Maximize => candidate > incumbent,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
    GreaterThan,
    LessThan,
}

// ===== CORE DATA TYPES =====

/// Closed search interval of one variable. Serialized as `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl From<[f64; 2]> for Bounds {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(b: Bounds) -> Self {
        [b.min, b.max]
    }
}

/// Output constraint, serialized as `[GREATER_THAN, 9000]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(ConstraintKind, f64)", into = "(ConstraintKind, f64)")]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub threshold: f64,
}

impl Constraint {
    pub fn greater_than(threshold: f64) -> Self {
        Self {
            kind: ConstraintKind::GreaterThan,
            threshold,
        }
    }

    pub fn less_than(threshold: f64) -> Self {
        Self {
            kind: ConstraintKind::LessThan,
            threshold,
        }
    }

    pub fn is_satisfied(&self, achieved: f64) -> bool {
        match self.kind {
            ConstraintKind::GreaterThan => achieved > self.threshold,
            ConstraintKind::LessThan => achieved < self.threshold,
        }
    }
}

impl From<(ConstraintKind, f64)> for Constraint {
    fn from((kind, threshold): (ConstraintKind, f64)) -> Self {
        Self { kind, threshold }
    }
}

impl From<Constraint> for (ConstraintKind, f64) {
    fn from(c: Constraint) -> Self {
        (c.kind, c.threshold)
    }
}

/// Named simulator inputs in declaration order.
///
/// Order matters: the quadrupole currents are handed to the simulator as one
/// vector in the order they were declared.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector(IndexMap<String, f64>);

impl ParameterVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Values of every parameter whose name contains `marker`, in order.
    pub fn values_matching(&self, marker: &str) -> Vec<f64> {
        self.0
            .iter()
            .filter(|(name, _)| name.contains(marker))
            .map(|(_, v)| *v)
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ParameterVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Variables, objectives, constraints and constants of the search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocs {
    pub variables: IndexMap<String, Bounds>,
    #[serde(default)]
    pub objectives: IndexMap<String, ObjectiveDirection>,
    #[serde(default)]
    pub constraints: IndexMap<String, Constraint>,
    #[serde(default)]
    pub constants: IndexMap<String, f64>,
}

impl Vocs {
    /// Production beamline setup: solenoid, gun phase and charge plus six
    /// injector quadrupoles, with the laser pulse length held fixed.
    pub fn injector() -> Self {
        let mut variables = IndexMap::new();
        variables.insert("sol_var".to_string(), Bounds::new(0.1, 0.3));
        variables.insert("gun_phase".to_string(), Bounds::new(270.0, 310.0));
        variables.insert("bunch_charge".to_string(), Bounds::new(1.9e-9, 2.1e-9));
        for quad in INJECTOR_QUADS {
            variables.insert(quad.to_string(), Bounds::new(-0.3, 0.3));
        }

        let mut objectives = IndexMap::new();
        objectives.insert("emit_mean".to_string(), ObjectiveDirection::Minimize);
        objectives.insert("bunch_length".to_string(), ObjectiveDirection::Minimize);

        let mut constraints = IndexMap::new();
        constraints.insert("num_particles".to_string(), Constraint::greater_than(9000.0));

        let mut constants = IndexMap::new();
        constants.insert("laser_pulse_length".to_string(), 4.4999e-12);

        Self {
            variables,
            objectives,
            constraints,
            constants,
        }
    }

    /// Copy `point` and add every constant it does not already carry.
    pub fn with_constants(&self, point: &ParameterVector) -> ParameterVector {
        let mut full = point.clone();
        for (name, &value) in &self.constants {
            if !full.contains(name) {
                full.insert(name.clone(), value);
            }
        }
        full
    }
}

pub const INJECTOR_QUADS: [&str; 6] = [
    "QUAD:IN10:361:BCTRL",
    "QUAD:IN10:371:BCTRL",
    "QUAD:IN10:425:BCTRL",
    "QUAD:IN10:441:BCTRL",
    "QUAD:IN10:511:BCTRL",
    "QUAD:IN10:525:BCTRL",
];
