//! Parameter grid generation for sweeps.
//!
//! Each swept parameter is declared as an inclusive numeric range. The grid
//! is the Cartesian product of the per-parameter sequences, in declaration
//! order, so the first declared parameter varies slowest.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SweepError;

/// Slack allowed past a range's end to absorb floating-point drift.
pub const GRID_EPSILON: f64 = 1e-9;

/// Largest index at which `f64` still counts every integer.
const MAX_EXACT_INDEX: f64 = 9_007_199_254_740_992.0;

/// Decimal places kept for float parameters.
const FLOAT_DECIMALS: i32 = 6;

/// Numeric kind of a swept parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Values are truncated to integers.
    Int,
    /// Values are rounded to six decimals.
    #[default]
    Float,
}

/// Inclusive range specification for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRangeSpec {
    /// First value.
    pub start: f64,
    /// Last value (inclusive, within [`GRID_EPSILON`]).
    pub end: f64,
    /// Increment between values.
    pub step: f64,
    /// Integer or float parameter.
    #[serde(rename = "type", default)]
    pub kind: ParamKind,
}

impl ParamRangeSpec {
    /// Create an integer range.
    #[must_use]
    pub const fn int(start: i64, end: i64, step: i64) -> Self {
        Self {
            start: start as f64,
            end: end as f64,
            step: step as f64,
            kind: ParamKind::Int,
        }
    }

    /// Create a float range.
    #[must_use]
    pub const fn float(start: f64, end: f64, step: f64) -> Self {
        Self {
            start,
            end,
            step,
            kind: ParamKind::Float,
        }
    }

    /// Check the range is usable.
    pub fn validate(&self, name: &str) -> Result<(), SweepError> {
        let invalid = |message: &str| SweepError::InvalidRange {
            name: name.to_string(),
            message: message.to_string(),
        };

        if !self.start.is_finite() || !self.end.is_finite() || !self.step.is_finite() {
            return Err(invalid("start, end and step must be finite"));
        }
        if self.step <= 0.0 {
            return Err(invalid("step must be positive"));
        }
        if self.count().is_none() {
            return Err(invalid("range has too many values"));
        }
        Ok(())
    }

    /// Number of values in the range, computed without expanding it.
    ///
    /// Zero when `start > end` or the step is not positive. `None` when the
    /// count is too large to index exactly.
    #[must_use]
    pub fn count(&self) -> Option<usize> {
        if !(self.step > 0.0) || !self.start.is_finite() || !self.end.is_finite() {
            return Some(0);
        }
        let limit = self.end + GRID_EPSILON;
        if self.start > limit {
            return Some(0);
        }

        let span = ((limit - self.start) / self.step).floor();
        if span.is_nan() || span >= MAX_EXACT_INDEX {
            return None;
        }
        let mut last = span as u64;
        // Division rounding can be one index off the `value <= limit` rule.
        if last > 0 && self.raw(last) > limit {
            last -= 1;
        }
        if self.raw(last + 1) <= limit {
            last += 1;
        }
        usize::try_from(last).ok()?.checked_add(1)
    }

    /// Expand the range into its ordered value sequence.
    #[must_use]
    pub fn values(&self) -> Vec<ParamValue> {
        (0..self.count().unwrap_or(0))
            .map(|index| self.value_at(index))
            .collect()
    }

    fn value_at(&self, index: usize) -> ParamValue {
        self.kind.cast(self.raw(index as u64))
    }

    fn raw(&self, index: u64) -> f64 {
        (index as f64).mul_add(self.step, self.start)
    }
}

impl ParamKind {
    fn cast(self, raw: f64) -> ParamValue {
        match self {
            Self::Int => {
                let nearest = raw.round();
                // Snap values that only miss an integer by drift, truncate the rest.
                let value = if (raw - nearest).abs() < GRID_EPSILON {
                    nearest
                } else {
                    raw.trunc()
                };
                ParamValue::Int(value as i64)
            }
            Self::Float => {
                let scale = 10f64.powi(FLOAT_DECIMALS);
                ParamValue::Float((raw * scale).round() / scale)
            }
        }
    }
}

/// Concrete value of a parameter in one combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer parameter.
    Int(i64),
    /// Float parameter.
    Float(f64),
}

impl ParamValue {
    /// Get as float.
    #[must_use]
    pub const fn as_float(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    /// Get as integer, truncating floats.
    #[must_use]
    pub const fn as_int(&self) -> i64 {
        match self {
            Self::Int(v) => *v,
            Self::Float(v) => *v as i64,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Named parameter ranges, kept in declaration order.
///
/// Serializes as a JSON/YAML map; deserialization preserves the order in
/// which the map keys appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamRanges {
    entries: Vec<(String, ParamRangeSpec)>,
}

impl ParamRanges {
    /// Create an empty set of ranges.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a range, replacing an earlier one with the same name in place.
    #[must_use]
    pub fn with(mut self, name: &str, spec: ParamRangeSpec) -> Self {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| n == name) {
            slot.1 = spec;
        } else {
            self.entries.push((name.to_string(), spec));
        }
        self
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Iterate over `(name, spec)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamRangeSpec)> {
        self.entries.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Number of swept parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no parameter is swept.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every range.
    pub fn validate(&self) -> Result<(), SweepError> {
        self.entries
            .iter()
            .try_for_each(|(name, spec)| spec.validate(name))
    }
}

impl Serialize for ParamRanges {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_ordered(&self.entries, serializer)
    }
}

impl<'de> Deserialize<'de> for ParamRanges {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            entries: deserialize_ordered(deserializer)?,
        })
    }
}

/// One grid point: a value for every swept parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamCombination {
    values: Vec<(String, ParamValue)>,
}

impl ParamCombination {
    /// Build a combination from `(name, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, ParamValue)>,
        S: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }

    /// Look up a parameter value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    }

    /// Iterate over `(name, value)` pairs in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Number of parameters set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for ParamCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.values {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for ParamCombination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_ordered(&self.values, serializer)
    }
}

impl<'de> Deserialize<'de> for ParamCombination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self {
            values: deserialize_ordered(deserializer)?,
        })
    }
}

/// The Cartesian product of a set of ranges, indexed without being expanded.
///
/// Index 0 is the first value of every range; the last declared parameter
/// varies fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    axes: Vec<(String, ParamRangeSpec, usize)>,
    len: usize,
}

impl Grid {
    /// Number of grid points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether some range has no values.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Combination at `index`, or `None` past the end.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ParamCombination> {
        if index >= self.len {
            return None;
        }

        let mut remaining = index;
        let mut values = Vec::with_capacity(self.axes.len());
        for (name, spec, count) in self.axes.iter().rev() {
            values.push((name.clone(), spec.value_at(remaining % count)));
            remaining /= count;
        }
        values.reverse();
        Some(ParamCombination { values })
    }

    /// Iterate over every combination in grid order.
    pub fn iter(&self) -> impl Iterator<Item = ParamCombination> + '_ {
        (0..self.len).filter_map(|index| self.get(index))
    }
}

/// Validate the ranges and build their grid.
///
/// A range with no values empties the whole grid. With no ranges at all the
/// grid holds a single empty combination, i.e. one run with the workspace's
/// own parameters. Fails when a range is invalid or the grid size does not
/// fit in `usize`.
pub fn generate_grid(ranges: &ParamRanges) -> Result<Grid, SweepError> {
    ranges.validate()?;

    let mut len: usize = 1;
    let mut axes = Vec::with_capacity(ranges.len());
    for (name, spec) in ranges.iter() {
        let count = spec.count().unwrap_or(0);
        len = len
            .checked_mul(count)
            .ok_or_else(|| SweepError::InvalidRange {
                name: name.to_string(),
                message: "grid size overflows".to_string(),
            })?;
        axes.push((name.to_string(), *spec, count));
    }

    Ok(Grid { axes, len })
}

fn serialize_ordered<S, V>(entries: &[(String, V)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (name, value) in entries {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

fn deserialize_ordered<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map keyed by parameter name")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries: Vec<(String, V)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, value)) = map.next_entry::<String, V>()? {
                if entries.iter().any(|(existing, _)| *existing == name) {
                    return Err(de::Error::custom(format!("duplicate parameter '{name}'")));
                }
                entries.push((name, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}
