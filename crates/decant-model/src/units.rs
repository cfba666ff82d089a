//! Volumes and flow rates
//!
//! The canonical unit is the microlitre. `Volume` is a value type:
//! instructions and wells each own their copy, sharing is always by
//! value. Subtracting past zero is an error, never a silent negative.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// SI-prefixed litre units supported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VolumeUnit {
    Nanolitre,
    #[default]
    Microlitre,
    Millilitre,
    Litre,
}

impl VolumeUnit {
    /// Conversion factor from this unit to microlitres.
    pub fn to_microlitres(self) -> f64 {
        match self {
            VolumeUnit::Nanolitre => 1e-3,
            VolumeUnit::Microlitre => 1.0,
            VolumeUnit::Millilitre => 1e3,
            VolumeUnit::Litre => 1e6,
        }
    }

    /// Canonical symbol (`nl`, `ul`, `ml`, `l`).
    pub fn symbol(self) -> &'static str {
        match self {
            VolumeUnit::Nanolitre => "nl",
            VolumeUnit::Microlitre => "ul",
            VolumeUnit::Millilitre => "ml",
            VolumeUnit::Litre => "l",
        }
    }

    /// Parse a unit symbol. Accepts `µl` as an alias for `ul`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "nl" => Ok(VolumeUnit::Nanolitre),
            "ul" | "µl" | "μl" => Ok(VolumeUnit::Microlitre),
            "ml" => Ok(VolumeUnit::Millilitre),
            "l" => Ok(VolumeUnit::Litre),
            _ => Err(Error::InconsistentUnits(s.to_string())),
        }
    }
}

impl fmt::Display for VolumeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A liquid volume: value plus unit.
///
/// Comparison and equality are unit-independent (both sides reduce to
/// microlitres).
#[derive(Debug, Clone, Copy, Default)]
pub struct Volume {
    value: f64,
    unit: VolumeUnit,
}

/// Slack allowed before a subtraction counts as going negative.
const NEGATIVE_TOLERANCE: f64 = 1e-9;

impl Volume {
    pub const ZERO: Volume = Volume {
        value: 0.0,
        unit: VolumeUnit::Microlitre,
    };

    pub fn new(value: f64, unit: VolumeUnit) -> Self {
        Volume { value, unit }
    }

    /// Volume of `value` microlitres.
    pub fn microlitres(value: f64) -> Self {
        Volume::new(value, VolumeUnit::Microlitre)
    }

    pub fn value(self) -> f64 {
        self.value
    }

    pub fn unit(self) -> VolumeUnit {
        self.unit
    }

    /// Value expressed in microlitres.
    pub fn as_microlitres(self) -> f64 {
        self.value * self.unit.to_microlitres()
    }

    /// The same volume expressed in another unit.
    pub fn convert_to(self, unit: VolumeUnit) -> Volume {
        Volume::new(self.as_microlitres() / unit.to_microlitres(), unit)
    }

    /// Subtract, failing if the result would be negative.
    ///
    /// Results within floating-point tolerance of zero clamp to zero so
    /// that equal-split arithmetic cannot leave phantom residues.
    pub fn checked_sub(self, other: Volume) -> Result<Volume> {
        let diff = self.as_microlitres() - other.as_microlitres();
        if diff < -NEGATIVE_TOLERANCE {
            return Err(Error::NegativeVolume {
                have: self,
                take: other,
            });
        }
        Ok(Volume::microlitres(diff.max(0.0)).convert_to(self.unit))
    }

    pub fn is_zero(self) -> bool {
        self.as_microlitres().abs() <= NEGATIVE_TOLERANCE
    }
}

impl PartialEq for Volume {
    fn eq(&self, other: &Self) -> bool {
        self.as_microlitres() == other.as_microlitres()
    }
}

impl PartialOrd for Volume {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.as_microlitres().partial_cmp(&other.as_microlitres())
    }
}

impl Add for Volume {
    type Output = Volume;

    fn add(self, rhs: Volume) -> Volume {
        Volume::new(
            self.value + rhs.as_microlitres() / self.unit.to_microlitres(),
            self.unit,
        )
    }
}

impl AddAssign for Volume {
    fn add_assign(&mut self, rhs: Volume) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

impl FromStr for Volume {
    type Err = Error;

    /// Parses suffix forms such as `"10ul"`, `"0.5 ml"`, `"250nl"`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic() || *c == 'µ' || *c == 'μ')
            .map(|(i, _)| i)
            .ok_or_else(|| Error::InconsistentUnits(s.to_string()))?;
        let (number, unit) = s.split_at(split);
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| Error::InconsistentUnits(s.to_string()))?;
        Ok(Volume::new(value, VolumeUnit::parse(unit.trim())?))
    }
}

impl Serialize for Volume {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Volume {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct VolumeVisitor;

        impl<'v> de::Visitor<'v> for VolumeVisitor {
            type Value = Volume;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a volume string such as \"10ul\" or a number of microlitres")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Volume, E> {
                v.parse().map_err(de::Error::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Volume, E> {
                Ok(Volume::microlitres(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Volume, E> {
                Ok(Volume::microlitres(v as f64))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Volume, E> {
                Ok(Volume::microlitres(v as f64))
            }
        }

        deserializer.deserialize_any(VolumeVisitor)
    }
}

/// Pipetting flow rate in microlitres per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct FlowRate(pub f64);

impl fmt::Display for FlowRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ul/s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_round_trip() {
        let v = Volume::new(1.5, VolumeUnit::Millilitre);
        assert_eq!(v.as_microlitres(), 1500.0);
        let back = v.convert_to(VolumeUnit::Microlitre);
        assert_eq!(back.value(), 1500.0);
        assert_eq!(back, v);
    }

    #[test]
    fn test_parse_suffix_forms() {
        assert_eq!("10ul".parse::<Volume>().unwrap(), Volume::microlitres(10.0));
        assert_eq!("0.5ml".parse::<Volume>().unwrap(), Volume::microlitres(500.0));
        assert_eq!("250nl".parse::<Volume>().unwrap(), Volume::microlitres(0.25));
        assert_eq!("2 l".parse::<Volume>().unwrap(), Volume::microlitres(2e6));
        assert_eq!("3µl".parse::<Volume>().unwrap(), Volume::microlitres(3.0));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "10furlongs".parse::<Volume>(),
            Err(Error::InconsistentUnits(_))
        ));
        assert!(matches!(
            "ul".parse::<Volume>(),
            Err(Error::InconsistentUnits(_))
        ));
        assert!(matches!(
            "10".parse::<Volume>(),
            Err(Error::InconsistentUnits(_))
        ));
    }

    #[test]
    fn test_checked_sub() {
        let v = Volume::microlitres(10.0);
        assert_eq!(
            v.checked_sub(Volume::microlitres(4.0)).unwrap(),
            Volume::microlitres(6.0)
        );
        assert!(matches!(
            Volume::microlitres(1.0).checked_sub(Volume::microlitres(2.0)),
            Err(Error::NegativeVolume { .. })
        ));
    }

    #[test]
    fn test_checked_sub_clamps_float_noise() {
        let third = Volume::microlitres(10.0 / 3.0);
        let rest = Volume::microlitres(10.0)
            .checked_sub(third)
            .unwrap()
            .checked_sub(third)
            .unwrap()
            .checked_sub(third)
            .unwrap();
        assert!(rest.is_zero());
    }

    #[test]
    fn test_ordering_across_units() {
        assert!(Volume::new(1.0, VolumeUnit::Millilitre) > Volume::microlitres(999.0));
        assert!(Volume::new(500.0, VolumeUnit::Nanolitre) < Volume::microlitres(1.0));
    }

    #[test]
    fn test_add_keeps_lhs_unit() {
        let sum = Volume::new(1.0, VolumeUnit::Millilitre) + Volume::microlitres(500.0);
        assert_eq!(sum.unit(), VolumeUnit::Millilitre);
        assert_eq!(sum.as_microlitres(), 1500.0);
    }

    #[test]
    fn test_serde_forms() {
        let v: Volume = serde_json::from_str("\"12.5ul\"").unwrap();
        assert_eq!(v, Volume::microlitres(12.5));
        let v: Volume = serde_json::from_str("3.0").unwrap();
        assert_eq!(v, Volume::microlitres(3.0));
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"3ul\"");
    }
}
