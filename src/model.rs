use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Deref};

/// Values sampled at uniform positions along a tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    vals: Vec<f64>,
}

impl Profile {
    pub fn new(vals: Vec<f64>) -> Result<Self> {
        if vals.is_empty() {
            bail!("profile must have at least one value");
        }
        Ok(Self { vals })
    }

    pub fn mean(&self) -> f64 {
        crate::numeric::mean(&self.vals)
    }
}

impl Deref for Profile {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.vals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    Short,
    Medium,
    Long,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Short, Region::Medium, Region::Long];

    pub fn from_length(length_mm: f64) -> Self {
        if length_mm < 20.0 {
            Region::Short
        } else if length_mm < 40.0 {
            Region::Medium
        } else {
            Region::Long
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Region::Short => "short",
            Region::Medium => "medium",
            Region::Long => "long",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// V-number, transmission and optical-path-capacity profiles of a tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpticalProfiles {
    pub v: Profile,
    pub t: Profile,
    pub opc: Profile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tract {
    pub id: String,
    pub batch: usize,
    pub length_mm: f64,
    pub region: Region,

    /// Profiles from the optical model.
    pub optical: OpticalProfiles,
    /// Textured profiles with the same means as `optical`.
    pub textured: OpticalProfiles,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_profile_is_rejected() {
        assert!(Profile::new(Vec::new()).is_err());
        assert_eq!(Profile::new(vec![1.0, 3.0]).unwrap().mean(), 2.0);
    }

    #[test]
    fn region_boundaries() {
        assert_eq!(Region::from_length(19.99), Region::Short);
        assert_eq!(Region::from_length(20.0), Region::Medium);
        assert_eq!(Region::from_length(40.0), Region::Long);
        assert_eq!(Region::Medium.to_string(), "medium");
    }
}
