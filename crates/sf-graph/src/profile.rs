//! Cross-section profiles and the interning cache.

use std::collections::HashMap;

use sf_core::{Area, Length, ProfileId, m2, mm};
use uom::si::length::millimeter;

/// Cross-section shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfileShape {
    Circular { diameter: Length },
    Rectangular { width: Length, height: Length },
}

impl ProfileShape {
    pub fn circular_mm(diameter_mm: f64) -> Self {
        ProfileShape::Circular {
            diameter: mm(diameter_mm),
        }
    }

    pub fn rectangular_mm(width_mm: f64, height_mm: f64) -> Self {
        ProfileShape::Rectangular {
            width: mm(width_mm),
            height: mm(height_mm),
        }
    }

    /// Full-flow cross-section area.
    pub fn total_area(&self) -> Area {
        match *self {
            ProfileShape::Circular { diameter } => {
                m2(std::f64::consts::PI * diameter.value.powi(2) / 4.0)
            }
            ProfileShape::Rectangular { width, height } => m2(width.value * height.value),
        }
    }

    /// Discretized key: identical shapes at millimetre resolution share a key.
    pub fn key(&self) -> ProfileKey {
        let q = |l: Length| l.get::<millimeter>().round() as i64;
        match *self {
            ProfileShape::Circular { diameter } => ProfileKey::Circular(q(diameter)),
            ProfileShape::Rectangular { width, height } => {
                ProfileKey::Rectangular(q(width), q(height))
            }
        }
    }
}

/// Interning key for [`ProfileCache`], dimensions in whole millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileKey {
    Circular(i64),
    Rectangular(i64, i64),
}

/// A shared cross-section.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: ProfileId,
    pub shape: ProfileShape,
    pub total_area: Area,
}

/// Interns profiles so edges with identical cross-sections share one entry.
#[derive(Debug, Default, Clone)]
pub struct ProfileCache {
    profiles: Vec<Profile>,
    by_key: HashMap<ProfileKey, ProfileId>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id of an existing profile with the same key, or add one.
    ///
    /// Returns `None` only when the id range is exhausted.
    pub fn intern(&mut self, shape: ProfileShape) -> Option<ProfileId> {
        let key = shape.key();
        if let Some(&id) = self.by_key.get(&key) {
            return Some(id);
        }
        let id = ProfileId::try_from_index(u32::try_from(self.profiles.len()).ok()?)?;
        self.profiles.push(Profile {
            id,
            shape,
            total_area: shape.total_area(),
        });
        self.by_key.insert(key, id);
        Some(id)
    }

    pub fn get(&self, id: ProfileId) -> Option<&Profile> {
        self.profiles.get(id.slot())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub(crate) fn into_profiles(self) -> Vec<Profile> {
        self.profiles
    }
}
