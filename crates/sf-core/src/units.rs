// sf-core/src/units.rs

use uom::si::f64::{
    Area as UomArea, Length as UomLength, MassDensity as UomMassDensity, Velocity as UomVelocity,
    VolumeRate as UomVolumeRate,
};

// Public canonical unit types (SI, f64)
pub type Area = UomArea;
pub type Length = UomLength;
pub type Concentration = UomMassDensity;
pub type Velocity = UomVelocity;
pub type VolumeRate = UomVolumeRate;

/// Litres per second to cubic metres per second.
pub const LPS_TO_M3PS: f64 = 0.001;

/// Milligrams per litre to kilograms per cubic metre.
pub const MG_PER_L_TO_KG_PER_M3: f64 = 0.001;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn mm(v: f64) -> Length {
    use uom::si::length::millimeter;
    Length::new::<millimeter>(v)
}

#[inline]
pub fn m2(v: f64) -> Area {
    use uom::si::area::square_meter;
    Area::new::<square_meter>(v)
}

#[inline]
pub fn mps(v: f64) -> Velocity {
    use uom::si::velocity::meter_per_second;
    Velocity::new::<meter_per_second>(v)
}

#[inline]
pub fn m3ps(v: f64) -> VolumeRate {
    use uom::si::volume_rate::cubic_meter_per_second;
    VolumeRate::new::<cubic_meter_per_second>(v)
}

/// Raw store value in mg/l to kg/m³.
#[inline]
pub fn mg_per_l_to_kg_per_m3(v: f64) -> f64 {
    v * MG_PER_L_TO_KG_PER_M3
}

/// Mean velocity of a volume flow through a cross-section.
///
/// Returns zero velocity for a non-positive area.
pub fn mean_velocity(q: VolumeRate, area: Area) -> Velocity {
    if area.value <= 0.0 {
        return mps(0.0);
    }
    q / area
}
