// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Solar ephemeris.
//!
//! The low-accuracy solar coordinates of Meeus, *Astronomical Algorithms*
//! (2nd ed.), chapter 25, and the physical ephemeris of chapter 29. Angles
//! are good to about 0.01 degrees over the life of the instrument, which is
//! far better than a pixel at the edge of the field.

#[cfg(test)]
mod tests;

use hifitime::Epoch;

use crate::constants::SOLAR_SEMI_DIAMETER_1AU;

/// The Julian date of J2000.0.
const J2000: f64 = 2_451_545.0;

/// Inclination of the solar equator to the ecliptic \[degrees\].
const SOLAR_INCLINATION: f64 = 7.25;

/// The geometry of the Sun as seen from Earth at some instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunAngles {
    /// Position angle of the northern extremity of the solar rotation axis,
    /// east of celestial north \[degrees\].
    pub p_angle: f64,

    /// Heliographic latitude of the centre of the disk \[degrees\].
    pub b0: f64,

    /// Apparent semi-diameter \[arcseconds\].
    pub semi_diameter: f64,

    /// Earth-Sun distance \[AU\].
    pub distance: f64,

    /// Apparent right ascension \[degrees\].
    pub right_ascension: f64,

    /// Apparent declination \[degrees\].
    pub declination: f64,
}

/// Something that knows where the Sun is.
pub trait SolarEphemeris: Sync {
    fn sun(&self, epoch: Epoch) -> SunAngles;
}

/// Solar angles computed from the time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputedEphemeris;

impl SolarEphemeris for ComputedEphemeris {
    fn sun(&self, epoch: Epoch) -> SunAngles {
        sun_angles(epoch.to_jde_utc_days())
    }
}

/// The same solar angles for every time. Useful when the angles have already
/// been determined elsewhere.
#[derive(Debug, Clone, Copy)]
pub struct FixedEphemeris(pub SunAngles);

impl SolarEphemeris for FixedEphemeris {
    fn sun(&self, _epoch: Epoch) -> SunAngles {
        self.0
    }
}

fn sin_deg(x: f64) -> f64 {
    x.to_radians().sin()
}

fn cos_deg(x: f64) -> f64 {
    x.to_radians().cos()
}

/// The solar angles at Julian date `jd`.
pub fn sun_angles(jd: f64) -> SunAngles {
    let t = (jd - J2000) / 36525.0;

    // Geometric mean longitude and mean anomaly.
    let l0 = (280.46646 + 36000.76983 * t + 0.0003032 * t * t).rem_euclid(360.0);
    let m = (357.52911 + 35999.05029 * t - 0.0001537 * t * t).rem_euclid(360.0);
    let e = 0.016708634 - 0.000042037 * t - 0.0000001267 * t * t;

    // Equation of the centre.
    let c = (1.914602 - 0.004817 * t - 0.000014 * t * t) * sin_deg(m)
        + (0.019993 - 0.000101 * t) * sin_deg(2.0 * m)
        + 0.000289 * sin_deg(3.0 * m);
    let true_longitude = l0 + c;
    let true_anomaly = m + c;
    let distance = 1.000001018 * (1.0 - e * e) / (1.0 + e * cos_deg(true_anomaly));

    // Apparent longitude, corrected for nutation and aberration.
    let omega = 125.04 - 1934.136 * t;
    let lambda = true_longitude - 0.00569 - 0.00478 * sin_deg(omega);

    let epsilon0_arcsec = 21.448 - 46.8150 * t - 0.00059 * t * t + 0.001813 * t * t * t;
    let epsilon0 = 23.0 + (26.0 + epsilon0_arcsec / 60.0) / 60.0;
    let epsilon = epsilon0 + 0.00256 * cos_deg(omega);

    let right_ascension = (cos_deg(epsilon) * sin_deg(lambda))
        .atan2(cos_deg(lambda))
        .to_degrees()
        .rem_euclid(360.0);
    let declination = (sin_deg(epsilon) * sin_deg(lambda)).asin().to_degrees();

    // Physical ephemeris.
    let k = 73.6667 + 1.3958333 * (jd - 2_396_758.0) / 36525.0;
    let x = (-cos_deg(lambda) * epsilon.to_radians().tan()).atan();
    let y = (-cos_deg(lambda - k) * SOLAR_INCLINATION.to_radians().tan()).atan();
    let p_angle = (x + y).to_degrees();
    let b0 = (sin_deg(lambda - k) * sin_deg(SOLAR_INCLINATION))
        .asin()
        .to_degrees();

    SunAngles {
        p_angle,
        b0,
        semi_diameter: SOLAR_SEMI_DIAMETER_1AU / distance,
        distance,
        right_ascension,
        declination,
    }
}
