// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use approx::assert_abs_diff_eq;

use super::*;

#[test]
fn test_meeus_example() {
    // Meeus examples 25.a and 29.a: 1992 October 13, 0h.
    let epoch = Epoch::from_gregorian_utc_at_midnight(1992, 10, 13);
    let sun = ComputedEphemeris.sun(epoch);
    assert_abs_diff_eq!(sun.p_angle, 26.27, epsilon = 0.05);
    assert_abs_diff_eq!(sun.b0, 5.99, epsilon = 0.05);
    assert_abs_diff_eq!(sun.distance, 0.99766, epsilon = 1e-4);
    assert_abs_diff_eq!(sun.right_ascension, 198.38083, epsilon = 0.01);
    assert_abs_diff_eq!(sun.declination, -7.78507, epsilon = 0.01);
}

#[test]
fn test_p_angle_extremes() {
    // P is most negative in early April and most positive in early October.
    let april = ComputedEphemeris.sun(Epoch::from_gregorian_utc_at_midnight(2014, 4, 6));
    let october = ComputedEphemeris.sun(Epoch::from_gregorian_utc_at_midnight(2014, 10, 10));
    assert_abs_diff_eq!(april.p_angle, -26.3, epsilon = 0.2);
    assert_abs_diff_eq!(october.p_angle, 26.3, epsilon = 0.2);
}

#[test]
fn test_semi_diameter_follows_distance() {
    let perihelion = ComputedEphemeris.sun(Epoch::from_gregorian_utc_at_midnight(2015, 1, 4));
    let aphelion = ComputedEphemeris.sun(Epoch::from_gregorian_utc_at_midnight(2015, 7, 6));
    assert_abs_diff_eq!(perihelion.semi_diameter, 975.9, epsilon = 0.5);
    assert_abs_diff_eq!(aphelion.semi_diameter, 943.9, epsilon = 0.5);
}

#[test]
fn test_fixed_ephemeris() {
    let angles = sun_angles(J2000);
    let fixed = FixedEphemeris(angles);
    assert_eq!(
        fixed.sun(Epoch::from_gregorian_utc_at_midnight(2020, 1, 1)),
        angles
    );
}
