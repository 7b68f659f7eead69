// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Instrument filter transmission profiles.

use std::f64::consts::LN_2;

use crate::constants::PI;

/// A source of filter transmission curves.
pub trait FilterProfiles: Sync {
    /// The on-band and off-band transmission for the filter tuned to
    /// `tuning` \[nm\], sampled at the wavelengths `lambda` \[nm\]. Each
    /// profile is normalised so its samples sum to one.
    fn profiles(&self, lambda: &[f64], tuning: f64) -> (Vec<f64>, Vec<f64>);
}

/// An idealised Lyot birefringent filter. Each stage transmits `cos²` of the
/// phase difference across its plate; the thickest plate (shortest period)
/// sets the bandpass and each further stage has twice the period of the one
/// before. The off-band position has the thickest plate's retardance shifted
/// by half a wave, so it transmits `sin²` in that stage, putting the
/// bandpass either side of the tuning wavelength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LyotFilter {
    /// The full width at half maximum of the on-band bandpass \[nm\].
    pub fwhm: f64,

    /// The number of birefringent stages.
    pub num_stages: usize,

    /// The full width at half maximum of a Gaussian pre-filter, if any \[nm\].
    pub prefilter_fwhm: Option<f64>,
}

impl Default for LyotFilter {
    fn default() -> Self {
        Self {
            fwhm: 0.137,
            num_stages: 4,
            prefilter_fwhm: None,
        }
    }
}

impl LyotFilter {
    /// The transmission period of the thickest stage \[nm\]. `cos²` with
    /// period `p` has a FWHM of `p / 2`, which further stages only narrow
    /// slightly.
    fn finest_period(&self) -> f64 {
        2.0 * self.fwhm
    }

    /// On-band and off-band transmission at an offset `dl` \[nm\] from the
    /// tuning wavelength (not normalised).
    fn transmission(&self, dl: f64) -> (f64, f64) {
        let p0 = self.finest_period();
        let phase0 = PI * dl / p0;
        let mut rest = 1.0;
        let mut period = p0;
        for _ in 1..self.num_stages {
            period *= 2.0;
            rest *= (PI * dl / period).cos().powi(2);
        }
        if let Some(fwhm) = self.prefilter_fwhm {
            rest *= (-4.0 * LN_2 * (dl / fwhm).powi(2)).exp();
        }
        (phase0.cos().powi(2) * rest, phase0.sin().powi(2) * rest)
    }
}

impl FilterProfiles for LyotFilter {
    fn profiles(&self, lambda: &[f64], tuning: f64) -> (Vec<f64>, Vec<f64>) {
        let (mut on, mut off): (Vec<f64>, Vec<f64>) = lambda
            .iter()
            .map(|&l| self.transmission(l - tuning))
            .unzip();
        normalise(&mut on);
        normalise(&mut off);
        (on, off)
    }
}

fn normalise(profile: &mut [f64]) {
    let sum: f64 = profile.iter().sum();
    if sum > 0.0 {
        profile.iter_mut().for_each(|p| *p /= sum);
    }
}
