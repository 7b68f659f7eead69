// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Beam extraction and registration.
//!
//! Each raw dual-beam exposure is split into its two beam sub-images, which
//! have their distortion removed, are rotated to put solar north up and are
//! shifted so the occulter is centred. Raw frames are stored south up, so the
//! rotation is by P + 180 degrees.

mod error;

pub use error::RegistrationError;

use log::{debug, info};
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::{
    beam::{correct_distortion, extract_beam, Beam},
    ephemeris::{SolarEphemeris, SunAngles},
    geometry::{Circle, ImageGeometry},
    header::Header,
    math::{frame_centre, remap},
    misc::make_progress_bar,
    InstrumentConfig,
};

/// A raw dual-beam exposure and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExposure {
    pub header: Header,
    pub image: Array2<f32>,
}

/// Registered images of both beams, stacked along the first axis (one
/// element per exposure), and the solar angles used for each exposure.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredBeams {
    pub beam1: Array3<f32>,
    pub beam2: Array3<f32>,
    pub sun: Vec<SunAngles>,
}

impl RegisteredBeams {
    pub fn beam(&self, beam: Beam) -> &Array3<f32> {
        match beam {
            Beam::One => &self.beam1,
            Beam::Two => &self.beam2,
        }
    }

    pub fn num_exposures(&self) -> usize {
        self.sun.len()
    }
}

/// Register both beams of every exposure. Exposures are processed in
/// parallel. Any exposure with unusable metadata fails the whole call.
pub fn extract_and_register(
    exposures: &[RawExposure],
    geometry: &ImageGeometry,
    ephemeris: &dyn SolarEphemeris,
    config: &InstrumentConfig,
) -> Result<RegisteredBeams, RegistrationError> {
    if exposures.is_empty() {
        return Err(RegistrationError::NoExposures);
    }
    info!("Registering {} exposures", exposures.len());

    let progress = make_progress_bar(exposures.len(), "Registering", "exposures");
    let registered = exposures
        .par_iter()
        .enumerate()
        .map(|(index, exposure)| {
            let result = register_exposure(index, exposure, geometry, ephemeris, config);
            progress.inc(1);
            result
        })
        .collect::<Result<Vec<_>, _>>()?;
    progress.finish();

    let n = config.beam_size;
    let mut beam1 = Array3::zeros((registered.len(), n, n));
    let mut beam2 = Array3::zeros((registered.len(), n, n));
    let mut sun = Vec::with_capacity(registered.len());
    for (i, ([b1, b2], angles)) in registered.into_iter().enumerate() {
        beam1.index_axis_mut(Axis(0), i).assign(&b1);
        beam2.index_axis_mut(Axis(0), i).assign(&b2);
        sun.push(angles);
    }

    Ok(RegisteredBeams { beam1, beam2, sun })
}

/// Register both beams of a single exposure. `index` is only used for error
/// messages.
pub fn register_exposure(
    index: usize,
    exposure: &RawExposure,
    geometry: &ImageGeometry,
    ephemeris: &dyn SolarEphemeris,
    config: &InstrumentConfig,
) -> Result<([Array2<f32>; 2], SunAngles), RegistrationError> {
    let (got_y, got_x) = exposure.image.dim();
    if got_y < config.raw_size || got_x < config.raw_size {
        return Err(RegistrationError::FrameSize {
            index,
            got_y,
            got_x,
            expected: config.raw_size,
        });
    }

    let epoch = exposure
        .header
        .observation_epoch(config.utc_offset_hours)
        .map_err(|source| RegistrationError::Header { index, source })?;
    let sun = ephemeris.sun(epoch);
    debug!("Exposure {index}: {epoch}, P = {:.3} deg", sun.p_angle);

    let beams = Beam::BOTH.map(|beam| {
        let sub_image = extract_beam(exposure.image.view(), beam, config);
        let corrected = correct_distortion(sub_image.view(), beam, config);
        rotate_and_centre(
            corrected.view(),
            &geometry.beam(beam).occulter,
            sun.p_angle + 180.0,
        )
    });
    Ok((beams, sun))
}

/// Rotate an image clockwise by `angle` degrees about the occulter centre and
/// move the occulter centre to the frame centre, as a single cubic
/// convolution remap. Pixels that come from outside the image are
/// [`MISSING_VALUE`](crate::constants::MISSING_VALUE).
pub fn rotate_and_centre(image: ArrayView2<f32>, occulter: &Circle, angle: f64) -> Array2<f32> {
    let (ny, nx) = image.dim();
    let cx = frame_centre(nx);
    let cy = frame_centre(ny);
    let (s, c) = angle.to_radians().sin_cos();
    remap(image, image.dim(), |x, y| {
        let dx = x - cx;
        let dy = y - cy;
        (
            occulter.x + c * dx - s * dy,
            occulter.y + s * dx + c * dy,
        )
    })
}
