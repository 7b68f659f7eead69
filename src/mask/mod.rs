// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Building masks of the usable part of a beam image.
//!
//! A mask is the elementwise product of independent sub-masks:
//!
//! * disk: zero inside the (enlarged) occulter;
//! * field: zero outside the (shrunken) field stop;
//! * post: zero inside a wedge covering the occulter support post;
//! * overlap: zero inside a wedge covering the region where the two beams
//!   overlap on the detector.
//!
//! Older headers only describe circles (once per beam), so legacy masks are
//! only disk × field. Angles are in degrees, counter-clockwise from the +x
//! axis.


use log::{debug, warn};
use ndarray::{prelude::*, Zip};

use crate::{
    geometry::{BeamGeometry, Circle},
    header::{Header, HeaderError},
    math::frame_centre,
    InstrumentConfig,
};

/// The keyword whose presence marks a header as carrying modern
/// single-keyword geometry.
const MODERN_GEOMETRY_KEYWORD: &str = "FRADIUS";

/// Geometry from a header with two redundant (per-beam) readings of each
/// circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyGeometry {
    pub occulter: [Circle; 2],
    pub field: [Circle; 2],
}

impl LegacyGeometry {
    /// The largest disagreement between the two readings of any centre
    /// coordinate or radius \[pixels\].
    pub fn divergence(&self) -> f64 {
        [self.occulter, self.field]
            .iter()
            .flat_map(|[a, b]| {
                [
                    (a.x - b.x).abs(),
                    (a.y - b.y).abs(),
                    (a.radius - b.radius).abs(),
                ]
            })
            .fold(0.0, f64::max)
    }

    /// The arithmetic means of the two readings of the occulter and the field
    /// stop.
    pub fn averaged(&self) -> (Circle, Circle) {
        let mean = |[a, b]: [Circle; 2]| Circle {
            x: 0.5 * (a.x + b.x),
            y: 0.5 * (a.y + b.y),
            radius: 0.5 * (a.radius + b.radius),
        };
        (mean(self.occulter), mean(self.field))
    }
}

/// Geometry from a header with single keywords for everything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModernGeometry {
    pub occulter: Circle,
    pub field: Circle,

    /// The position angle of the occulter post \[degrees\].
    pub post_angle: f64,

    /// The position angle of the beam overlap \[degrees\].
    pub overlap_angle: f64,

    /// The solar P angle \[degrees\].
    pub p_angle: f64,
}

/// Where mask geometry comes from. Which variant applies is decided once,
/// when the header is read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometrySource {
    Legacy(LegacyGeometry),
    Modern(ModernGeometry),
}

impl GeometrySource {
    /// Read mask geometry from a header. Headers with `FRADIUS` are modern;
    /// everything else is legacy. Modern pixel keywords are 1-based FITS
    /// coordinates.
    pub fn from_header(header: &Header) -> Result<GeometrySource, HeaderError> {
        if header.contains(MODERN_GEOMETRY_KEYWORD) {
            debug!("Header has modern geometry keywords");
            let occulter = Circle {
                x: header.get_required::<f64>("CRPIX1")? - 1.0,
                y: header.get_required::<f64>("CRPIX2")? - 1.0,
                radius: header.get_required("ORADIUS")?,
            };
            let field = Circle {
                x: header.get_required::<f64>("FRPIX1")? - 1.0,
                y: header.get_required::<f64>("FRPIX2")? - 1.0,
                radius: header.get_required(MODERN_GEOMETRY_KEYWORD)?,
            };
            Ok(GeometrySource::Modern(ModernGeometry {
                occulter,
                field,
                post_angle: header.get_required("POSTPANG")?,
                overlap_angle: header.get_required("OVRLPANG")?,
                p_angle: header.get_required("SOLAR_P0")?,
            }))
        } else {
            debug!("Header has legacy geometry keywords");
            let circle = |x: &str, y: &str, r: &str| -> Result<Circle, HeaderError> {
                Ok(Circle {
                    x: header.get_required(x)?,
                    y: header.get_required(y)?,
                    radius: header.get_required(r)?,
                })
            };
            Ok(GeometrySource::Legacy(LegacyGeometry {
                occulter: [
                    circle("OXCNTER1", "OYCNTER1", "ORADIUS1")?,
                    circle("OXCNTER2", "OYCNTER2", "ORADIUS2")?,
                ],
                field: [
                    circle("FXCNTER1", "FYCNTER1", "FRADIUS1")?,
                    circle("FXCNTER2", "FYCNTER2", "FRADIUS2")?,
                ],
            }))
        }
    }

    /// The occulter and field-stop circles this source describes.
    pub fn circles(&self, config: &InstrumentConfig) -> (Circle, Circle) {
        match self {
            GeometrySource::Legacy(legacy) => {
                let divergence = legacy.divergence();
                if divergence > config.legacy_divergence_warn {
                    warn!(
                        "The two legacy geometry readings differ by up to {divergence:.2} px; using their mean"
                    );
                }
                legacy.averaged()
            }
            GeometrySource::Modern(modern) => (modern.occulter, modern.field),
        }
    }
}

/// Zero within `radius` of `centre` (x, y), one elsewhere.
pub fn disk_mask(dim: (usize, usize), centre: (f64, f64), radius: f64) -> Array2<f32> {
    let mut mask = Array2::zeros(dim);
    Zip::indexed(&mut mask).par_for_each(|(row, col), m| {
        let r = (col as f64 - centre.0).hypot(row as f64 - centre.1);
        *m = if r < radius { 0.0 } else { 1.0 };
    });
    mask
}

/// One within `radius` of `centre` (x, y), zero elsewhere.
pub fn field_mask(dim: (usize, usize), centre: (f64, f64), radius: f64) -> Array2<f32> {
    let mut mask = Array2::zeros(dim);
    Zip::indexed(&mut mask).par_for_each(|(row, col), m| {
        let r = (col as f64 - centre.0).hypot(row as f64 - centre.1);
        *m = if r < radius { 1.0 } else { 0.0 };
    });
    mask
}

/// Zero inside the wedge with its apex at `apex` (x, y), centred on
/// `angle` and extending `half_width` either side of it, one elsewhere. A
/// wedge with zero half-width masks nothing.
pub fn wedge_mask(
    dim: (usize, usize),
    apex: (f64, f64),
    angle: f64,
    half_width: f64,
) -> Array2<f32> {
    let mut mask = Array2::zeros(dim);
    Zip::indexed(&mut mask).par_for_each(|(row, col), m| {
        let theta = (row as f64 - apex.1)
            .atan2(col as f64 - apex.0)
            .to_degrees();
        *m = if angle_difference(theta, angle).abs() < half_width {
            0.0
        } else {
            1.0
        };
    });
    mask
}

/// `a - b` wrapped into \[-180, 180) degrees.
fn angle_difference(a: f64, b: f64) -> f64 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

/// Build the mask of an image that has been centred on the occulter, so the
/// occulter centre is the frame centre and the field centre is offset from
/// it by the same amount as in `source`. `occ_fac` and `fld_fac` scale the
/// occulter and field radii before the configured offsets are added.
pub fn build_mask(
    source: &GeometrySource,
    dim: (usize, usize),
    config: &InstrumentConfig,
    occ_fac: f64,
    fld_fac: f64,
) -> Array2<f32> {
    let (occulter, field) = source.circles(config);
    let centre = (frame_centre(dim.1), frame_centre(dim.0));
    let field_centre = (
        centre.0 + field.x - occulter.x,
        centre.1 + field.y - occulter.y,
    );

    let mut mask = disk_mask(dim, centre, occulter.radius * occ_fac + config.occulter_offset);
    mask *= &field_mask(
        dim,
        field_centre,
        field.radius * fld_fac + config.field_offset,
    );

    if let GeometrySource::Modern(modern) = source {
        let post = modern.post_angle + 180.0 - modern.p_angle - config.post_rotation;
        let overlap = modern.overlap_angle + modern.p_angle;
        debug!("Masking the post at {post:.2} deg and the overlap at {overlap:.2} deg");
        mask *= &wedge_mask(dim, centre, post, config.post_half_width);
        mask *= &wedge_mask(dim, field_centre, overlap, config.overlap_half_width);
    }
    mask
}

/// Build the disk × field mask of an occulter-centred image from fitted
/// circles.
pub fn build_mask_from_circles(
    geometry: &BeamGeometry,
    dim: (usize, usize),
    config: &InstrumentConfig,
    occ_fac: f64,
    fld_fac: f64,
) -> Array2<f32> {
    let source = GeometrySource::Legacy(LegacyGeometry {
        occulter: [geometry.occulter; 2],
        field: [geometry.field; 2],
    });
    build_mask(&source, dim, config, occ_fac, fld_fac)
}

/// The illuminated annulus of an image that has *not* been centred: the
/// disk and field masks placed at the circles' own positions.
pub fn field_valid_mask(
    geometry: &BeamGeometry,
    dim: (usize, usize),
    config: &InstrumentConfig,
) -> Array2<f32> {
    let BeamGeometry { occulter, field } = geometry;
    let mut mask = disk_mask(
        dim,
        (occulter.x, occulter.y),
        occulter.radius + config.occulter_offset,
    );
    mask *= &field_mask(
        dim,
        (field.x, field.y),
        field.radius + config.field_offset,
    );
    mask
}
