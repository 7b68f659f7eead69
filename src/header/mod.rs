// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Exposure metadata.
//!
//! A [`Header`] is the set of FITS keywords attached to an exposure, kept as
//! unparsed value strings until a caller asks for a typed value. Anything the
//! core requires but can't find or parse is a [`HeaderError`], which is fatal
//! for the exposure that owns the header.

mod error;

pub use error::HeaderError;

use std::str::FromStr;

use hifitime::{Duration, Epoch, Unit};
use indexmap::IndexMap;

/// The FITS keywords the core knows how to use. Only these are pulled out of
/// files.
pub const KNOWN_KEYWORDS: &[&str] = &[
    "DATE-OBS", "TIME-OBS", "WAVELENG", "BEAM", "POLSTATE", "EXPOSURE", "NDFILTER", "CRPIX1",
    "CRPIX2", "ORADIUS", "FRPIX1", "FRPIX2", "FRADIUS", "POSTPANG", "OVRLPANG", "SOLAR_P0",
    "OXCNTER1", "OYCNTER1", "ORADIUS1", "OXCNTER2", "OYCNTER2", "ORADIUS2", "FXCNTER1", "FYCNTER1",
    "FRADIUS1", "FXCNTER2", "FYCNTER2", "FRADIUS2",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: IndexMap<String, String>,
}

impl Header {
    pub fn new() -> Header {
        Header::default()
    }

    /// Set a keyword's value, replacing any existing value. Keywords are
    /// case-insensitive and stored upper case.
    pub fn insert<K: AsRef<str>, V: ToString>(&mut self, key: K, value: V) {
        self.cards
            .insert(key.as_ref().to_uppercase(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cards.contains_key(&key.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The raw value of a keyword with surrounding whitespace and FITS string
    /// quotes removed.
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.cards
            .get(&key.to_uppercase())
            .map(|v| v.trim().trim_matches('\'').trim())
    }

    /// Pull out the value of a keyword that may or may not exist, parsing it
    /// into the desired type.
    pub fn get_optional<T: FromStr>(&self, key: &str) -> Result<Option<T>, HeaderError> {
        match self.get_raw(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| HeaderError::Parse {
                key: key.into(),
                value: value.into(),
            }),
        }
    }

    /// Pull out the value of a keyword, parsing it into the desired type.
    pub fn get_required<T: FromStr>(&self, key: &str) -> Result<T, HeaderError> {
        self.get_optional(key)?
            .ok_or_else(|| HeaderError::Missing { key: key.into() })
    }

    /// The wavelength of the exposure \[nm\].
    pub fn wavelength(&self) -> Result<f64, HeaderError> {
        self.get_required("WAVELENG")
    }

    /// Which way round the beams are; +1 or -1.
    pub fn beam(&self) -> Result<i32, HeaderError> {
        let beam: i32 = self.get_required("BEAM")?;
        match beam {
            1 | -1 => Ok(beam),
            _ => Err(HeaderError::Parse {
                key: "BEAM".into(),
                value: beam.to_string().into(),
            }),
        }
    }

    /// The exposure time \[ms\].
    pub fn exposure(&self) -> Result<f64, HeaderError> {
        self.get_required("EXPOSURE")
    }

    /// The UTC epoch of the exposure. CoMP headers record the local date and
    /// time (`DATE-OBS`, `TIME-OBS`); `utc_offset_hours` is added to get UTC.
    /// A `DATE-OBS` already containing a time (`YYYY-MM-DDTHH:MM:SS`) is also
    /// accepted.
    pub fn observation_epoch(&self, utc_offset_hours: f64) -> Result<Epoch, HeaderError> {
        let date_obs: String = self.get_required("DATE-OBS")?;
        let (date, time) = match date_obs.split_once('T') {
            Some((d, t)) => (d.to_string(), t.to_string()),
            None => (date_obs.clone(), self.get_required::<String>("TIME-OBS")?),
        };
        let epoch = parse_date_time(&date, &time)?;
        Ok(epoch + Duration::from_f64(utc_offset_hours, Unit::Hour))
    }
}

impl<K: AsRef<str>, V: ToString> FromIterator<(K, V)> for Header {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (k, v) in iter {
            header.insert(k, v);
        }
        header
    }
}

fn parse_date_time(date: &str, time: &str) -> Result<Epoch, HeaderError> {
    Epoch::from_str(&format!("{}T{} UTC", date.trim(), time.trim())).map_err(|e| {
        HeaderError::Time {
            date: date.into(),
            time: time.into(),
            reason: e.to_string().into(),
        }
    })
}
