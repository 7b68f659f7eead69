// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with reading exposure metadata.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeaderError {
    /// A keyword that must be present isn't.
    #[error("Required header keyword '{key}' is missing")]
    Missing { key: Box<str> },

    /// A keyword is present but its value isn't of the expected type.
    #[error("Couldn't parse header keyword '{key}' (value '{value}')")]
    Parse { key: Box<str>, value: Box<str> },

    /// The observation date/time keywords couldn't be turned into an epoch.
    #[error("Malformed observation time '{date} {time}': {reason}")]
    Time {
        date: Box<str>,
        time: Box<str>,
        reason: Box<str>,
    },
}
