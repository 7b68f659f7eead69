// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::{Path, PathBuf};

use glob::glob;
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem.
pub(crate) fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    Ok(entries)
}

/// Expand the input file arguments. Arguments that name existing files are
/// used as they are; anything else is treated as a glob pattern, which must
/// match at least one file. Matches of a single pattern are sorted (glob
/// order), but the order of the arguments is kept.
pub(crate) fn expand_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PathBuf>, GlobError> {
    let mut files = vec![];
    for input in inputs {
        let input = input.as_ref();
        if Path::new(input).is_file() {
            files.push(PathBuf::from(input));
            continue;
        }
        let matches = get_all_matches_from_glob(input)?;
        if matches.is_empty() {
            return Err(GlobError::NoMatches {
                glob: input.to_string(),
            });
        }
        files.extend(matches);
    }
    Ok(files)
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error("No glob matches were found for {glob}")]
    NoMatches { glob: String },

    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}
