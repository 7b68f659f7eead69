// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous things.

use hifitime::Epoch;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::PROGRESS_BARS;

/// Convenience function to make a progress bar. It's only drawn if progress
/// bars have been enabled.
pub(crate) fn make_progress_bar(len: usize, message: &'static str, unit: &str) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(len as _),
        if PROGRESS_BARS.load() {
            // Use stdout, not stderr, to keep the bars with the log messages.
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{msg:18}}: [{{wide_bar:.blue}}] {{pos:3}}/{{len:3}} {unit} ({{elapsed_precise}}<{{eta_precise}})"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message(message)
}

/// The date part of an epoch, for log messages.
pub(crate) fn epoch_date(epoch: Epoch) -> String {
    let (y, m, d, _, _, _, _) = epoch.to_gregorian_utc();
    format!("{y:04}-{m:02}-{d:02}")
}
