// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Pretty printer for reporting inputs and results.
use std::borrow::Cow;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

pub(super) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl InfoPrinter {
    pub(super) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(super) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(super) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    /// The lines that [`InfoPrinter::display`] logs, after the title.
    fn lines(&self) -> Vec<String> {
        let num_blocks = self.blocks.len();
        let mut lines = vec![];
        for (i_block, block) in self.blocks.iter().enumerate() {
            let num_lines = block.len();
            for (i_line, line) in block.iter().enumerate() {
                let symbol = match (i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks) {
                    (0, false, _) => VERTICAL_AND_RIGHT,
                    (0, _, false) => VERTICAL_AND_RIGHT,
                    (0, true, true) => UP_AND_RIGHT,
                    _ => VERTICAL,
                };
                lines.push(format!("{symbol} {line}"));
            }
        }
        lines
    }

    pub(super) fn display(self) {
        log::info!("{}", console::style(&self.title).bold());
        for line in self.lines() {
            log::info!("{line}");
        }
        log::info!("");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_symbols() {
        let mut printer = InfoPrinter::new("Inputs".into());
        printer.push_line("Config: default".into());
        printer.push_block(vec!["Flats: 2 files".into(), "a.fts".into()]);
        printer.push_line("Lines: 1074.7".into());
        assert_eq!(
            printer.lines(),
            vec![
                "├ Config: default",
                "├ Flats: 2 files",
                "│ a.fts",
                "└ Lines: 1074.7"
            ]
        );
    }
}
