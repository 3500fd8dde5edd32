use std::io::{self, Write};

/// Narrowest column, padding included
pub const MIN_COLUMN_WIDTH: usize = 10;

/// Console table that grows by one row per tick.
///
/// The first block carries the header; later blocks only print their row
/// and its bottom border, so consecutive ticks read as one table.
pub struct TableSink<W: Write> {
    out: W,
    header_written: bool,
}

impl<W: Write> TableSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
        }
    }

    pub fn emit(&mut self, header: &[String], row: &[String]) -> io::Result<()> {
        let widths = column_widths(header, row);
        let border = border(&widths);

        if !self.header_written {
            writeln!(self.out, "{}", border)?;
            writeln!(self.out, "{}", line(header, &widths))?;
            writeln!(self.out, "{}", border)?;
            self.header_written = true;
        }
        writeln!(self.out, "{}", line(row, &widths))?;
        writeln!(self.out, "{}", border)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn column_widths(header: &[String], row: &[String]) -> Vec<usize> {
    (0..header.len().max(row.len()))
        .map(|i| {
            let cell = |cells: &[String]| cells.get(i).map_or(0, |c| c.chars().count());
            (cell(header).max(cell(row)) + 2).max(MIN_COLUMN_WIDTH)
        })
        .collect()
}

fn border(widths: &[usize]) -> String {
    let mut out = String::from("+");
    for width in widths {
        out.push_str(&"-".repeat(*width));
        out.push('+');
    }
    out
}

fn line(cells: &[String], widths: &[usize]) -> String {
    let mut out = String::from("|");
    for (i, width) in widths.iter().enumerate() {
        let cell = cells.get(i).map_or("", String::as_str);
        out.push_str(&format!(" {:<w$} |", cell, w = width - 2));
    }
    out
}
