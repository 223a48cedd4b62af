//! Grid-style text tables for console output.

#[derive(Clone, Copy, PartialEq)]
enum Align {
    Left,
    Right,
}

fn is_numeric(cell: &str) -> bool {
    cell.parse::<f64>().is_ok()
}

/// Render rows as a bordered grid with a `=` rule under the header.
///
/// Columns whose non-empty cells are all numeric are right-aligned.
pub fn render_grid<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.as_ref().chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(column_count) {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let aligns: Vec<Align> = (0..column_count)
        .map(|i| {
            let mut cells = rows
                .iter()
                .filter_map(|row| row.get(i))
                .filter(|cell| !cell.is_empty())
                .peekable();
            if cells.peek().is_some() && cells.all(|cell| is_numeric(cell)) {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect();

    let rule = |fill: char| -> String {
        let mut line = String::from("+");
        for width in &widths {
            line.extend(std::iter::repeat(fill).take(width + 2));
            line.push('+');
        }
        line
    };

    let format_row = |cells: Vec<&str>| -> String {
        let mut line = String::from("|");
        for (i, width) in widths.iter().enumerate() {
            let cell = cells.get(i).copied().unwrap_or("");
            let padding = width - cell.chars().count();
            line.push(' ');
            match aligns[i] {
                Align::Left => {
                    line.push_str(cell);
                    line.extend(std::iter::repeat(' ').take(padding));
                }
                Align::Right => {
                    line.extend(std::iter::repeat(' ').take(padding));
                    line.push_str(cell);
                }
            }
            line.push_str(" |");
        }
        line
    };

    let mut out = Vec::with_capacity(rows.len() * 2 + 3);
    out.push(rule('-'));
    out.push(format_row(headers.iter().map(|h| h.as_ref()).collect()));
    out.push(rule('='));
    for row in rows {
        out.push(format_row(row.iter().map(String::as_str).collect()));
        out.push(rule('-'));
    }
    if rows.is_empty() {
        out.pop();
        out.push(rule('-'));
    }
    out.join("\n")
}
