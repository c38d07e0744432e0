//! Plain-text table output.

use std::io::Write;

/// Writes a column-aligned table with a header row and a dash separator.
///
/// # Errors
///
/// Returns an error when the writer fails.
pub fn print_table(
    w: &mut dyn Write,
    headers: &[&str],
    rows: &[Vec<String>],
) -> std::io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, col) in row.iter().enumerate() {
            if i < widths.len() && col.len() > widths[i] {
                widths[i] = col.len();
            }
        }
    }

    write_row(w, headers.iter().map(|h| (*h).to_owned()), &widths)?;
    write_row(w, widths.iter().map(|width| "-".repeat(*width)), &widths)?;
    for row in rows {
        write_row(w, row.iter().cloned(), &widths)?;
    }
    Ok(())
}

fn write_row(
    w: &mut dyn Write,
    cols: impl Iterator<Item = String>,
    widths: &[usize],
) -> std::io::Result<()> {
    let parts: Vec<String> = cols
        .zip(widths)
        .map(|(col, width)| format!("{col:<width$}"))
        .collect();
    writeln!(w, "{}", parts.join("  ").trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_align_to_widest_cell() {
        let mut buf = Vec::new();
        print_table(
            &mut buf,
            &["Service", "State"],
            &[
                vec!["api".to_owned(), "running".to_owned()],
                vec!["worker-long-name".to_owned(), "exited".to_owned()],
            ],
        )
        .expect("print");
        let out = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Service           State");
        assert_eq!(lines[1], "----------------  -----");
        assert_eq!(lines[2], "api               running");
        assert_eq!(lines[3], "worker-long-name  exited");
    }

    #[test]
    fn empty_rows_still_print_headers() {
        let mut buf = Vec::new();
        print_table(&mut buf, &["Name"], &[]).expect("print");
        let out = String::from_utf8(buf).expect("utf8");
        assert_eq!(out.lines().count(), 2);
    }
}
