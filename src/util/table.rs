/// Render rows as a left-aligned table with two-space column gaps, header
/// first. The last column is never padded.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            if cell.len() > widths[i] {
                widths[i] = cell.len();
            }
        }
    }

    let render = |cells: Vec<&str>| -> String {
        let mut line = String::new();
        for (i, cell) in cells.iter().enumerate() {
            if i + 1 == columns {
                line.push_str(cell);
            } else {
                line.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
            }
        }
        line.trim_end().to_string()
    };

    let mut lines = vec![render(headers.to_vec())];
    for row in rows {
        lines.push(render(row.iter().map(|s| s.as_str()).collect()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table_alignment() {
        let lines = format_table(
            &["NAME", "IMAGE"],
            &[
                vec!["alpha".to_string(), "alpine:3.20".to_string()],
                vec!["a-much-longer-name".to_string(), "x".to_string()],
            ],
        );
        assert_eq!(lines[0], "NAME                IMAGE");
        assert_eq!(lines[1], "alpha               alpine:3.20");
        assert_eq!(lines[2], "a-much-longer-name  x");
    }
}
