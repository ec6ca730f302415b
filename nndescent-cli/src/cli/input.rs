//! Line-oriented vector input.
//!
//! Each line holds one node's property vector as comma- or
//! whitespace-separated numbers. A blank line is a node without the property.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::{Span, debug, field, instrument};

use super::commands::CliError;

/// Property vectors in node order.
#[derive(Clone, Debug, Default, PartialEq)]
pub(super) struct VectorTable {
    pub(super) rows: Vec<Vec<f64>>,
}

impl VectorTable {
    pub(super) fn node_count(&self) -> usize {
        self.rows.len()
    }

    /// Dimension shared by every non-empty row.
    ///
    /// # Errors
    /// Returns [`CliError::DimensionMismatch`] naming the first row that
    /// disagrees with the first non-empty row.
    pub(super) fn uniform_dimension(&self, path: &Path) -> Result<Option<usize>, CliError> {
        let mut expected = None;
        for (index, row) in self.rows.iter().enumerate() {
            if row.is_empty() {
                continue;
            }
            match expected {
                None => expected = Some(row.len()),
                Some(dimension) if dimension != row.len() => {
                    return Err(CliError::DimensionMismatch {
                        path: path.to_path_buf(),
                        line: index + 1,
                        expected: dimension,
                        found: row.len(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(expected)
    }

    /// Flattens single-value rows into scalars; blank rows become `NaN`.
    ///
    /// # Errors
    /// Returns [`CliError::DimensionMismatch`] for rows holding more than one
    /// value.
    pub(super) fn into_scalars(self, path: &Path) -> Result<Vec<f64>, CliError> {
        self.rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| match row.as_slice() {
                [] => Ok(f64::NAN),
                [value] => Ok(*value),
                values => Err(CliError::DimensionMismatch {
                    path: path.to_path_buf(),
                    line: index + 1,
                    expected: 1,
                    found: values.len(),
                }),
            })
            .collect()
    }
}

#[instrument(name = "cli.read_vectors", err, fields(path = field::Empty, rows = field::Empty))]
pub(super) fn read_vectors(path: &Path) -> Result<VectorTable, CliError> {
    let span = Span::current();
    span.record("path", field::display(path.display()));
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = parse_vectors(path, BufReader::new(file))?;
    span.record("rows", table.node_count());
    debug!(rows = table.node_count(), "vectors loaded");
    Ok(table)
}

pub(super) fn parse_vectors(path: &Path, reader: impl BufRead) -> Result<VectorTable, CliError> {
    let mut rows = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(parse_row(path, index + 1, &line)?);
    }
    if rows.is_empty() {
        return Err(CliError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    Ok(VectorTable { rows })
}

fn parse_row(path: &Path, line: usize, raw: &str) -> Result<Vec<f64>, CliError> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(CliError::InvalidValue {
                path: path.to_path_buf(),
                line,
                value: token.to_owned(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn parse(contents: &str) -> Result<VectorTable, CliError> {
        parse_vectors(Path::new("input.txt"), Cursor::new(contents))
    }

    #[rstest]
    #[case("1,2,3", vec![1.0, 2.0, 3.0])]
    #[case("  4 5\t6 ", vec![4.0, 5.0, 6.0])]
    #[case("7, 8,,9", vec![7.0, 8.0, 9.0])]
    #[case("   ", vec![])]
    fn rows_accept_commas_and_whitespace(#[case] raw: &str, #[case] expected: Vec<f64>) {
        let row = parse_row(Path::new("input.txt"), 1, raw).expect("row must parse");
        assert_eq!(row, expected);
    }

    #[rstest]
    #[case("1,x", "x")]
    #[case("inf", "inf")]
    #[case("2 NaN", "NaN")]
    fn rows_reject_non_finite_or_malformed_values(#[case] raw: &str, #[case] bad: &str) {
        let err = parse_row(Path::new("input.txt"), 3, raw).expect_err("row must fail");
        assert!(matches!(
            err,
            CliError::InvalidValue { line: 3, ref value, .. } if value == bad
        ));
    }

    #[test]
    fn blank_lines_keep_their_node_slot() {
        let table = parse("1,0\n\n0,1\n").expect("input must parse");
        assert_eq!(table.node_count(), 3);
        assert!(table.rows[1].is_empty());
        assert_eq!(
            table.uniform_dimension(Path::new("input.txt")).expect("dims agree"),
            Some(2)
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(parse(""), Err(CliError::EmptyInput { .. })));
    }

    #[test]
    fn mixed_dimensions_name_the_offending_line() {
        let table = parse("1,0\n1\n").expect("input must parse");
        let err = table
            .uniform_dimension(Path::new("input.txt"))
            .expect_err("dimensions disagree");
        assert!(matches!(
            err,
            CliError::DimensionMismatch {
                line: 2,
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn scalars_map_blank_rows_to_nan() {
        let scalars = parse("1.5\n\n2\n")
            .expect("input must parse")
            .into_scalars(Path::new("input.txt"))
            .expect("single values");
        assert_eq!(scalars.len(), 3);
        assert_eq!(scalars[0], 1.5);
        assert!(scalars[1].is_nan());
    }
}
