#![allow(dead_code)]

use crate::common_io::{open_buf_writer, read_lines};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::io::Write;

pub type Mat = DMatrix<f32>;

/// A dense matrix along with its row and column names
pub struct MatWithNames<T> {
    pub rows: Vec<Box<str>>,
    pub cols: Vec<Box<str>>,
    pub mat: T,
}

///
/// Read a delimited text matrix with a header line and a leading
/// row-name field on each line (gzipped or not). The header may or
/// may not carry a corner label over the row-name field.
///
/// * `input_file` - text file name
/// * `delim` - delimiter characters
pub fn read_named_matrix(
    input_file: &str,
    delim: &[char],
) -> anyhow::Result<MatWithNames<Mat>> {
    let lines = read_lines(input_file)?;

    if lines.len() < 2 {
        return Err(anyhow::anyhow!("not enough lines in {}", input_file));
    }

    let header: Vec<Box<str>> = lines[0]
        .split(delim)
        .map(|x| x.to_string().into_boxed_str())
        .collect();

    // parsing takes more time, so split them into parallel jobs
    let mut parsed: Vec<(usize, Box<str>, Vec<f32>)> = lines[1..]
        .iter()
        .enumerate()
        .par_bridge()
        .filter(|(_, line)| !line.is_empty())
        .map(|(i, line)| {
            let mut words = line.split(delim);
            let row_name = words
                .next()
                .map(|x| x.to_string().into_boxed_str())
                .ok_or(anyhow::anyhow!("empty line {}", i + 2))?;
            let values = words
                .map(|x| {
                    x.parse::<f32>()
                        .map_err(|_| anyhow::anyhow!("failed to parse '{}'", x))
                })
                .collect::<anyhow::Result<Vec<f32>>>()?;
            Ok((i, row_name, values))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    parsed.sort_by_key(|&(i, _, _)| i);

    let nrows = parsed.len();
    let ncols = parsed
        .first()
        .map(|(_, _, v)| v.len())
        .ok_or(anyhow::anyhow!("no data lines in {}", input_file))?;

    if parsed.iter().any(|(_, _, v)| v.len() != ncols) {
        return Err(anyhow::anyhow!("ragged rows in {}", input_file));
    }

    // a corner label over the row-name field is optional
    let cols: Vec<Box<str>> = match header.len() {
        n if n == ncols + 1 => header[1..].to_vec(),
        n if n == ncols => header,
        n => {
            return Err(anyhow::anyhow!(
                "header has {} fields for {} columns in {}",
                n,
                ncols,
                input_file
            ))
        }
    };

    let rows: Vec<Box<str>> = parsed.iter().map(|(_, r, _)| r.clone()).collect();
    let data = parsed.into_iter().flat_map(|(_, _, v)| v);

    Ok(MatWithNames {
        rows,
        cols,
        mat: Mat::from_row_iterator(nrows, ncols, data),
    })
}

///
/// Write a matrix as delimited text with a header line and a leading
/// row-name field on each line (gzipped or not).
///
/// * `output_file` - text file name
/// * `delim` - delimiter string
pub fn write_named_matrix(
    output_file: &str,
    mat: &Mat,
    rows: &[Box<str>],
    cols: &[Box<str>],
    delim: &str,
) -> anyhow::Result<()> {
    if rows.len() != mat.nrows() || cols.len() != mat.ncols() {
        return Err(anyhow::anyhow!(
            "name lengths {} x {} don't match the matrix {} x {}",
            rows.len(),
            cols.len(),
            mat.nrows(),
            mat.ncols()
        ));
    }

    let mut buf = open_buf_writer(output_file)?;

    let header = cols
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(delim);
    writeln!(buf, "{}{}", delim, header)?;

    for (row_name, row) in rows.iter().zip(mat.row_iter()) {
        let line = row
            .iter()
            .map(|x| format!("{}", x))
            .collect::<Vec<_>>()
            .join(delim);
        writeln!(buf, "{}{}{}", row_name, delim, line)?;
    }
    buf.flush()?;
    Ok(())
}
