use crate::common_io::{read_lines_of_words_delim, write_lines, Delimiter};
use crate::traits::IoOps;
use ndarray::prelude::*;
use rayon::prelude::*;

/// A dense matrix with row and column names, e.g., probes by samples
#[derive(Clone, Debug)]
pub struct NamedArray2 {
    pub data: Array2<f64>,
    pub row_names: Vec<Box<str>>,
    pub column_names: Vec<Box<str>>,
}

/// `NA`, `NaN`, and empty cells are missing
pub fn parse_missing_f64(word: &str) -> anyhow::Result<f64> {
    let word = word.trim();
    if word.is_empty() || word.eq_ignore_ascii_case("na") || word.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    word.parse::<f64>()
        .map_err(|e| anyhow::anyhow!("failed to parse '{}': {}", word, e))
}

impl NamedArray2 {
    pub fn new(
        data: Array2<f64>,
        row_names: Vec<Box<str>>,
        column_names: Vec<Box<str>>,
    ) -> anyhow::Result<Self> {
        if data.nrows() != row_names.len() || data.ncols() != column_names.len() {
            return Err(anyhow::anyhow!(
                "names ({} x {}) do not match data ({} x {})",
                row_names.len(),
                column_names.len(),
                data.nrows(),
                data.ncols()
            ));
        }
        Ok(Self {
            data,
            row_names,
            column_names,
        })
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Keep a subset of rows in the given order
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), rows),
            row_names: rows.iter().map(|&i| self.row_names[i].clone()).collect(),
            column_names: self.column_names.clone(),
        }
    }
}

impl IoOps for NamedArray2 {
    type Mat = Self;

    /// The first non-comment line holds the column names, optionally
    /// preceded by a corner label; each data line starts with its row
    /// name.
    fn from_tsv(tsv_file: &str) -> anyhow::Result<Self::Mat> {
        let out = read_lines_of_words_delim(tsv_file, Delimiter::Tab, true)?;

        if out.lines.is_empty() {
            return Err(anyhow::anyhow!("no data in file {}", tsv_file));
        }

        let ncols = out.lines[0].1.len() - 1;
        let column_names: Vec<Box<str>> = if out.header.len() == ncols + 1 {
            out.header[1..].to_vec()
        } else if out.header.len() == ncols {
            out.header.clone()
        } else {
            return Err(anyhow::anyhow!(
                "header has {} fields but data rows have {} values",
                out.header.len(),
                ncols
            ));
        };

        let rows = out
            .lines
            .par_iter()
            .map(|(line, words)| -> anyhow::Result<(Box<str>, Vec<f64>)> {
                if words.len() != ncols + 1 {
                    return Err(anyhow::anyhow!(
                        "line {}: expected {} fields, found {}",
                        line,
                        ncols + 1,
                        words.len()
                    ));
                }
                let values = words[1..]
                    .iter()
                    .map(|w| parse_missing_f64(w))
                    .collect::<anyhow::Result<Vec<_>>>()
                    .map_err(|e| anyhow::anyhow!("line {}: {}", line, e))?;
                Ok((words[0].clone(), values))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let nrows = rows.len();
        let mut row_names = Vec::with_capacity(nrows);
        let mut flat = Vec::with_capacity(nrows * ncols);
        for (name, values) in rows {
            row_names.push(name);
            flat.extend(values);
        }

        Self::new(
            Array2::from_shape_vec((nrows, ncols), flat)?,
            row_names,
            column_names,
        )
    }

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        let mut lines: Vec<Box<str>> = Vec::with_capacity(self.nrows() + 1);
        let hdr = std::iter::once("row")
            .chain(self.column_names.iter().map(|x| x.as_ref()))
            .collect::<Vec<_>>()
            .join("\t");
        lines.push(hdr.into_boxed_str());

        for (name, row) in self.row_names.iter().zip(self.data.rows()) {
            let values = row
                .iter()
                .map(|x| {
                    if x.is_finite() {
                        format!("{}", x)
                    } else {
                        "NA".to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join("\t");
            lines.push(format!("{}\t{}", name, values).into_boxed_str());
        }
        write_lines(&lines, tsv_file)
    }
}
