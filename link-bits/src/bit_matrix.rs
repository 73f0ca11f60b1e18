use crate::error::{BitMatrixError, Result, Section};
use crate::mask;

use fnv::FnvHashMap as HashMap;
use matrix_util::common_io::{read_lines, write_lines};

///
/// Encodes a (row, col) cell into a single id `row * shift + col`.
/// The shift is fixed when the packer is created and never changes.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairPacker {
    shift: u64,
}

impl PairPacker {
    /// `shift = max(rows, cols)`, at least 1
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            shift: rows.max(cols).max(1) as u64,
        }
    }

    pub fn shift(&self) -> u64 {
        self.shift
    }

    pub fn pack(&self, row: usize, col: usize) -> u64 {
        debug_assert!((col as u64) < self.shift);
        row as u64 * self.shift + col as u64
    }

    pub fn unpack(&self, id: u64) -> (usize, usize) {
        ((id / self.shift) as usize, (id % self.shift) as usize)
    }
}

///
/// A `rows x cols` matrix whose cells are fixed-length bit vectors of
/// `bit_count` bits, one bit per experiment. Rows and columns carry
/// external gene ids. Only non-empty cells are stored.
///
#[derive(Clone, Debug)]
pub struct CompressedBitMatrix {
    rows: usize,
    cols: usize,
    bit_count: usize,
    words: usize,
    packer: PairPacker,
    row_names: Vec<i64>,
    col_names: Vec<i64>,
    row_index: HashMap<i64, usize>,
    col_index: HashMap<i64, usize>,
    cells: HashMap<(usize, usize), Box<[u64]>>,
}

impl CompressedBitMatrix {
    pub fn new(rows: usize, cols: usize, bit_count: usize) -> Self {
        Self {
            rows,
            cols,
            bit_count,
            words: mask::words_for(bit_count),
            packer: PairPacker::new(rows, cols),
            row_names: Vec::with_capacity(rows),
            col_names: Vec::with_capacity(cols),
            row_index: HashMap::default(),
            col_index: HashMap::default(),
            cells: HashMap::default(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of bits in every cell
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    pub fn words_per_cell(&self) -> usize {
        self.words
    }

    pub fn packer(&self) -> PairPacker {
        self.packer
    }

    /// Append a row name; its index is the insertion position
    pub fn add_row_name(&mut self, name: i64) -> Result<usize> {
        Self::add_name(
            "row",
            name,
            self.rows,
            &mut self.row_names,
            &mut self.row_index,
        )
    }

    /// Append a column name; its index is the insertion position
    pub fn add_column_name(&mut self, name: i64) -> Result<usize> {
        Self::add_name(
            "column",
            name,
            self.cols,
            &mut self.col_names,
            &mut self.col_index,
        )
    }

    fn add_name(
        kind: &'static str,
        name: i64,
        capacity: usize,
        names: &mut Vec<i64>,
        index: &mut HashMap<i64, usize>,
    ) -> Result<usize> {
        if index.contains_key(&name) {
            return Err(BitMatrixError::DuplicateName { kind, name });
        }
        if names.len() >= capacity {
            return Err(BitMatrixError::NameOverflow { kind, capacity });
        }
        let idx = names.len();
        names.push(name);
        index.insert(name, idx);
        Ok(idx)
    }

    pub fn row_index(&self, name: i64) -> Option<usize> {
        self.row_index.get(&name).copied()
    }

    pub fn col_index(&self, name: i64) -> Option<usize> {
        self.col_index.get(&name).copied()
    }

    pub fn row_name(&self, i: usize) -> i64 {
        self.row_names[i]
    }

    pub fn col_name(&self, j: usize) -> i64 {
        self.col_names[j]
    }

    pub fn row_names(&self) -> &[i64] {
        &self.row_names
    }

    pub fn col_names(&self) -> &[i64] {
        &self.col_names
    }

    fn assert_cell(&self, i: usize, j: usize) {
        assert!(
            i < self.rows && j < self.cols,
            "cell ({}, {}) out of range for {} x {}",
            i,
            j,
            self.rows,
            self.cols
        );
    }

    /// Set the `bit`-th bit of cell (i, j)
    pub fn set(&mut self, i: usize, j: usize, bit: usize) -> Result<()> {
        if i >= self.rows || j >= self.cols || bit >= self.bit_count {
            return Err(BitMatrixError::IndexOutOfRange {
                row: i,
                col: j,
                bit,
                rows: self.rows,
                cols: self.cols,
                bit_count: self.bit_count,
            });
        }
        let words = self.words;
        let cell = self
            .cells
            .entry((i, j))
            .or_insert_with(|| vec![0_u64; words].into_boxed_slice());
        mask::set_bit(cell, bit);
        Ok(())
    }

    /// Overwrite the mask of cell (i, j). Returns false if the number of
    /// words does not match this matrix or a bit past `bit_count` is set.
    pub fn set_words(&mut self, i: usize, j: usize, words: &[u64]) -> bool {
        self.assert_cell(i, j);
        if words.len() != self.words || !mask::fits(words, self.bit_count) {
            return false;
        }
        if words.iter().all(|&w| w == 0) {
            self.cells.remove(&(i, j));
        } else {
            self.cells.insert((i, j), words.into());
        }
        true
    }

    /// Overwrite the mask from words carried as IEEE-754 bit patterns
    pub fn set_from_doubles(&mut self, i: usize, j: usize, values: &[f64]) -> bool {
        let words: Vec<u64> = values.iter().map(|x| x.to_bits()).collect();
        self.set_words(i, j, &words)
    }

    /// How many experiments support cell (i, j)
    pub fn count_bits(&self, i: usize, j: usize) -> usize {
        self.assert_cell(i, j);
        self.cells.get(&(i, j)).map_or(0, |m| mask::count_bits(m))
    }

    pub fn check(&self, i: usize, j: usize, bit: usize) -> bool {
        self.assert_cell(i, j);
        assert!(
            bit < self.bit_count,
            "bit {} out of range for {} bits",
            bit,
            self.bit_count
        );
        self.cells
            .get(&(i, j))
            .is_some_and(|m| mask::check_bit(m, bit))
    }

    /// A copy of the mask of cell (i, j); all zeros for an empty cell
    pub fn get_all_bits(&self, i: usize, j: usize) -> Box<[u64]> {
        self.assert_cell(i, j);
        match self.cells.get(&(i, j)) {
            Some(m) => m.clone(),
            None => mask::zeros(self.bit_count),
        }
    }

    /// Read-only view of a non-empty cell
    pub fn mask(&self, i: usize, j: usize) -> Option<&[u64]> {
        self.cells.get(&(i, j)).map(|m| m.as_ref())
    }

    pub fn num_nonempty_cells(&self) -> usize {
        self.cells.len()
    }

    /// Non-empty cells sorted by (row, col)
    pub fn nonempty_cells(&self) -> Vec<(usize, usize, &[u64])> {
        let mut ret: Vec<_> = self
            .cells
            .iter()
            .map(|(&(i, j), m)| (i, j, m.as_ref()))
            .collect();
        ret.sort_by_key(|&(i, j, _)| (i, j));
        ret
    }

    ///
    /// Write the matrix as tab-separated text (gzipped if `.gz`)
    ///
    /// ```text
    /// rows  cols  bit_count
    /// row names...
    /// column names...
    /// row  col  hex words...
    /// ```
    ///
    pub fn to_file(&self, file: &str) -> Result<()> {
        let join = |names: &[i64]| -> Box<str> {
            names
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join("\t")
                .into_boxed_str()
        };

        let mut lines: Vec<Box<str>> = Vec::with_capacity(self.cells.len() + 3);
        lines.push(format!("{}\t{}\t{}", self.rows, self.cols, self.bit_count).into_boxed_str());
        lines.push(join(&self.row_names));
        lines.push(join(&self.col_names));

        for (i, j, words) in self.nonempty_cells() {
            let hex = words
                .iter()
                .map(|w| format!("{:x}", w))
                .collect::<Vec<_>>()
                .join("\t");
            lines.push(format!("{}\t{}\t{}", i, j, hex).into_boxed_str());
        }

        write_lines(&lines, file)?;
        Ok(())
    }

    /// Read a matrix written by [`CompressedBitMatrix::to_file`]. Every
    /// line is validated before the matrix is built, so any malformed
    /// line fails the whole load.
    pub fn from_file(file: &str) -> Result<Self> {
        let lines = read_lines(file)?;
        Self::from_lines(&lines)
    }

    pub fn from_lines(lines: &[Box<str>]) -> Result<Self> {
        let (rows, cols, bit_count) = parse_configuration(lines.first().map(|x| x.as_ref()))?;
        let row_names = parse_names(lines.get(1), Section::RowNames, 2, rows)?;
        let col_names = parse_names(lines.get(2), Section::ColumnNames, 3, cols)?;

        let mut cells: Vec<(usize, usize, Vec<u64>)> = Vec::with_capacity(lines.len());
        let mut seen: HashMap<(usize, usize), usize> = HashMap::default();

        for (k, line) in lines.iter().enumerate().skip(3) {
            let lineno = k + 1;
            if line.trim().is_empty() {
                continue;
            }
            let cell = parse_cell(line, lineno, rows, cols, bit_count)?;
            if let Some(prev) = seen.insert((cell.0, cell.1), lineno) {
                return Err(BitMatrixError::format(
                    Section::Data,
                    lineno,
                    format!("cell ({}, {}) already given at line {}", cell.0, cell.1, prev),
                ));
            }
            cells.push(cell);
        }

        let mut ret = Self::new(rows, cols, bit_count);
        for name in row_names {
            ret.add_row_name(name)?;
        }
        for name in col_names {
            ret.add_column_name(name)?;
        }
        for (i, j, words) in cells {
            ret.set_words(i, j, &words);
        }
        Ok(ret)
    }
}

fn parse_configuration(line: Option<&str>) -> Result<(usize, usize, usize)> {
    let err = |msg: String| BitMatrixError::format(Section::Configuration, 1, msg);
    let line = line.ok_or_else(|| err("missing header".into()))?;
    let words: Vec<&str> = line.split('\t').collect();
    if words.len() != 3 {
        return Err(err(format!(
            "expected rows, cols, bit count; found {} fields",
            words.len()
        )));
    }
    let mut dims = [0_usize; 3];
    for (d, w) in dims.iter_mut().zip(&words) {
        if w.trim().is_empty() {
            return Err(err("empty element".into()));
        }
        *d = w
            .trim()
            .parse::<usize>()
            .map_err(|e| err(format!("'{}': {}", w, e)))?;
    }
    Ok((dims[0], dims[1], dims[2]))
}

fn parse_names(
    line: Option<&Box<str>>,
    section: Section,
    lineno: usize,
    capacity: usize,
) -> Result<Vec<i64>> {
    let line = line.ok_or_else(|| BitMatrixError::format(section, lineno, "missing line"))?;
    if line.trim().is_empty() {
        return Ok(vec![]);
    }
    let names = line
        .split('\t')
        .map(|w| {
            if w.trim().is_empty() {
                return Err(BitMatrixError::format(section, lineno, "empty element"));
            }
            w.trim()
                .parse::<i64>()
                .map_err(|e| BitMatrixError::format(section, lineno, format!("'{}': {}", w, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    if names.len() > capacity {
        return Err(BitMatrixError::format(
            section,
            lineno,
            format!("{} names for {} slots", names.len(), capacity),
        ));
    }
    let mut seen = fnv::FnvHashSet::default();
    for n in names.iter() {
        if !seen.insert(*n) {
            return Err(BitMatrixError::format(
                section,
                lineno,
                format!("duplicate name {}", n),
            ));
        }
    }
    Ok(names)
}

fn parse_cell(
    line: &str,
    lineno: usize,
    rows: usize,
    cols: usize,
    bit_count: usize,
) -> Result<(usize, usize, Vec<u64>)> {
    let nwords = mask::words_for(bit_count);
    let err = |msg: String| BitMatrixError::format(Section::Data, lineno, msg);
    let words: Vec<&str> = line.split('\t').collect();
    if words.len() != nwords + 2 {
        return Err(err(format!(
            "expected {} fields, found {}",
            nwords + 2,
            words.len()
        )));
    }
    if words.iter().any(|w| w.trim().is_empty()) {
        return Err(err("empty element".into()));
    }
    let index = |w: &str, bound: usize| -> Result<usize> {
        let x = w
            .trim()
            .parse::<usize>()
            .map_err(|e| err(format!("'{}': {}", w, e)))?;
        if x >= bound {
            return Err(err(format!("index {} out of range {}", x, bound)));
        }
        Ok(x)
    };
    let i = index(words[0], rows)?;
    let j = index(words[1], cols)?;
    let bits = words[2..]
        .iter()
        .map(|w| u64::from_str_radix(w.trim(), 16).map_err(|e| err(format!("'{}': {}", w, e))))
        .collect::<Result<Vec<_>>>()?;
    if !mask::fits(&bits, bit_count) {
        return Err(err(format!("bits set past bit count {}", bit_count)));
    }
    Ok((i, j, bits))
}
