use crate::error::{BitMatrixError, Result, Section};

use fnv::FnvHashMap as HashMap;
use matrix_util::common_io::{read_lines, write_lines};

/// Stable assignment of experiment ids to bit positions
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExperimentIndex {
    ids: Vec<i64>,
    bits: HashMap<i64, usize>,
}

impl ExperimentIndex {
    /// Bits are assigned in the order given; repeated ids keep their first bit
    pub fn new(experiment_ids: &[i64]) -> Self {
        let mut ret = Self::default();
        for &id in experiment_ids {
            if !ret.bits.contains_key(&id) {
                ret.bits.insert(id, ret.ids.len());
                ret.ids.push(id);
            }
        }
        ret
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn bit(&self, experiment_id: i64) -> Option<usize> {
        self.bits.get(&experiment_id).copied()
    }

    pub fn experiment_id(&self, bit: usize) -> i64 {
        self.ids[bit]
    }

    pub fn experiment_ids(&self) -> &[i64] {
        &self.ids
    }

    /// One `<experiment id>\t<bit>` line per experiment
    pub fn to_file(&self, file: &str) -> Result<()> {
        let lines: Vec<Box<str>> = self
            .ids
            .iter()
            .enumerate()
            .map(|(b, id)| format!("{}\t{}", id, b).into_boxed_str())
            .collect();
        write_lines(&lines, file)?;
        Ok(())
    }

    /// Bits must form a permutation of `0..n`; any bad line fails the load
    pub fn from_file(file: &str) -> Result<Self> {
        let lines = read_lines(file)?;
        Self::from_lines(&lines)
    }

    pub fn from_lines(lines: &[Box<str>]) -> Result<Self> {
        let mut pairs: Vec<(usize, i64)> = Vec::with_capacity(lines.len());
        for (k, line) in lines.iter().enumerate() {
            let lineno = k + 1;
            let err = |msg: String| BitMatrixError::format(Section::ExperimentMap, lineno, msg);
            if line.trim().is_empty() {
                continue;
            }
            let words: Vec<&str> = line.split('\t').collect();
            if words.len() != 2 {
                return Err(err(format!("expected 2 fields, found {}", words.len())));
            }
            if words.iter().any(|w| w.trim().is_empty()) {
                return Err(err("empty element".into()));
            }
            let id = words[0]
                .trim()
                .parse::<i64>()
                .map_err(|e| err(format!("'{}': {}", words[0], e)))?;
            let bit = words[1]
                .trim()
                .parse::<usize>()
                .map_err(|e| err(format!("'{}': {}", words[1], e)))?;
            pairs.push((bit, id));
        }

        pairs.sort();
        let mut ret = Self::default();
        for (expected, &(bit, id)) in pairs.iter().enumerate() {
            if bit != expected {
                return Err(BitMatrixError::format(
                    Section::ExperimentMap,
                    0,
                    format!("bits are not contiguous: expected {}, found {}", expected, bit),
                ));
            }
            if ret.bits.insert(id, bit).is_some() {
                return Err(BitMatrixError::format(
                    Section::ExperimentMap,
                    0,
                    format!("experiment {} mapped twice", id),
                ));
            }
            ret.ids.push(id);
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_stable() {
        let idx = ExperimentIndex::new(&[30, 10, 30, 20]);
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.bit(30), Some(0));
        assert_eq!(idx.bit(20), Some(2));
        assert_eq!(idx.experiment_id(1), 10);
        assert_eq!(idx.bit(99), None);
    }

    #[test]
    fn lines_in_any_order() -> anyhow::Result<()> {
        let lines: Vec<Box<str>> = vec!["7\t1".into(), "5\t0".into()];
        let idx = ExperimentIndex::from_lines(&lines)?;
        assert_eq!(idx.experiment_ids(), &[5, 7]);
        Ok(())
    }

    #[test]
    fn gaps_and_blanks_fail() {
        let gap: Vec<Box<str>> = vec!["7\t2".into(), "5\t0".into()];
        assert!(ExperimentIndex::from_lines(&gap).is_err());
        let blank: Vec<Box<str>> = vec!["7\t".into()];
        assert!(matches!(
            ExperimentIndex::from_lines(&blank),
            Err(BitMatrixError::Format { line: 1, .. })
        ));
    }
}
