//! Bit operations over experiment masks stored as 64-bit words.
//!
//! Bit `e` lives in word `e / 64` at position `e % 64`. All binary
//! operations require masks of equal length and panic otherwise.

pub const BITS_PER_WORD: usize = 64;

/// Number of words needed to hold `bit_count` bits
pub fn words_for(bit_count: usize) -> usize {
    bit_count.div_ceil(BITS_PER_WORD)
}

fn check_len(a: &[u64], b: &[u64]) {
    assert_eq!(
        a.len(),
        b.len(),
        "mask length mismatch: {} vs {} words",
        a.len(),
        b.len()
    );
}

pub fn and(a: &[u64], b: &[u64]) -> Box<[u64]> {
    check_len(a, b);
    a.iter().zip(b).map(|(x, y)| x & y).collect()
}

pub fn or(a: &[u64], b: &[u64]) -> Box<[u64]> {
    check_len(a, b);
    a.iter().zip(b).map(|(x, y)| x | y).collect()
}

/// `a &= b`
pub fn and_assign(a: &mut [u64], b: &[u64]) {
    check_len(a, b);
    a.iter_mut().zip(b).for_each(|(x, y)| *x &= y);
}

/// `a |= b`
pub fn or_assign(a: &mut [u64], b: &[u64]) {
    check_len(a, b);
    a.iter_mut().zip(b).for_each(|(x, y)| *x |= y);
}

/// Population count
pub fn count_bits(a: &[u64]) -> usize {
    a.iter().map(|x| x.count_ones() as usize).sum()
}

/// `count_bits(and(a, b))` without allocating
pub fn overlap_bits(a: &[u64], b: &[u64]) -> usize {
    check_len(a, b);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x & y).count_ones() as usize)
        .sum()
}

/// Is bit `i` set? Panics if `i` is beyond the mask.
pub fn check_bit(a: &[u64], i: usize) -> bool {
    let w = i / BITS_PER_WORD;
    assert!(w < a.len(), "bit {} out of range for {} words", i, a.len());
    (a[w] >> (i % BITS_PER_WORD)) & 1 == 1
}

pub fn set_bit(a: &mut [u64], i: usize) {
    let w = i / BITS_PER_WORD;
    assert!(w < a.len(), "bit {} out of range for {} words", i, a.len());
    a[w] |= 1_u64 << (i % BITS_PER_WORD);
}

pub fn equals(a: &[u64], b: &[u64]) -> bool {
    check_len(a, b);
    a == b
}

/// Every bit of `a` is also set in `b`
pub fn is_subset(a: &[u64], b: &[u64]) -> bool {
    check_len(a, b);
    a.iter().zip(b).all(|(x, y)| x & !y == 0)
}

/// Indices of the set bits in increasing order
pub fn iter_ones(a: &[u64]) -> impl Iterator<Item = usize> + '_ {
    a.iter().enumerate().flat_map(|(w, &word)| {
        let mut word = word;
        std::iter::from_fn(move || {
            if word == 0 {
                None
            } else {
                let b = word.trailing_zeros() as usize;
                word &= word - 1;
                Some(w * BITS_PER_WORD + b)
            }
        })
    })
}

/// An all-zero mask for `bit_count` bits
pub fn zeros(bit_count: usize) -> Box<[u64]> {
    vec![0_u64; words_for(bit_count)].into_boxed_slice()
}

/// A mask with the given bits set
pub fn from_bits(bit_count: usize, bits: &[usize]) -> Box<[u64]> {
    let mut ret = zeros(bit_count);
    for &b in bits {
        assert!(b < bit_count, "bit {} out of range for {} bits", b, bit_count);
        set_bit(&mut ret, b);
    }
    ret
}

/// True when no bit at or above `bit_count` is set
pub fn fits(a: &[u64], bit_count: usize) -> bool {
    let full = bit_count / BITS_PER_WORD;
    let rem = bit_count % BITS_PER_WORD;
    a.iter().enumerate().all(|(k, &w)| {
        if k < full {
            true
        } else if k == full && rem > 0 {
            w >> rem == 0
        } else {
            w == 0
        }
    })
}
