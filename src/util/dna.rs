pub const SIGMA: usize = 6; // {0:$, 1:A, 2:C, 3:G, 4:T, 5:N}

/// 序列分隔符（$）
pub const SEP: u8 = 0;
/// 模糊碱基 N
pub const AMBIG: u8 = 5;
/// 图游走的分支顺序：A, C, G, T
pub const BASES: [u8; 4] = [1, 2, 3, 4];

#[inline]
pub fn to_alphabet(b: u8) -> u8 {
    if b == 0 { return 0; }
    match b.to_ascii_uppercase() {
        b'A' => 1,
        b'C' => 2,
        b'G' => 3,
        b'T' | b'U' => 4,
        b'N' => 5,
        _ => 5, // map others to N
    }
}

#[inline]
pub fn from_alphabet(a: u8) -> u8 {
    match a {
        0 => b'$',
        1 => b'A',
        2 => b'C',
        3 => b'G',
        4 => b'T',
        _ => b'N',
    }
}

#[inline]
pub fn is_base(a: u8) -> bool {
    (1..=4).contains(&a)
}

/// 编码后的互补碱基；分隔符和 N 保持不变
#[inline]
pub fn complement(a: u8) -> u8 {
    if is_base(a) { 5 - a } else { a }
}

pub fn encode(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .filter(|b| !b.is_ascii_whitespace())
        .map(|&b| to_alphabet(b))
        .collect()
}

pub fn decode(codes: &[u8]) -> Vec<u8> {
    codes.iter().map(|&a| from_alphabet(a)).collect()
}

pub fn revcomp(codes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(codes.len());
    for &a in codes.iter().rev() {
        out.push(complement(a));
    }
    out
}

/// 在 `out` 中写入反向互补，复用缓冲区
pub fn revcomp_into(codes: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(codes.iter().rev().map(|&a| complement(a)));
}

/// 正反两条链中字典序较小者（正向相等或更小时返回 true）
pub fn is_canonical(codes: &[u8]) -> bool {
    let fwd = codes.iter();
    let rev = codes.iter().rev().map(|&a| complement(a));
    for (a, b) in fwd.zip(rev) {
        if *a != b {
            return *a < b;
        }
    }
    true
}

pub fn canonical(codes: &[u8]) -> Vec<u8> {
    if is_canonical(codes) { codes.to_vec() } else { revcomp(codes) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_with_ambiguity() {
        let codes = encode(b"acgtNx");
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 5]);
        assert_eq!(decode(&codes), b"ACGTNN");
    }

    #[test]
    fn revcomp_keeps_n() {
        let codes = encode(b"AACGN");
        assert_eq!(decode(&revcomp(&codes)), b"NCGTT");
    }

    #[test]
    fn canonical_picks_smaller_strand() {
        let fwd = encode(b"TTGCA");
        // revcomp = TGCAA, smaller than TTGCA
        assert!(!is_canonical(&fwd));
        assert_eq!(decode(&canonical(&fwd)), b"TGCAA");

        let pal = encode(b"ACGT");
        assert!(is_canonical(&pal));
        assert_eq!(canonical(&pal), pal);
    }
}
