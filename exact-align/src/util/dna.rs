//! 碱基编码工具：ASCII 碱基与索引字母表之间的转换、反向互补。

/// 索引字母表大小 {0:$, 1:A, 2:C, 3:G, 4:T, 5:N}
pub const SIGMA: usize = 6;

/// contig 之间的分隔符
pub const SENTINEL: u8 = 0;

/// 未知碱基编码
pub const N_CODE: u8 = 5;

#[inline]
pub fn to_alphabet(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b'A' => 1,
        b'C' => 2,
        b'G' => 3,
        b'T' | b'U' => 4,
        _ => N_CODE,
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

/// 是否为确定碱基（A/C/G/T）
#[inline]
pub fn is_base(code: u8) -> bool {
    (1..=4).contains(&code)
}

pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .map(|&b| match b.to_ascii_uppercase() {
            up @ (b'A' | b'C' | b'G' | b'T') => up,
            b'U' => b'T',
            _ => b'N',
        })
        .collect()
}

/// ASCII 序列直接编码为字母表
pub fn encode(seq: &[u8]) -> Vec<u8> {
    seq.iter().map(|&b| to_alphabet(b)).collect()
}

#[inline]
pub fn complement_code(code: u8) -> u8 {
    match code {
        1..=4 => 5 - code,
        other => other,
    }
}

/// 编码序列的反向互补
pub fn revcomp_codes(codes: &[u8]) -> Vec<u8> {
    codes.iter().rev().map(|&c| complement_code(c)).collect()
}
