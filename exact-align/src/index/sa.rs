/// 前缀倍增法构建后缀数组。
/// 输入为数值化文本（0 为 contig 分隔符，可出现多次），输出按真实字典序排列
/// 的后缀起点；越过文本末尾视为比任何字符都小。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<u32> = (0..n as u32).collect();
    let mut rank: Vec<i64> = text.iter().map(|&b| i64::from(b)).collect();
    let mut next_rank = vec![0i64; n];

    let mut k = 1usize;
    loop {
        let key = |i: u32, rank: &[i64]| {
            let i = i as usize;
            (rank[i], if i + k < n { rank[i + k] } else { -1 })
        };
        sa.sort_unstable_by_key(|&i| key(i, &rank));

        next_rank[sa[0] as usize] = 0;
        for w in 1..n {
            let bump = key(sa[w - 1], &rank) != key(sa[w], &rank);
            next_rank[sa[w] as usize] = next_rank[sa[w - 1] as usize] + i64::from(bump);
        }
        std::mem::swap(&mut rank, &mut next_rank);

        if rank[sa[n - 1] as usize] as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }
    sa
}

/// 由 SA 得到 BWT（循环文本，SA[i] == 0 时取末字符）。
pub fn bwt_from_sa(text: &[u8], sa: &[u32]) -> Vec<u8> {
    let n = text.len();
    sa.iter()
        .map(|&p| {
            let p = p as usize;
            if p == 0 { text[n - 1] } else { text[p - 1] }
        })
        .collect()
}
