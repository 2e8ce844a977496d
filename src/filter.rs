use crate::FuzzResult;
use std::collections::HashSet;

/// 需要隐藏的值，每个维度一个集合；空集合不隐藏任何结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HideFilters {
    pub status_codes: HashSet<u16>,
    pub content_lengths: HashSet<u64>,
    pub num_words: HashSet<usize>,
    pub num_lines: HashSet<usize>,
    pub header_sizes: HashSet<usize>,
}

impl HideFilters {
    /// 结果的所有维度都不在隐藏集合中时返回true
    pub fn is_visible(&self, result: &FuzzResult) -> bool {
        !self.status_codes.contains(&result.status_code)
            && !self.content_lengths.contains(&result.content_length)
            && !self.num_words.contains(&result.num_words)
            && !self.num_lines.contains(&result.num_lines)
            && !self.header_sizes.contains(&result.header_size)
    }
}
