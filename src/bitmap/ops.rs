//! 位图位操作实现
//!
//! 分配位图的字粒度操作（缓存池的公共入口按 32 位字交付数据）
//! 以及供区域统计使用的字节粒度扫描。

/// 测试 32 位字中的某一位
///
/// # 参数
///
/// * `word` - 位图字
/// * `bit` - 字内位索引（0..32）
#[inline]
pub fn word_test(word: u32, bit: u32) -> bool {
    debug_assert!(bit < 32);
    (word & (1 << bit)) != 0
}

/// 设置 32 位字中的某一位，返回新值
#[inline]
pub fn word_set(word: u32, bit: u32) -> u32 {
    debug_assert!(bit < 32);
    word | (1 << bit)
}

/// 清除 32 位字中的某一位，返回新值
#[inline]
pub fn word_clear(word: u32, bit: u32) -> u32 {
    debug_assert!(bit < 32);
    word & !(1 << bit)
}

/// 测试字节缓冲区中某一位是否被设置
///
/// 位图字为小端 u32，因此字视图和字节视图的位编号一致。
///
/// # 参数
///
/// * `bitmap` - 位图数据
/// * `index` - 位索引（从 0 开始）
pub fn test_bit(bitmap: &[u8], index: u32) -> bool {
    let byte_index = (index / 8) as usize;
    let bit_offset = (index % 8) as u8;

    if byte_index >= bitmap.len() {
        return false;
    }

    (bitmap[byte_index] & (1 << bit_offset)) != 0
}

/// 统计位图中从 start 到 end 范围内已分配（置 1）的位数
///
/// # 参数
///
/// * `bitmap` - 位图数据
/// * `start` - 开始位置（从 0 开始）
/// * `end` - 结束位置（不包含）
pub fn count_used(bitmap: &[u8], start: u32, end: u32) -> u32 {
    let max_bits = (bitmap.len() * 8) as u32;
    let end = end.min(max_bits);
    let mut count = 0;

    for i in start..end {
        if test_bit(bitmap, i) {
            count += 1;
        }
    }

    count
}

/// 在位图中查找第一个空闲位（值为 0 的位）
///
/// # 参数
///
/// * `bitmap` - 位图数据
/// * `start` - 开始搜索的位置（从 0 开始）
/// * `end` - 结束位置（不包含）
///
/// # 返回
///
/// 成功返回第一个空闲位的索引，如果没有找到返回 None
pub fn find_first_free(bitmap: &[u8], start: u32, end: u32) -> Option<u32> {
    let max_bits = (bitmap.len() * 8) as u32;
    let end = end.min(max_bits);

    for i in start..end {
        if !test_bit(bitmap, i) {
            return Some(i);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_operations() {
        let mut word = 0u32;

        assert!(!word_test(word, 0));
        word = word_set(word, 0);
        assert!(word_test(word, 0));

        word = word_set(word, 31);
        assert!(word_test(word, 31));
        assert_eq!(word, 0x8000_0001);

        word = word_clear(word, 0);
        assert!(!word_test(word, 0));
        assert!(word_test(word, 31));
    }

    #[test]
    fn test_byte_bit() {
        let bitmap = [0b0000_0100u8, 0b1000_0000];

        assert!(!test_bit(&bitmap, 0));
        assert!(test_bit(&bitmap, 2));
        assert!(test_bit(&bitmap, 15));
        // 超出范围视为未设置
        assert!(!test_bit(&bitmap, 16));
    }

    #[test]
    fn test_count_used() {
        let mut bitmap = [0u8; 4]; // 32 bits

        assert_eq!(count_used(&bitmap, 0, 32), 0);

        bitmap[0] = 0b0010_0001; // 位 0 和 5
        bitmap[1] = 0b0000_0100; // 位 10

        assert_eq!(count_used(&bitmap, 0, 32), 3);
        assert_eq!(count_used(&bitmap, 1, 32), 2);
        // end 超出范围会被截断
        assert_eq!(count_used(&bitmap, 0, 100), 3);
    }

    #[test]
    fn test_find_first_free() {
        let mut bitmap = [0xFFu8; 4]; // 全部已分配

        assert_eq!(find_first_free(&bitmap, 0, 32), None);

        bitmap[1] = 0b1111_1011; // 位 10 空闲
        assert_eq!(find_first_free(&bitmap, 0, 32), Some(10));
        assert_eq!(find_first_free(&bitmap, 11, 32), None);
    }

    #[test]
    fn test_word_byte_views_agree() {
        // 小端布局下，字 1 的位 5 等于字节 4 的位 5
        let word = word_set(0, 5);
        let mut bitmap = [0u8; 8];
        bitmap[4..8].copy_from_slice(&word.to_le_bytes());

        assert!(test_bit(&bitmap, 32 + 5));
        assert_eq!(count_used(&bitmap, 0, 64), 1);
    }
}
