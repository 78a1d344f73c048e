//! 位地址换算
//!
//! 全局块号到分配位图中 (组, 字, 位) 三元组的确定性映射。
//! 每组覆盖 2^20 个块，每个字 32 位，每组 32768 个字。

use crate::consts::{
    BIT_INDEX_MASK, GROUP_SECTOR_SHIFT, GROUP_SHIFT, WORD_INDEX_MASK, WORD_SHIFT,
};

/// 块号所属的位图组索引
///
/// 对应原版 fsck 中 `pfsGetBitmapEntry()` 的 `index >> 20`
#[inline]
pub fn group_of(block: u32) -> u32 {
    block >> GROUP_SHIFT
}

/// 块号在组内的字索引（0..32768）
#[inline]
pub fn word_of(block: u32) -> u32 {
    (block >> WORD_SHIFT) & WORD_INDEX_MASK
}

/// 块号在字内的位索引（0..32）
#[inline]
pub fn bit_of(block: u32) -> u32 {
    block & BIT_INDEX_MASK
}

/// 从 (组, 字, 位) 重建全局块号
///
/// 与 [`group_of`] / [`word_of`] / [`bit_of`] 互为逆运算。
#[inline]
pub fn block_of(group: u32, word: u32, bit: u32) -> u32 {
    (group << GROUP_SHIFT) | (word << WORD_SHIFT) | bit
}

/// 组 g 在后备设备上的起始扇区
#[inline]
pub fn group_sector(group: u32) -> u64 {
    (group as u64) << GROUP_SECTOR_SHIFT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BLOCKS_PER_GROUP;

    #[test]
    fn test_group_boundaries() {
        assert_eq!(group_of(0), 0);
        assert_eq!(group_of(BLOCKS_PER_GROUP - 1), 0);
        assert_eq!(group_of(BLOCKS_PER_GROUP), 1);
        assert_eq!(group_of(u32::MAX), 4095);
    }

    #[test]
    fn test_word_and_bit() {
        assert_eq!(word_of(0), 0);
        assert_eq!(bit_of(0), 0);

        // 块 37 = 字 1，位 5
        assert_eq!(word_of(37), 1);
        assert_eq!(bit_of(37), 5);

        // 组内最后一个块
        assert_eq!(word_of(BLOCKS_PER_GROUP - 1), 32767);
        assert_eq!(bit_of(BLOCKS_PER_GROUP - 1), 31);

        // 字索引在组边界处回绕
        assert_eq!(word_of(BLOCKS_PER_GROUP), 0);
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            0u32,
            1,
            31,
            32,
            37,
            BLOCKS_PER_GROUP - 1,
            BLOCKS_PER_GROUP,
            BLOCKS_PER_GROUP + 12345,
            3 * BLOCKS_PER_GROUP + 999_999,
            u32::MAX,
        ];
        for &block in &samples {
            let rebuilt = block_of(group_of(block), word_of(block), bit_of(block));
            assert_eq!(rebuilt, block);
        }

        // 扫过一段跨组区间
        for block in (BLOCKS_PER_GROUP - 64)..(BLOCKS_PER_GROUP + 64) {
            assert_eq!(block_of(group_of(block), word_of(block), bit_of(block)), block);
        }
    }

    #[test]
    fn test_group_sector() {
        assert_eq!(group_sector(0), 0);
        assert_eq!(group_sector(1), 256);
        assert_eq!(group_sector(6), 1536);
    }
}
