//! 分区位图批量初始化
//!
//! 对应原版 fsck 的 `pfsBitmapPartInit()`：在新格式化的卷上铺设
//! 全零的分配位图。卷的组数可以远超缓存池容量，超出的部分复用
//! 最后一个槽的缓冲区流式写出，内存占用不随卷大小增长。

use crate::consts::{GROUP_SHIFT, PARTIAL_GROUP_BYTE_MASK};
use crate::device::SectorDevice;
use crate::error::{Error, ErrorKind, Result};
use crate::pool::{BitmapPool, SlotFlags};

/// 卷的总块数对应的位图组数
///
/// 完整的 2^20 块组数，加上按字节粒度判断的不满一组的余数。
/// 余数判断沿用原版的字节粒度：不足一个字节的尾部块不会单独
/// 产生一个组。
pub fn partition_group_count(total_blocks: u32) -> u32 {
    (total_blocks >> GROUP_SHIFT) + u32::from((total_blocks >> 3) & PARTIAL_GROUP_BYTE_MASK != 0)
}

impl<D: SectorDevice> BitmapPool<D> {
    /// 在整个卷上铺设全零的分配位图
    ///
    /// 每个数据槽被清零并依次指派组 0..capacity-1，空闲队列按槽序
    /// 重建。之后：
    ///
    /// - 组数小于池容量时，不发出任何写入；落在卷内的零模板槽被
    ///   标记为脏，由下一次驱逐或 [`BitmapPool::flush`] /
    ///   [`BitmapPool::close`] 落盘。
    /// - 组数不小于池容量时，先写出每个槽，再复用最后一个槽的
    ///   缓冲区流式写出其余各组；任何一次传输失败都立即中止并
    ///   传播错误。
    ///
    /// # 参数
    ///
    /// * `total_blocks` - 新卷的可寻址块总数
    ///
    /// # 错误
    ///
    /// 仍有槽被持有时返回 [`ErrorKind::InvalidState`]；
    /// 传输失败返回 [`ErrorKind::Io`]。
    pub fn init_partition(&mut self, total_blocks: u32) -> Result<()> {
        if self.slots_mut().iter().any(|s| s.is_referenced()) {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "cannot format while slots are held",
            ));
        }

        let group_count = partition_group_count(total_blocks);
        let capacity = self.capacity();
        log::debug!(
            "[BITMAP] init_partition total_blocks={} group_count={}",
            total_blocks,
            group_count
        );

        for (i, slot) in self.slots_mut().iter_mut().enumerate() {
            slot.data.fill(0);
            slot.group = i as u32;
            slot.refcount = 0;
            slot.flags = SlotFlags::VALID;
        }
        self.reset_free_order();

        if (group_count as usize) < capacity {
            // 整个位图可容纳于池中：零模板留在内存里延迟落盘。
            // 组号超出卷范围的槽保持干净，不会被写出。
            for slot in self.slots_mut().iter_mut() {
                if slot.group < group_count {
                    slot.mark_dirty();
                }
            }
            return Ok(());
        }

        for idx in 0..capacity {
            self.write_back(idx)?;
        }

        // 复用最后一个槽（缓冲区已是全零）写出其余各组
        let last = capacity - 1;
        for group in capacity as u32..group_count {
            self.slots_mut()[last].group = group;
            self.write_back(last)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{BLOCKS_PER_GROUP, GROUP_BYTES, SECTOR_SIZE};
    use alloc::vec::Vec;

    struct MockDevice {
        storage: Vec<u8>,
        write_sectors_log: Vec<u64>,
        // 每次写入是否为全零缓冲区
        write_was_zeroed: Vec<bool>,
        fail_after_writes: Option<usize>,
    }

    impl MockDevice {
        fn new(groups: usize) -> Self {
            Self {
                storage: alloc::vec![0xAAu8; groups * GROUP_BYTES],
                write_sectors_log: Vec::new(),
                write_was_zeroed: Vec::new(),
                fail_after_writes: None,
            }
        }
    }

    impl SectorDevice for MockDevice {
        fn total_sectors(&self) -> u64 {
            (self.storage.len() / SECTOR_SIZE as usize) as u64
        }

        fn read_sectors(&mut self, sector: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
            let start = (sector * SECTOR_SIZE as u64) as usize;
            let len = (count * SECTOR_SIZE) as usize;
            buf[..len].copy_from_slice(&self.storage[start..start + len]);
            Ok(len)
        }

        fn write_sectors(&mut self, sector: u64, count: u32, buf: &[u8]) -> Result<usize> {
            if let Some(limit) = self.fail_after_writes {
                if self.write_sectors_log.len() >= limit {
                    return Err(Error::new(ErrorKind::Io, "injected write failure"));
                }
            }
            let start = (sector * SECTOR_SIZE as u64) as usize;
            let len = (count * SECTOR_SIZE) as usize;
            self.storage[start..start + len].copy_from_slice(&buf[..len]);
            self.write_sectors_log.push(sector);
            self.write_was_zeroed.push(buf.iter().all(|&b| b == 0));
            Ok(len)
        }
    }

    fn pool(groups: usize, capacity: usize) -> BitmapPool<MockDevice> {
        BitmapPool::with_capacity(MockDevice::new(groups), capacity).unwrap()
    }

    #[test]
    fn test_group_count() {
        assert_eq!(partition_group_count(0), 0);
        assert_eq!(partition_group_count(BLOCKS_PER_GROUP), 1);
        // 尾部不足一个字节的块不产生额外的组（字节粒度余数）
        assert_eq!(partition_group_count(BLOCKS_PER_GROUP + 7), 1);
        assert_eq!(partition_group_count(BLOCKS_PER_GROUP + 8), 2);
        // 2.5 组 → 3 组
        assert_eq!(partition_group_count(2_621_440), 3);
        // 6 组整
        assert_eq!(partition_group_count(6_291_456), 6);
    }

    #[test]
    fn test_small_volume_no_writes() {
        // 3 组 < 容量 4，初始化期间不发出任何写入
        let mut pool = pool(4, 4);

        pool.init_partition(2_621_440).unwrap();
        assert!(pool.device().write_sectors_log.is_empty());

        // 零模板驻留在池中，组 0..=2 为脏等待落盘
        let mut resident = pool.resident_groups();
        resident.sort_unstable();
        assert_eq!(resident, alloc::vec![0, 1, 2, 3]);

        // flush 只写出落在卷内的 3 个组
        assert_eq!(pool.flush().unwrap(), 3);
        assert_eq!(pool.device().write_sectors_log, alloc::vec![0, 256, 512]);
        assert!(pool.device().write_was_zeroed.iter().all(|&z| z));
    }

    #[test]
    fn test_large_volume_streams_writes() {
        // 6 组 >= 容量 4，先写 4 个槽，再复用末槽写组 4、5
        let mut pool = pool(6, 4);

        pool.init_partition(6_291_456).unwrap();

        let writes = &pool.device().write_sectors_log;
        assert_eq!(*writes, alloc::vec![0, 256, 512, 768, 1024, 1280]);
        assert!(pool.device().write_was_zeroed.iter().all(|&z| z));

        // 初始化后没有遗留脏槽
        assert_eq!(pool.flush().unwrap(), 0);

        // 盘上整个位图区域已清零
        let bitmap_bytes = 6 * GROUP_BYTES;
        assert!(pool.device().storage[..bitmap_bytes].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fails_fast_on_transport_error() {
        let mut pool = pool(6, 4);
        pool.device_mut().fail_after_writes = Some(2);

        let err = pool.init_partition(6_291_456).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        // 前两次写出已完成，第三次失败后立即中止
        assert_eq!(pool.device().write_sectors_log, alloc::vec![0, 256]);
    }

    #[test]
    fn test_refuses_held_slots() {
        let mut pool = pool(2, 2);

        let h = pool.acquire(0).unwrap();
        let err = pool.init_partition(BLOCKS_PER_GROUP).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        pool.release(h).unwrap();
    }

    #[test]
    fn test_format_then_checker_pass() {
        // 格式化之后，检查逻辑看到的位图是全零的
        let mut pool = pool(6, 4);
        pool.init_partition(6_291_456).unwrap();

        assert!(!pool.block_in_use(0).unwrap());
        assert!(!pool.block_in_use(5 * BLOCKS_PER_GROUP + 123).unwrap());

        // 标记一个块再读回
        assert!(!pool.mark_block(4 * BLOCKS_PER_GROUP).unwrap());
        assert!(pool.block_in_use(4 * BLOCKS_PER_GROUP).unwrap());
    }
}
