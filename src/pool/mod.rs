//! 位图组缓存池
//!
//! 这个模块提供了分配位图的固定容量缓存池，对应原版 fsck 的
//! `bitmap.c` 核心（`pfsBitmapRead` / `pfsBitmapFree` /
//! `pfsGetBitmapEntry` / `pfsBitmapPartInit`）。
//!
//! # 主要组件
//!
//! - [`BitmapSlot`] - 单个缓存槽，持有一组位图数据和元数据
//! - [`BitmapPool`] - 缓存池管理器，实现获取/释放/驱逐/写回策略
//! - [`SlotFlags`] - 缓存槽状态标志
//! - [`PoolStats`] - 缓存统计信息
//!
//! # 与原版 C 实现的对应关系
//!
//! | fsck C                       | pfsck_core                          |
//! |------------------------------|-------------------------------------|
//! | `pfs_bitmap_t`               | [`BitmapSlot`]                      |
//! | `pfsBitmapData`（全局数组）  | `BitmapPool::slots`（拥有值）       |
//! | 哨兵 + `next`/`prev` 环      | `BitmapPool::free`（索引队列）      |
//! | `pfsBitmapRead()`            | [`BitmapPool::acquire()`]           |
//! | `pfsBitmapFree()`            | [`BitmapPool::release()`]           |
//! | `pfsGetBitmapEntry()`        | [`BitmapPool::with_bit_word()`]     |
//! | `pfsBitmapTransfer()`        | *(内部 `write_back`/`load`)*        |
//! | `pfsBitmapPartInit()`        | [`BitmapPool::init_partition()`]    |
//! | `pfsBitmapInit()`            | [`BitmapPool::new()`]               |
//!
//! # 设计要点
//!
//! 原版的 `pfsGetBitmapEntry()` 在释放槽之后才把字指针交给调用方，
//! 只有在严格单线程、无交错的前提下才是安全的。这里改为作用域借用：
//! [`BitmapPool::with_bit_word()`] 在闭包执行期间始终持有槽，
//! 闭包返回后才释放，不存在已释放仍被使用的引用。
//!
//! 驱逐策略是按释放顺序的纯 LRU：槽在引用计数降为 0 时进入空闲
//! 队列尾部，驱逐总是取队首（最早释放的槽）。命中一个空闲槽会把它
//! 从队列中摘除，因此正在被持有的槽永远不会被驱逐。

mod format;
mod slot;

pub use format::partition_group_count;
pub use slot::{BitmapSlot, SlotFlags};

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

use crate::bitmap::{addr, ops};
use crate::consts::{DEFAULT_POOL_SLOTS, GROUP_SECTORS, WORDS_PER_GROUP};
use crate::device::SectorDevice;
use crate::error::{Error, ErrorKind, Result};

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// 总获取次数
    pub total_accesses: u64,
    /// 缓存命中次数
    pub hits: u64,
    /// 缓存未命中次数
    pub misses: u64,
    /// 脏槽写回次数
    pub writebacks: u64,
    /// 从设备加载次数
    pub loads: u64,
}

impl PoolStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// 已获取槽的句柄
///
/// 只能通过 [`BitmapPool::acquire()`] 获得，必须通过
/// [`BitmapPool::release()`] 归还。句柄存活期间对应槽的
/// 组号和缓冲区不会改变。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle(usize);

impl SlotHandle {
    #[inline]
    fn index(self) -> usize {
        self.0
    }
}

/// 位图组缓存池
///
/// 固定容量、引用计数、脏跟踪的位图组缓存。内存占用被限制为
/// 常数个组（默认 4 组 = 512 KiB），与卷大小无关。
///
/// 池是一个拥有设备的普通值，在启动时构造一次，通过引用传给
/// 所有调用方；没有任何全局状态。
pub struct BitmapPool<D> {
    /// 数据槽数组（固定容量）
    slots: Vec<BitmapSlot>,

    /// 空闲槽索引队列：队首 = 最早释放 = 下一个驱逐候选
    free: VecDeque<usize>,

    /// 后备设备
    device: D,

    /// 严格模式：把重复释放从"记录后忽略"提升为硬错误
    strict: bool,

    /// 统计信息
    stats: PoolStats,
}

impl<D: SectorDevice> BitmapPool<D> {
    /// 创建默认容量（4 个数据槽）的缓存池
    ///
    /// 打开后备设备；打开失败返回 [`ErrorKind::ResourceUnavailable`]。
    pub fn new(device: D) -> Result<Self> {
        Self::with_capacity(device, DEFAULT_POOL_SLOTS)
    }

    /// 创建指定容量的缓存池
    ///
    /// # 参数
    ///
    /// * `device` - 后备扇区设备
    /// * `capacity` - 数据槽数量（必须 > 0）
    pub fn with_capacity(mut device: D, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "pool capacity must be at least one slot",
            ));
        }

        if device.open().is_err() {
            return Err(Error::new(
                ErrorKind::ResourceUnavailable,
                "could not open backing device",
            ));
        }

        let mut slots = Vec::with_capacity(capacity);
        let mut free = VecDeque::with_capacity(capacity);
        for i in 0..capacity {
            slots.push(BitmapSlot::new());
            free.push_back(i);
        }

        Ok(Self {
            slots,
            free,
            device,
            strict: false,
            stats: PoolStats::default(),
        })
    }

    /// 获取指定组的缓存槽
    ///
    /// 如果该组已驻留，直接增加引用计数返回；否则驱逐最早释放的
    /// 空闲槽（必要时先写回脏数据），从设备加载请求的组。
    ///
    /// # 错误
    ///
    /// - [`ErrorKind::CapacityExhausted`] - 所有槽都被持有，
    ///   且不改变任何槽的状态
    /// - [`ErrorKind::Io`] - 写回或加载失败；写回失败时驱逐候选
    ///   保持原状（可以重试），加载失败时该槽的驻留被标记为无效
    pub fn acquire(&mut self, group: u32) -> Result<SlotHandle> {
        self.stats.total_accesses += 1;

        // 命中路径：同一组最多只有一个驻留副本
        if let Some(idx) = self
            .slots
            .iter()
            .position(|s| s.is_valid() && s.group == group)
        {
            self.stats.hits += 1;
            if self.slots[idx].refcount == 0 {
                if let Some(pos) = self.free.iter().position(|&f| f == idx) {
                    self.free.remove(pos);
                }
            }
            self.slots[idx].refcount += 1;
            log::trace!(
                "[BITMAP] acquire group={} HIT slot={} refcount={}",
                group,
                idx,
                self.slots[idx].refcount
            );
            return Ok(SlotHandle(idx));
        }

        self.stats.misses += 1;

        let idx = match self.free.front().copied() {
            Some(idx) => idx,
            None => {
                log::error!(
                    "[BITMAP] acquire group={}: all {} slots are held",
                    group,
                    self.slots.len()
                );
                return Err(Error::new(
                    ErrorKind::CapacityExhausted,
                    "all bitmap slots are held",
                ));
            }
        };

        // 写回失败时不动候选槽，调用方可以重试
        if self.slots[idx].is_dirty() {
            self.write_back(idx)?;
        }

        self.free.pop_front();
        {
            let slot = &mut self.slots[idx];
            log::debug!(
                "[BITMAP] acquire group={} MISS, evict slot={} (old group={})",
                group,
                idx,
                slot.group
            );
            slot.group = group;
            slot.flags = SlotFlags::VALID;
            slot.refcount = 1;
        }

        if let Err(e) = self.load(idx) {
            // 加载失败：组号不再可信，槽退回空闲队列队首
            let slot = &mut self.slots[idx];
            slot.invalidate();
            slot.refcount = 0;
            self.free.push_front(idx);
            return Err(e);
        }

        Ok(SlotHandle(idx))
    }

    /// 释放一个已获取的槽
    ///
    /// 引用计数降为 0 时槽进入空闲队列尾部（最晚被驱逐），
    /// 缓冲区内容保留，同一组的后续获取可以直接命中。
    ///
    /// 对引用计数已为 0 的槽调用是调用方的逻辑错误：记录诊断后
    /// 不做任何状态改变；严格模式下返回 [`ErrorKind::InvalidState`]。
    pub fn release(&mut self, handle: SlotHandle) -> Result<()> {
        let idx = handle.index();
        let slot = &mut self.slots[idx];

        if slot.refcount == 0 {
            log::error!(
                "[BITMAP] release on unreferenced slot (slot={} group={})",
                idx,
                slot.group
            );
            if self.strict {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    "release on unreferenced slot",
                ));
            }
            return Ok(());
        }

        slot.refcount -= 1;
        if slot.refcount == 0 {
            self.free.push_back(idx);
        }
        Ok(())
    }

    /// 读取已持有槽中的一个位图字
    ///
    /// # 参数
    ///
    /// * `handle` - 已获取槽的句柄
    /// * `word` - 组内字索引（0..32768）
    pub fn read_word(&self, handle: SlotHandle, word: usize) -> Result<u32> {
        if word >= WORDS_PER_GROUP {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "word index out of range",
            ));
        }
        let slot = &self.slots[handle.index()];
        if !slot.is_referenced() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "slot handle is not held",
            ));
        }
        Ok(LittleEndian::read_u32(&slot.data[word * 4..word * 4 + 4]))
    }

    /// 写入已持有槽中的一个位图字并标记脏
    ///
    /// # 参数
    ///
    /// * `handle` - 已获取槽的句柄
    /// * `word` - 组内字索引（0..32768）
    /// * `value` - 新的字值
    pub fn write_word(&mut self, handle: SlotHandle, word: usize, value: u32) -> Result<()> {
        if word >= WORDS_PER_GROUP {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "word index out of range",
            ));
        }
        let slot = &mut self.slots[handle.index()];
        if !slot.is_referenced() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "slot handle is not held",
            ));
        }
        LittleEndian::write_u32(&mut slot.data[word * 4..word * 4 + 4], value);
        slot.mark_dirty();
        Ok(())
    }

    /// 对包含指定块状态位的位图字执行一次作用域访问
    ///
    /// 获取块所属的组，把包含该块状态位的 32 位字交给闭包；闭包
    /// 返回后，只有在字值确实改变时才写回缓冲区并标记脏，随后释放
    /// 槽。整个访问窗口内槽都被持有，组号和缓冲区不会被驱逐改写。
    ///
    /// # 参数
    ///
    /// * `block` - 全局块号
    /// * `f` - 接收位图字可变引用的闭包
    pub fn with_bit_word<R>(&mut self, block: u32, f: impl FnOnce(&mut u32) -> R) -> Result<R> {
        let handle = self.acquire(addr::group_of(block))?;
        let off = addr::word_of(block) as usize * 4;

        let idx = handle.index();
        let before = LittleEndian::read_u32(&self.slots[idx].data[off..off + 4]);
        let mut value = before;
        let out = f(&mut value);
        if value != before {
            LittleEndian::write_u32(&mut self.slots[idx].data[off..off + 4], value);
            self.slots[idx].mark_dirty();
        }

        self.release(handle)?;
        Ok(out)
    }

    /// 测试一个块的分配位
    pub fn block_in_use(&mut self, block: u32) -> Result<bool> {
        let bit = addr::bit_of(block);
        self.with_bit_word(block, |w| ops::word_test(*w, bit))
    }

    /// 设置一个块的分配位，返回之前的值
    pub fn mark_block(&mut self, block: u32) -> Result<bool> {
        let bit = addr::bit_of(block);
        self.with_bit_word(block, |w| {
            let old = ops::word_test(*w, bit);
            *w = ops::word_set(*w, bit);
            old
        })
    }

    /// 清除一个块的分配位，返回之前的值
    pub fn clear_block(&mut self, block: u32) -> Result<bool> {
        let bit = addr::bit_of(block);
        self.with_bit_word(block, |w| {
            let old = ops::word_test(*w, bit);
            *w = ops::word_clear(*w, bit);
            old
        })
    }

    /// 写回所有脏槽
    ///
    /// # 返回
    ///
    /// 成功返回写回的槽数量
    ///
    /// # 错误
    ///
    /// 如果某个脏槽仍被持有，返回 [`ErrorKind::InvalidState`]；
    /// 传输失败立即传播。
    pub fn flush(&mut self) -> Result<usize> {
        let mut flushed = 0;
        for idx in 0..self.slots.len() {
            if !self.slots[idx].is_dirty() {
                continue;
            }
            if self.slots[idx].is_referenced() {
                return Err(Error::new(
                    ErrorKind::InvalidState,
                    "dirty slot is still held",
                ));
            }
            self.write_back(idx)?;
            flushed += 1;
        }
        Ok(flushed)
    }

    /// 关闭缓存池
    ///
    /// 先写回所有脏槽，再关闭后备设备。
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.device.close()
    }

    /// 启用或关闭严格模式
    ///
    /// 严格模式下重复释放是硬错误而不是记录后忽略的空操作。
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// 数据槽数量
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 当前空闲（未被持有）的槽数量
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// 当前驻留有效的组索引集合
    pub fn resident_groups(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter(|s| s.is_valid())
            .map(|s| s.group)
            .collect()
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> PoolStats {
        self.stats.clone()
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取底层设备的可变引用
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    // 内部辅助方法

    /// 按槽当前的组号写回其缓冲区并标记干净
    pub(crate) fn write_back(&mut self, idx: usize) -> Result<()> {
        let slot = &self.slots[idx];
        let sector = addr::group_sector(slot.group);
        log::debug!("[BITMAP] write-back slot={} group={}", idx, slot.group);
        self.device
            .write_sectors(sector, GROUP_SECTORS, &slot.data)?;
        self.slots[idx].mark_clean();
        self.stats.writebacks += 1;
        Ok(())
    }

    /// 从设备加载槽当前组号对应的位图数据
    fn load(&mut self, idx: usize) -> Result<()> {
        let sector = addr::group_sector(self.slots[idx].group);
        let slot = &mut self.slots[idx];
        log::debug!("[BITMAP] load slot={} group={}", idx, slot.group);
        self.device
            .read_sectors(sector, GROUP_SECTORS, &mut slot.data)?;
        self.stats.loads += 1;
        Ok(())
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [BitmapSlot] {
        &mut self.slots
    }

    pub(crate) fn reset_free_order(&mut self) {
        self.free.clear();
        self.free.extend(0..self.slots.len());
    }
}

impl<D> core::fmt::Debug for BitmapPool<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BitmapPool")
            .field("capacity", &self.slots.len())
            .field("free", &self.free.len())
            .field("strict", &self.strict)
            .field("stats", &self.stats)
            .finish()
    }
}
