//! 位图缓存槽结构
//!
//! 对应原版 fsck 的 `pfs_bitmap_t` 结构。
//!
//! 在原版 C 实现中，`pfs_bitmap_t` 通过嵌入式 `next`/`prev` 指针
//! 挂入一个以哨兵节点锚定的环形空闲链表。在 Rust 实现中，槽本身
//! 不包含链接字段，空闲顺序由 [`crate::pool::BitmapPool`] 外部的
//! 索引队列管理，哨兵节点也随之消失。
//!
//! # 字段说明
//!
//! - `group`: 该槽当前镜像的磁盘位图组索引
//! - `data`: 一组位图数据（131072 字节）
//! - `refcount`: 引用计数，> 0 时槽不能被驱逐，组号和数据被冻结
//! - `flags`: 槽状态标志

use alloc::vec::Vec;
use bitflags::bitflags;

use crate::consts::GROUP_BYTES;

bitflags! {
    /// 缓存槽标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlotFlags: u8 {
        /// 驻留有效：`group` 与 `data` 可信（加载失败后会被清除）
        const VALID = 0x01;
        /// 数据已修改（自上次成功写回以来）
        const DIRTY = 0x02;
    }
}

/// 一个固定大小的内存内位图组副本
pub struct BitmapSlot {
    /// 当前镜像的组索引（VALID 未置位时无意义）
    pub(crate) group: u32,

    /// 组位图数据
    pub(crate) data: Vec<u8>,

    /// 引用计数
    pub(crate) refcount: u32,

    /// 槽状态标志
    pub(crate) flags: SlotFlags,
}

impl BitmapSlot {
    /// 创建新的空槽（未加载任何组）
    pub(crate) fn new() -> Self {
        Self {
            group: 0,
            data: alloc::vec![0u8; GROUP_BYTES],
            refcount: 0,
            flags: SlotFlags::empty(),
        }
    }

    /// 当前镜像的组索引
    pub fn group(&self) -> u32 {
        self.group
    }

    /// 组位图数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 当前引用计数
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    /// 检查驻留是否有效
    pub fn is_valid(&self) -> bool {
        self.flags.contains(SlotFlags::VALID)
    }

    /// 检查是否是脏槽
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(SlotFlags::DIRTY)
    }

    /// 检查是否正在被引用
    pub fn is_referenced(&self) -> bool {
        self.refcount > 0
    }

    /// 标记为脏（已修改）
    pub(crate) fn mark_dirty(&mut self) {
        self.flags.insert(SlotFlags::DIRTY);
    }

    /// 标记为干净（已写入磁盘）
    pub(crate) fn mark_clean(&mut self) {
        self.flags.remove(SlotFlags::DIRTY);
    }

    /// 使驻留失效（加载失败后组号不再可信）
    pub(crate) fn invalidate(&mut self) {
        self.flags.remove(SlotFlags::VALID);
    }
}

impl core::fmt::Debug for BitmapSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BitmapSlot")
            .field("group", &self.group)
            .field("data_len", &self.data.len())
            .field("refcount", &self.refcount)
            .field("flags", &self.flags)
            .finish()
    }
}
