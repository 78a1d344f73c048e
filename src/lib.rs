//! pfsck_core: PFS 一致性检查工具的分配位图缓存核心
//!
//! PFS 卷用逐块一位的分配位图记录空闲/占用状态。卷可以远大于
//! 可用内存，因此位图被切分为固定大小的组（每组 2^20 位 =
//! 131072 字节），按需在一个小的固定容量缓存池中换入换出。
//! 这个 crate 提供：
//!
//! - **至多一份驻留副本**：同一组不会同时占用两个槽
//! - **写回后才复用**：脏槽被驱逐前必定先落盘
//! - **引用计数持有**：被持有的槽不会被驱逐，组号和数据被冻结
//! - **常数内存**：池容量固定（默认 4 组），与卷大小无关
//!
//! # 示例
//!
//! ```rust,ignore
//! use pfsck_core::{BitmapPool, SectorDevice, Result};
//!
//! struct MyDevice {
//!     // ...
//! }
//!
//! impl SectorDevice for MyDevice {
//!     // 实现必要的方法
//!     // ...
//! }
//!
//! fn check() -> Result<()> {
//!     let mut pool = BitmapPool::new(MyDevice::open_partition("hdd0:part")?)?;
//!
//!     // 测试并标记一个块的分配位
//!     if !pool.mark_block(12345)? {
//!         // 之前未分配
//!     }
//!
//!     // 对位图字的作用域访问
//!     pool.with_bit_word(12345, |word| {
//!         *word |= 1;
//!     })?;
//!
//!     pool.close()?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`device`] - 扇区设备抽象
//! - [`consts`] - 常量定义
//! - [`bitmap`] - 位地址换算和位操作
//! - [`pool`] - 位图组缓存池和分区批量初始化

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 扇区设备抽象
pub mod device;

/// 常量定义
pub mod consts;

/// 位地址换算和位操作
pub mod bitmap;

/// 位图组缓存池
pub mod pool;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 设备
pub use device::SectorDevice;

// 缓存池
pub use pool::{
    partition_group_count, BitmapPool, BitmapSlot, PoolStats, SlotFlags, SlotHandle,
};
