//! 分配位图的纯函数层
//!
//! # 主要组件
//!
//! - [`addr`] - 全局块号到 (组, 字, 位) 的地址换算
//! - [`ops`] - 字粒度和字节粒度的位操作
//!
//! 这一层不涉及任何 I/O 或缓存状态，所有函数都是纯函数，
//! 由 [`crate::pool::BitmapPool`] 和一致性检查逻辑共同使用。

pub mod addr;
pub mod ops;
