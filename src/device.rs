//! 扇区设备抽象
//!
//! 对应原版 fsck 中通过 `ioctl2(HIOCTRANSFER)` 访问后备分区的传输层。

use crate::error::Result;

/// 扇区设备接口
///
/// 实现此 trait 以提供对后备设备（分区镜像、块设备）的同步扇区访问。
/// 所有传输都以 512 字节扇区为单位，并且必须是全有或全无的：
/// 要么整个缓冲区传输完成，要么调用失败且不产生部分写入。
///
/// # 示例
///
/// ```rust,ignore
/// use pfsck_core::{SectorDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl SectorDevice for MyDevice {
///     fn total_sectors(&self) -> u64 {
///         262144
///     }
///
///     fn read_sectors(&mut self, sector: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         // 实现扇区读取
///         Ok(count as usize * 512)
///     }
///
///     fn write_sectors(&mut self, sector: u64, count: u32, buf: &[u8]) -> Result<usize> {
///         // 实现扇区写入
///         Ok(count as usize * 512)
///     }
/// }
/// ```
pub trait SectorDevice {
    /// 总扇区数
    fn total_sectors(&self) -> u64;

    /// 读取扇区
    ///
    /// # 参数
    ///
    /// * `sector` - 起始扇区号
    /// * `count` - 要读取的扇区数
    /// * `buf` - 目标缓冲区（大小至少为 count * 512）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_sectors(&mut self, sector: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 写入扇区
    ///
    /// # 参数
    ///
    /// * `sector` - 起始扇区号
    /// * `count` - 要写入的扇区数
    /// * `buf` - 源缓冲区（大小至少为 count * 512）
    ///
    /// # 返回
    ///
    /// 成功返回实际写入的字节数
    fn write_sectors(&mut self, sector: u64, count: u32, buf: &[u8]) -> Result<usize>;

    /// 打开设备
    ///
    /// 在开始使用设备前调用，用于初始化设备资源。
    /// 默认实现什么都不做，设备可以根据需要覆盖此方法。
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// 关闭设备
    ///
    /// 在停止使用设备后调用，用于清理设备资源。
    /// 默认实现什么都不做，设备可以根据需要覆盖此方法。
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// 刷新设备缓存
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// 是否只读
    fn is_read_only(&self) -> bool {
        false
    }
}
