//! 分配位图布局常量定义
//!
//! 这个模块包含了位图缓存池使用的所有常量，包括：
//! - 扇区和位图组的磁盘布局
//! - 块号到 (组, 字, 位) 的换算掩码
//! - 缓存池容量

//=============================================================================
// 磁盘布局
//=============================================================================

/// 物理扇区大小（512 字节）
pub const SECTOR_SIZE: u32 = 512;

/// 每个位图组占用的扇区数（256 扇区）
pub const GROUP_SECTORS: u32 = 256;

/// 每个位图组的字节数（256 * 512 = 131072 字节）
pub const GROUP_BYTES: usize = (GROUP_SECTORS * SECTOR_SIZE) as usize;

/// 组 g 的起始扇区为 `g << GROUP_SECTOR_SHIFT`
pub const GROUP_SECTOR_SHIFT: u32 = 8;

//=============================================================================
// 位地址换算
//=============================================================================

/// 每组覆盖的块数指数（一组 = 2^20 块）
pub const GROUP_SHIFT: u32 = 20;

/// 每组覆盖的块数（1,048,576 块，即每组 1,048,576 位）
pub const BLOCKS_PER_GROUP: u32 = 1 << GROUP_SHIFT;

/// 每个位图字的位数指数（32 位字）
pub const WORD_SHIFT: u32 = 5;

/// 组内字索引掩码（每组 32768 个 u32 字）
pub const WORD_INDEX_MASK: u32 = 0x7FFF;

/// 字内位索引掩码
pub const BIT_INDEX_MASK: u32 = 0x1F;

/// 每组包含的 u32 字数（32768）
pub const WORDS_PER_GROUP: usize = GROUP_BYTES / 4;

/// 分区初始化时不满一组的字节余数掩码
pub const PARTIAL_GROUP_BYTE_MASK: u32 = 0x1FFFF;

//=============================================================================
// 缓存池
//=============================================================================

/// 缓存池数据槽数量（固定的小容量，与卷大小无关）
pub const DEFAULT_POOL_SLOTS: usize = 4;
