use std::fmt;
use uuid::Uuid;

/// アリーナ内のブロックの位置(インデックス).
///
/// アドレスとは異なり、アリーナの拡張(再アロケート)を跨いでも値は変化しない.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct BlockIndex(u64);
impl BlockIndex {
    /// 新しい`BlockIndex`インスタンスを生成する.
    pub fn new(index: u64) -> Self {
        BlockIndex(index)
    }

    /// インデックスの値を返す.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}
impl From<usize> for BlockIndex {
    fn from(f: usize) -> Self {
        BlockIndex(f as u64)
    }
}
impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 割り当てられたブロックを識別するためのハンドル.
///
/// ブロックのインデックスに加えて、割当を行ったアリーナの識別子を保持している.
/// そのため、別のアロケータ(あるいは破棄前の同じアロケータ)が発行したハンドルは、
/// 解放時やアクセス時に検出され、拒否される.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct BlockHandle {
    pub(crate) arena_id: Uuid,
    pub(crate) index: BlockIndex,
}
impl BlockHandle {
    /// ブロックのインデックスを返す.
    pub fn index(&self) -> BlockIndex {
        self.index
    }
}
impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BlockHandle({}, arena={})", self.index, self.arena_id)
    }
}

/// `PoolAllocator::allocate()`の結果.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Allocation {
    /// 割り当てられたブロックのハンドル.
    pub handle: BlockHandle,

    /// この割当によってアリーナの拡張が行われたかどうか.
    ///
    /// `true`の場合、それ以前に取得したブロックのアドレスは無効になっている可能性がある.
    pub resized: bool,
}
