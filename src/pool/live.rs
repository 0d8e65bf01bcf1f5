use fixedbitset::FixedBitSet;

use crate::pool::BlockIndex;

/// 割当中のブロックの集合.
///
/// ブロック毎に1bitを使用する.
/// フリーリスト自体はブロック内に埋め込まれているため、
/// 二重解放や未割当ブロックの解放を検出するためだけに、この集合を別途保持している.
#[derive(Debug)]
pub struct LiveSet {
    bits: FixedBitSet,
    count: usize,
}
impl LiveSet {
    pub fn new(block_count: usize) -> Self {
        LiveSet {
            bits: FixedBitSet::with_capacity(block_count),
            count: 0,
        }
    }

    /// 割当中のブロック数.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn contains(&self, index: BlockIndex) -> bool {
        self.bits.contains(index.as_usize())
    }

    pub fn insert(&mut self, index: BlockIndex) {
        debug_assert!(!self.contains(index), "{}", index);
        self.bits.insert(index.as_usize());
        self.count += 1;
    }

    /// `index`を集合から取り除く.
    ///
    /// `index`が割当中ではなかった場合には、何もせずに`false`を返す.
    pub fn remove(&mut self, index: BlockIndex) -> bool {
        if !self.contains(index) {
            return false;
        }
        self.bits.set(index.as_usize(), false);
        self.count -= 1;
        true
    }

    pub fn grow(&mut self, block_count: usize) {
        self.bits.grow(block_count);
    }
}
