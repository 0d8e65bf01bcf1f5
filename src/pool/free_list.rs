use crate::pool::arena::Arena;
use crate::pool::BlockIndex;

/// 空きブロックの単方向リスト.
///
/// リンク(次の空きブロックのインデックス)は、空きブロック自体の先頭に書き込まれる.
/// リストの末尾を表す番兵には、その時点のブロック数が用いられる.
///
/// # 遅延初期化
///
/// 一度も触れられていないブロック群(インデックスが`touched_count`以上のもの)は、
/// 暗黙的に「インデックスの昇順」に連結されているものとして扱う.
/// 実際のリンクの書き込みは、割当の度に一ブロックずつ行われるため、
/// アリーナ全体を走査するコストが構築時に一括で発生することはない.
///
/// `touched_count`は単調増加であり、解放によって減ることはない.
#[derive(Debug)]
pub struct FreeList {
    head: BlockIndex,
    free_count: usize,
    touched_count: usize,
}
impl FreeList {
    /// `block_count`個の未使用ブロックを保持するフリーリストを生成する.
    ///
    /// この時点では、リンクは一つも書き込まれない.
    pub fn new(block_count: usize) -> Self {
        FreeList {
            head: BlockIndex::new(0),
            free_count: block_count,
            touched_count: 0,
        }
    }

    pub fn free_count(&self) -> usize {
        self.free_count
    }

    pub fn touched_count(&self) -> usize {
        self.touched_count
    }

    /// 未初期化ブロックのうち先頭のものにリンクを書き込む.
    ///
    /// 割当処理の冒頭で毎回呼び出されることを想定している.
    pub fn extend_lazily(&mut self, arena: &mut Arena) {
        if self.touched_count < arena.block_count() {
            let index = BlockIndex::from(self.touched_count);
            arena.write_link(index, self.touched_count as u64 + 1);
            self.touched_count += 1;
        }
    }

    /// リストの先頭ブロックを取り出す.
    ///
    /// リストが空の場合には`None`が返される.
    pub fn pop(&mut self, arena: &Arena) -> Option<BlockIndex> {
        if self.free_count == 0 {
            return None;
        }
        let index = self.head;
        self.free_count -= 1;
        if self.free_count != 0 {
            self.head = BlockIndex::new(arena.read_link(index));
        }
        Some(index)
    }

    /// アリーナが`old_block_count`から拡張された直後に呼び出され、新規ブロックの先頭を取り出す.
    ///
    /// 拡張によって増えたブロック群(全て未初期化)がリストに加わり、
    /// その先頭(インデックス`old_block_count`)が即座に割り当てられる.
    pub fn take_grown(&mut self, arena: &Arena, old_block_count: usize) -> BlockIndex {
        debug_assert_eq!(self.free_count, 0);
        debug_assert_eq!(self.touched_count, old_block_count);

        self.free_count = arena.block_count() - old_block_count;
        let index = BlockIndex::from(old_block_count);
        self.touched_count += 1;
        self.free_count -= 1;
        self.head = BlockIndex::from(self.touched_count);
        index
    }

    /// ブロックをリストの先頭に追加する.
    ///
    /// # 事前条件
    ///
    /// - `index`は割当中のブロックを指している
    pub fn push(&mut self, arena: &mut Arena, index: BlockIndex) {
        let next = if self.free_count == 0 {
            arena.block_count() as u64
        } else {
            self.head.as_u64()
        };
        arena.write_link(index, next);
        self.head = index;
        self.free_count += 1;
    }

    /// リストを先頭から辿り、空きブロックのインデックスを順に返す.
    #[cfg(test)]
    pub fn walk(&self, arena: &Arena) -> Vec<BlockIndex> {
        let mut indices = Vec::with_capacity(self.free_count);
        let mut current = self.head;
        for _ in 0..self.free_count {
            indices.push(current);
            current = if current.as_usize() < self.touched_count {
                BlockIndex::new(arena.read_link(current))
            } else {
                BlockIndex::new(current.as_u64() + 1)
            };
        }
        indices
    }
}
