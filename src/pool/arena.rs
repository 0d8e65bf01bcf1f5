use byteorder::{ByteOrder, NativeEndian};
use uuid::Uuid;

use crate::block::{AlignedBytes, Alignment, BlockSize, INDEX_WIDTH};
use crate::pool::BlockIndex;
use crate::{ErrorKind, Result};

/// プールのブロック群を格納する単一の連続領域.
///
/// 領域の確保・拡張・解放と、ブロックのインデックスとアドレスの相互変換を担当する.
///
/// どのブロックが空いているか、といった情報は一切保持しない.
/// 空きブロックの先頭に埋め込むリンクの読み書き用のメソッドは提供しているが、
/// それをいつ使うかは`FreeList`が決める.
#[derive(Debug)]
pub struct Arena {
    id: Uuid,
    bytes: AlignedBytes,
    block_size: BlockSize,
    block_count: usize,
}
impl Arena {
    /// `block_size * block_count`バイトのアリーナを確保する.
    pub fn new(block_size: BlockSize, block_count: usize, alignment: Alignment) -> Result<Self> {
        track_assert_ne!(block_count, 0, ErrorKind::InitializationFailure);
        let len = track_assert_some!(
            block_size.checked_bytes(block_count),
            ErrorKind::InitializationFailure,
            "block_size={}, block_count={}",
            block_size.as_usize(),
            block_count
        );
        let bytes = track!(AlignedBytes::new(len, alignment))?;
        Ok(Arena {
            id: Uuid::new_v4(),
            bytes,
            block_size,
            block_count,
        })
    }

    /// アリーナの識別子.
    ///
    /// `Arena::new()`の呼び出し毎に異なる値が割り当てられる.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn alignment(&self) -> Alignment {
        self.bytes.alignment()
    }

    /// アリーナの先頭アドレス.
    ///
    /// `grow()`の呼び出しによって変化し得る.
    pub fn base_addr(&self) -> usize {
        self.bytes.as_ptr() as usize
    }

    /// アリーナの容量(バイト数).
    pub fn capacity_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn contains(&self, index: BlockIndex) -> bool {
        index.as_u64() < self.block_count as u64
    }

    /// インデックスに対応するブロックのアドレスを返す.
    pub fn addr_from_index(&self, index: BlockIndex) -> Result<usize> {
        track_assert!(
            self.contains(index),
            ErrorKind::InvalidInput,
            "index={}, block_count={}",
            index,
            self.block_count
        );
        Ok(self.base_addr() + index.as_usize() * self.block_size.as_usize())
    }

    /// アドレスに対応するブロックのインデックスを返す.
    ///
    /// アリーナの範囲外のアドレスや、ブロック境界に沿っていないアドレスが渡された場合にはエラーとなる.
    pub fn index_from_addr(&self, addr: usize) -> Result<BlockIndex> {
        let base = self.base_addr();
        track_assert!(
            base <= addr && addr < base + self.bytes.len(),
            ErrorKind::InvalidInput,
            "Out of arena: addr={:#x}, base={:#x}, len={}",
            addr,
            base,
            self.bytes.len()
        );
        let offset = addr - base;
        let block_size = self.block_size.as_usize();
        track_assert_eq!(
            offset % block_size,
            0,
            ErrorKind::InvalidInput,
            "Not on a block boundary: offset={}",
            offset
        );
        Ok(BlockIndex::from(offset / block_size))
    }

    pub fn block(&self, index: BlockIndex) -> &[u8] {
        let block_size = self.block_size.as_usize();
        &self.bytes[index.as_usize() * block_size..][..block_size]
    }

    pub fn block_mut(&mut self, index: BlockIndex) -> &mut [u8] {
        let block_size = self.block_size.as_usize();
        &mut self.bytes[index.as_usize() * block_size..][..block_size]
    }

    /// 空きブロックの先頭に埋め込まれたリンクを読み込む.
    pub fn read_link(&self, index: BlockIndex) -> u64 {
        NativeEndian::read_u64(&self.block(index)[..INDEX_WIDTH])
    }

    /// 空きブロックの先頭にリンクを書き込む.
    pub fn write_link(&mut self, index: BlockIndex, next: u64) {
        NativeEndian::write_u64(&mut self.block_mut(index)[..INDEX_WIDTH], next);
    }

    /// 既存ブロックの内容を保持したまま、ブロック数を`new_block_count`に増やす.
    ///
    /// 失敗した場合には、アリーナの状態は一切変化しない.
    pub fn grow(&mut self, new_block_count: usize) -> Result<()> {
        track_assert!(
            new_block_count > self.block_count,
            ErrorKind::GrowthFailure,
            "new_block_count={}, block_count={}",
            new_block_count,
            self.block_count
        );
        let len = track_assert_some!(
            self.block_size.checked_bytes(new_block_count),
            ErrorKind::GrowthFailure,
            "block_size={}, new_block_count={}",
            self.block_size.as_usize(),
            new_block_count
        );
        track!(self.bytes.try_resize(len))?;
        self.block_count = new_block_count;
        Ok(())
    }
}
