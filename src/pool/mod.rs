//! 固定長ブロックのプールアロケータ.
//!
//! # 状態遷移
//!
//! ```text
//! Uninitialized --create()--> Ready --destroy()--> Destroyed
//!                               ^ |                    |
//!                               | allocate()           |
//!                               | deallocate()         |
//!                               +-+                    |
//!                               ^                      |
//!                               +-------create()-------+
//! ```
//!
//! # アリーナの拡張
//!
//! 空きブロックが枯渇した状態で`allocate()`が呼ばれると、ブロック数を倍にしてアリーナが拡張される.
//! 拡張時には内部バッファの再アロケートが行われるため、それ以前に取得したブロックのアドレスは無効になり得る.
//! ブロックは[`BlockHandle`](インデックス)で識別し、アドレスは必要になった時点で
//! [`PoolAllocator::addr_from_index`]を使って求めること.
//!
//! [`BlockHandle`]: ./struct.BlockHandle.html
//! [`PoolAllocator::addr_from_index`]: ./struct.PoolAllocator.html#method.addr_from_index
use prometrics::metrics::MetricBuilder;
use slog::Logger;
use std::mem;
use trackable::error::ErrorKindExt;

pub use self::builder::PoolAllocatorBuilder;
pub use self::handle::{Allocation, BlockHandle, BlockIndex};

use self::arena::Arena;
use self::free_list::FreeList;
use self::live::LiveSet;
use crate::block::{Alignment, BlockSize};
use crate::metrics::{BlockCounts, PoolMetrics};
use crate::{ErrorKind, Result};

mod arena;
mod builder;
mod free_list;
mod handle;
mod live;

/// アロケータの状態.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// 未初期化.
    Uninitialized = 0,

    /// `create()`に成功し、割当・解放が可能な状態.
    Ready = 1,

    /// `destroy()`によってアリーナが解放された状態.
    ///
    /// `create()`を呼び出せば、再び`Ready`に戻ることができる.
    Destroyed = 2,
}

/// 固定長ブロックのプールアロケータ.
///
/// 一つのインスタンスは、一種類のサイズのブロックのみを扱う.
///
/// ブロックの内容は利用者の責任で管理される.
/// アロケータがブロックの内容を初期化・破棄することはなく、
/// 解放されたブロックの先頭部分は、フリーリストのリンクによって上書きされる.
///
/// # スレッド安全性
///
/// このアロケータはスレッドセーフではない.
/// スレッド毎に別々のインスタンスを用意するか、外部でロックを取ること.
///
/// # Examples
///
/// ```
/// use blockpool::pool::PoolAllocator;
///
/// let mut pool = PoolAllocator::new();
/// pool.create(16, 4, 16).unwrap();
///
/// let blocks = (0..4).map(|_| pool.allocate().unwrap()).collect::<Vec<_>>();
/// assert!(blocks.iter().all(|a| !a.resized));
/// assert_eq!(pool.free_count().unwrap(), 0);
///
/// // 枯渇したのでアリーナが拡張される
/// let grown = pool.allocate().unwrap();
/// assert!(grown.resized);
/// assert_eq!(pool.block_count().unwrap(), 8);
///
/// pool.destroy().unwrap();
/// ```
#[derive(Debug)]
pub struct PoolAllocator {
    logger: Logger,
    metrics: PoolMetrics,
    max_block_count: Option<usize>,
    inner: Inner,
}
impl PoolAllocator {
    /// デフォルト設定で、未初期化状態の`PoolAllocator`インスタンスを生成する.
    ///
    /// 設定を変更したい場合には[`PoolAllocatorBuilder`]を使用すること.
    ///
    /// [`PoolAllocatorBuilder`]: ./struct.PoolAllocatorBuilder.html
    pub fn new() -> Self {
        PoolAllocatorBuilder::new().finish()
    }

    pub(crate) fn with_options(
        logger: Logger,
        metrics: &MetricBuilder,
        max_block_count: Option<usize>,
    ) -> Self {
        let metrics = PoolMetrics::new(metrics);
        metrics.set_status(PoolState::Uninitialized);
        PoolAllocator {
            logger,
            metrics,
            max_block_count,
            inner: Inner::Uninitialized,
        }
    }

    /// `block_size`バイトのブロックを`block_count`個格納可能なアリーナを確保する.
    ///
    /// アリーナの先頭アドレスは`alignment`の境界に揃えられる.
    ///
    /// 状態が`Uninitialized`もしくは`Destroyed`の場合にのみ呼び出し可能.
    ///
    /// # Errors
    ///
    /// 以下の場合には、種類が`ErrorKind::InitializationFailure`のエラーが返される:
    ///
    /// - `block_size`が`BlockSize::MIN`未満
    /// - `block_count`が`0`、もしくは`max_block_count`を超えている
    /// - `alignment`が2の冪ではない
    /// - アリーナの確保に失敗した
    ///
    /// 既に`Ready`状態の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    ///
    /// いずれの場合も、アロケータの状態は変化しない.
    pub fn create(&mut self, block_size: usize, block_count: usize, alignment: usize) -> Result<()> {
        track_assert_ne!(
            self.state(),
            PoolState::Ready,
            ErrorKind::InvalidInput,
            "The allocator has already been created: block_count={:?}",
            self.block_count().ok()
        );
        if let Some(max) = self.max_block_count {
            track_assert!(
                block_count <= max,
                ErrorKind::InitializationFailure,
                "block_count={}, max_block_count={}",
                block_count,
                max
            );
        }
        let block_size = track!(BlockSize::new(block_size))?;
        let alignment = track!(Alignment::new(alignment))?;
        let arena = track!(Arena::new(block_size, block_count, alignment))?;
        info!(
            self.logger,
            "Pool created";
            "arena" => %arena.id(),
            "block_size" => block_size.as_usize(),
            "block_count" => block_count,
            "alignment" => alignment.as_usize()
        );

        let pool = Pool {
            free_list: FreeList::new(block_count),
            live: LiveSet::new(block_count),
            arena,
        };
        self.metrics.set_block_size(block_size.as_usize());
        self.metrics.set_status(PoolState::Ready);
        pool.update_gauges(&self.metrics);
        self.inner = Inner::Ready(pool);
        Ok(())
    }

    /// ブロックを一つ割り当てる.
    ///
    /// 空きブロックがない場合には、アリーナのブロック数を倍に拡張した上で、
    /// 新規ブロックの先頭を割り当てる(この場合`Allocation::resized`は`true`となる).
    ///
    /// 返されたブロックの内容は未定義(以前に解放されたブロックの内容が残っていることがある).
    ///
    /// # Errors
    ///
    /// アリーナの拡張に失敗した場合には、種類が`ErrorKind::GrowthFailure`のエラーが返される.
    /// この場合、アロケータの状態(発行済みのブロック群を含む)は呼び出し前のまま変化しない.
    pub fn allocate(&mut self) -> Result<Allocation> {
        let pool = track!(self.inner.pool_mut())?;
        pool.free_list.extend_lazily(&mut pool.arena);
        let allocation = if let Some(index) = pool.free_list.pop(&pool.arena) {
            Allocation {
                handle: pool.handle(index),
                resized: false,
            }
        } else {
            let old_block_count = pool.arena.block_count();
            if let Err(e) = track!(pool.grow(self.max_block_count)) {
                self.metrics.growth_failures.increment();
                warn!(
                    self.logger,
                    "Cannot grow the arena: {}", e;
                    "block_count" => old_block_count
                );
                return Err(e);
            }
            let index = pool.free_list.take_grown(&pool.arena, old_block_count);
            self.metrics.growths.increment();
            debug!(
                self.logger,
                "Arena grown";
                "old_block_count" => old_block_count,
                "new_block_count" => pool.arena.block_count()
            );
            Allocation {
                handle: pool.handle(index),
                resized: true,
            }
        };
        pool.live.insert(allocation.handle.index);
        self.metrics.allocations.increment();
        pool.update_gauges(&self.metrics);
        Ok(allocation)
    }

    /// ブロックを解放する.
    ///
    /// 解放されたブロックはフリーリストの先頭に追加されるため、
    /// 直後の`allocate()`では、このブロックが再び割り当てられる.
    ///
    /// # Errors
    ///
    /// `handle`が、このアロケータが割り当てた割当中のブロックを指していない場合には、
    /// 種類が`ErrorKind::InvalidFree`のエラーが返される.
    /// この場合、アロケータの状態は変化しない.
    pub fn deallocate(&mut self, handle: BlockHandle) -> Result<()> {
        let pool = track!(self.inner.pool_mut())?;
        let result = track!(pool.release(handle));
        pool.update_gauges(&self.metrics);
        self.count_release(&result);
        result
    }

    /// アドレスを指定してブロックを解放する.
    ///
    /// アドレスからインデックスへの変換は、呼び出し時点のアリーナを基準に行われる.
    /// アリーナの拡張前に取得したアドレスを渡してはいけない.
    ///
    /// # Errors
    ///
    /// `addr`がアリーナの範囲外、もしくはブロック境界に沿っていない場合や、
    /// 割当中のブロックを指していない場合には、種類が`ErrorKind::InvalidFree`のエラーが返される.
    pub fn deallocate_addr(&mut self, addr: usize) -> Result<()> {
        let pool = track!(self.inner.pool_mut())?;
        let result = track!(pool.release_addr(addr));
        pool.update_gauges(&self.metrics);
        self.count_release(&result);
        result
    }

    /// アリーナを解放して`Destroyed`状態に遷移する.
    ///
    /// # Errors
    ///
    /// - 既に`Destroyed`状態の場合には、種類が`ErrorKind::UseAfterDestroy`のエラーが返される
    /// - `Uninitialized`状態の場合には、種類が`ErrorKind::Uninitialized`のエラーが返される
    pub fn destroy(&mut self) -> Result<()> {
        track!(self.inner.pool())?;
        if let Inner::Ready(pool) = mem::replace(&mut self.inner, Inner::Destroyed) {
            info!(
                self.logger,
                "Pool destroyed";
                "arena" => %pool.arena.id(),
                "block_count" => pool.arena.block_count(),
                "live_blocks" => pool.live.count()
            );
        }
        self.metrics.set_block_size(0);
        self.metrics.set_status(PoolState::Destroyed);
        self.metrics.set_counts(BlockCounts::default());
        Ok(())
    }

    /// ブロックのインデックスを、(現在の)アドレスに変換する.
    ///
    /// `addr = base + index * block_size`
    ///
    /// # Errors
    ///
    /// `index`がアリーナの範囲外の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn addr_from_index(&self, index: BlockIndex) -> Result<usize> {
        let pool = track!(self.inner.pool())?;
        track!(pool.arena.addr_from_index(index))
    }

    /// アドレスを、ブロックのインデックスに変換する.
    ///
    /// `index = (addr - base) / block_size`
    ///
    /// # Errors
    ///
    /// `addr`がアリーナの範囲外、もしくはブロック境界に沿っていない場合には、
    /// 種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn index_from_addr(&self, addr: usize) -> Result<BlockIndex> {
        let pool = track!(self.inner.pool())?;
        track!(pool.arena.index_from_addr(addr))
    }

    /// 割当中のブロックの内容を返す.
    ///
    /// # Errors
    ///
    /// `handle`が割当中のブロックを指していない場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn block(&self, handle: BlockHandle) -> Result<&[u8]> {
        let pool = track!(self.inner.pool())?;
        track!(pool.check_live(handle))?;
        Ok(pool.arena.block(handle.index))
    }

    /// 割当中のブロックの内容を、書き込み可能な形で返す.
    ///
    /// # Errors
    ///
    /// `handle`が割当中のブロックを指していない場合には、種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn block_mut(&mut self, handle: BlockHandle) -> Result<&mut [u8]> {
        let pool = track!(self.inner.pool_mut())?;
        track!(pool.check_live(handle))?;
        Ok(pool.arena.block_mut(handle.index))
    }

    /// アロケータの現在の状態を返す.
    pub fn state(&self) -> PoolState {
        match self.inner {
            Inner::Uninitialized => PoolState::Uninitialized,
            Inner::Ready(_) => PoolState::Ready,
            Inner::Destroyed => PoolState::Destroyed,
        }
    }

    /// ブロックサイズを返す.
    pub fn block_size(&self) -> Result<BlockSize> {
        let pool = track!(self.inner.pool())?;
        Ok(pool.arena.block_size())
    }

    /// アリーナの先頭アドレスのアライメントを返す.
    pub fn alignment(&self) -> Result<Alignment> {
        let pool = track!(self.inner.pool())?;
        Ok(pool.arena.alignment())
    }

    /// アリーナが保持しているブロックの数を返す.
    pub fn block_count(&self) -> Result<usize> {
        let pool = track!(self.inner.pool())?;
        Ok(pool.arena.block_count())
    }

    /// 空きブロックの数を返す.
    pub fn free_count(&self) -> Result<usize> {
        let pool = track!(self.inner.pool())?;
        Ok(pool.free_list.free_count())
    }

    /// フリーリストのリンクが一度でも書き込まれたブロックの数を返す.
    ///
    /// この値は単調増加であり、解放によって減ることはない.
    pub fn touched_count(&self) -> Result<usize> {
        let pool = track!(self.inner.pool())?;
        Ok(pool.free_list.touched_count())
    }

    /// 割当中のブロックの数を返す.
    pub fn live_count(&self) -> Result<usize> {
        let pool = track!(self.inner.pool())?;
        Ok(pool.live.count())
    }

    /// アリーナの容量(バイト数)を返す.
    pub fn capacity_bytes(&self) -> Result<usize> {
        let pool = track!(self.inner.pool())?;
        Ok(pool.arena.capacity_bytes())
    }

    /// アロケータのメトリクスを返す.
    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    fn count_release(&self, result: &Result<()>) {
        if let Err(ref e) = *result {
            self.metrics.invalid_frees.increment();
            warn!(self.logger, "Invalid free: {}", e);
        } else {
            self.metrics.deallocations.increment();
        }
    }
}
impl Default for PoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum Inner {
    Uninitialized,
    Ready(Pool),
    Destroyed,
}
impl Inner {
    fn pool(&self) -> Result<&Pool> {
        match *self {
            Inner::Ready(ref pool) => Ok(pool),
            Inner::Uninitialized => track_panic!(ErrorKind::Uninitialized),
            Inner::Destroyed => track_panic!(ErrorKind::UseAfterDestroy),
        }
    }

    fn pool_mut(&mut self) -> Result<&mut Pool> {
        match *self {
            Inner::Ready(ref mut pool) => Ok(pool),
            Inner::Uninitialized => track_panic!(ErrorKind::Uninitialized),
            Inner::Destroyed => track_panic!(ErrorKind::UseAfterDestroy),
        }
    }
}

#[derive(Debug)]
struct Pool {
    arena: Arena,
    free_list: FreeList,
    live: LiveSet,
}
impl Pool {
    fn handle(&self, index: BlockIndex) -> BlockHandle {
        BlockHandle {
            arena_id: self.arena.id(),
            index,
        }
    }

    // ブロック数を倍にする.
    //
    // 失敗した場合には、何も変更しない.
    fn grow(&mut self, max_block_count: Option<usize>) -> Result<()> {
        let old_block_count = self.arena.block_count();
        let new_block_count = track_assert_some!(
            old_block_count.checked_mul(2),
            ErrorKind::GrowthFailure,
            "block_count={}",
            old_block_count
        );
        if let Some(max) = max_block_count {
            track_assert!(
                new_block_count <= max,
                ErrorKind::GrowthFailure,
                "new_block_count={}, max_block_count={}",
                new_block_count,
                max
            );
        }
        track!(self.arena.grow(new_block_count))?;
        self.live.grow(new_block_count);
        Ok(())
    }

    fn release(&mut self, handle: BlockHandle) -> Result<()> {
        track_assert_eq!(
            handle.arena_id,
            self.arena.id(),
            ErrorKind::InvalidFree,
            "Foreign handle: {}",
            handle
        );
        track_assert!(
            self.live.remove(handle.index),
            ErrorKind::InvalidFree,
            "Not a live block: {}",
            handle
        );
        self.free_list.push(&mut self.arena, handle.index);
        Ok(())
    }

    fn release_addr(&mut self, addr: usize) -> Result<()> {
        let index = track!(self
            .arena
            .index_from_addr(addr)
            .map_err(|e| ErrorKind::InvalidFree.cause(e)))?;
        let handle = self.handle(index);
        track!(self.release(handle))
    }

    fn check_live(&self, handle: BlockHandle) -> Result<()> {
        track_assert_eq!(
            handle.arena_id,
            self.arena.id(),
            ErrorKind::InvalidInput,
            "Foreign handle: {}",
            handle
        );
        track_assert!(
            self.live.contains(handle.index),
            ErrorKind::InvalidInput,
            "Not a live block: {}",
            handle
        );
        Ok(())
    }

    fn update_gauges(&self, metrics: &PoolMetrics) {
        metrics.set_counts(BlockCounts {
            total: self.arena.block_count(),
            free: self.free_list.free_count(),
            touched: self.free_list.touched_count(),
            live: self.live.count(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use trackable::result::TestResult;

    use super::*;
    use crate::block::INDEX_WIDTH;

    #[test]
    fn allocate_in_address_order_and_grow() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(16, 4, 16))?;
        assert_eq!(pool.state(), PoolState::Ready);

        let mut handles = Vec::new();
        for i in 0..4 {
            let a = track!(pool.allocate())?;
            assert!(!a.resized);
            assert_eq!(track!(offset(&pool, a.handle))?, i * 16);
            assert_eq!(track!(pool.free_count())?, 3 - i);
            handles.push(a.handle);
        }

        let a = track!(pool.allocate())?;
        assert!(a.resized);
        assert_eq!(track!(offset(&pool, a.handle))?, 64);
        assert_eq!(track!(pool.block_count())?, 8);
        assert_eq!(track!(pool.free_count())?, 3);
        assert_eq!(track!(pool.touched_count())?, 5);
        assert_eq!(track!(pool.capacity_bytes())?, 128);
        assert_eq!(pool.metrics().growths(), 1);

        for _ in 0..3 {
            assert!(!track!(pool.allocate())?.resized);
        }
        assert!(track!(pool.allocate())?.resized);
        assert_eq!(track!(pool.block_count())?, 16);
        assert_eq!(pool.metrics().growths(), 2);
        Ok(())
    }

    #[test]
    fn allocated_blocks_are_distinct() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(24, 10, 8))?;
        let mut offsets = HashSet::new();
        for _ in 0..10 {
            let a = track!(pool.allocate())?;
            let offset = track!(offset(&pool, a.handle))?;
            assert_eq!(offset % 24, 0);
            assert!(offsets.insert(offset));
        }
        assert_eq!(track!(pool.free_count())?, 0);
        assert_eq!(track!(pool.live_count())?, 10);
        Ok(())
    }

    #[test]
    fn address_translation_round_trips() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(32, 5, 64))?;
        for i in 0..5 {
            let index = BlockIndex::new(i);
            let addr = track!(pool.addr_from_index(index))?;
            assert_eq!(addr % 32, 0);
            assert_eq!(track!(pool.index_from_addr(addr))?, index);
        }

        // 拡張後も成り立つ
        for _ in 0..6 {
            let _ = track!(pool.allocate())?;
        }
        for i in 0..10 {
            let index = BlockIndex::new(i);
            let addr = track!(pool.addr_from_index(index))?;
            assert_eq!(track!(pool.index_from_addr(addr))?, index);
        }
        Ok(())
    }

    #[test]
    fn reuse_is_lifo() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(16, 4, 16))?;
        let handles = (0..4)
            .map(|_| pool.allocate().map(|a| a.handle))
            .collect::<Result<Vec<_>>>()?;

        track!(pool.deallocate(handles[1]))?;
        assert_eq!(track!(pool.free_count())?, 1);
        let a = track!(pool.allocate())?;
        assert!(!a.resized);
        assert_eq!(a.handle, handles[1]);
        assert_eq!(track!(offset(&pool, a.handle))?, 16);

        track!(pool.deallocate(handles[0]))?;
        track!(pool.deallocate(handles[2]))?;
        assert_eq!(track!(pool.allocate())?.handle, handles[2]);
        assert_eq!(track!(pool.allocate())?.handle, handles[0]);
        assert_eq!(track!(pool.touched_count())?, 4);
        Ok(())
    }

    #[test]
    fn deallocation_does_not_untouch_blocks() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(8, 4, 8))?;
        let a = track!(pool.allocate())?;
        let b = track!(pool.allocate())?;
        track!(pool.deallocate(a.handle))?;
        track!(pool.deallocate(b.handle))?;
        assert_eq!(track!(pool.touched_count())?, 2);
        assert_eq!(track!(pool.live_count())?, 0);

        let mut indices = (0..4)
            .map(|_| pool.allocate().map(|a| a.handle.index().as_u64()))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(indices, vec![1, 0, 2, 3]);
        assert_eq!(track!(pool.touched_count())?, 4);

        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 4);
        assert!(track!(pool.allocate())?.resized);
        Ok(())
    }

    #[test]
    fn growth_preserves_block_contents() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(16, 2, 16))?;
        let a = track!(pool.allocate())?;
        let b = track!(pool.allocate())?;
        track!(pool.block_mut(a.handle))?.copy_from_slice(&[1; 16]);
        track!(pool.block_mut(b.handle))?.copy_from_slice(&[2; 16]);

        let c = track!(pool.allocate())?;
        assert!(c.resized);
        assert_eq!(track!(pool.block(a.handle))?, &[1u8; 16][..]);
        assert_eq!(track!(pool.block(b.handle))?, &[2u8; 16][..]);
        assert_eq!(track!(pool.alignment())?.as_usize(), 16);
        assert_eq!(track!(pool.addr_from_index(BlockIndex::new(0)))? % 16, 0);
        Ok(())
    }

    #[test]
    fn single_block_pool_grows() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(8, 1, 8))?;
        assert!(!track!(pool.allocate())?.resized);

        let a = track!(pool.allocate())?;
        assert!(a.resized);
        assert_eq!(a.handle.index(), BlockIndex::new(1));
        assert_eq!(track!(pool.free_count())?, 0);

        let b = track!(pool.allocate())?;
        assert!(b.resized);
        assert_eq!(b.handle.index(), BlockIndex::new(2));
        assert_eq!(track!(pool.block_count())?, 4);
        assert_eq!(track!(pool.free_count())?, 1);
        assert_eq!(track!(pool.allocate())?.handle.index(), BlockIndex::new(3));
        Ok(())
    }

    #[test]
    fn growth_failure_keeps_state() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new()
            .max_block_count(4)
            .create(16, 4, 16))?;
        let handles = (0..4)
            .map(|_| pool.allocate().map(|a| a.handle))
            .collect::<Result<Vec<_>>>()?;
        track!(pool.block_mut(handles[3]))?[..3].copy_from_slice(b"foo");

        let e = pool.allocate().err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::GrowthFailure));
        assert_eq!(pool.state(), PoolState::Ready);
        assert_eq!(track!(pool.block_count())?, 4);
        assert_eq!(track!(pool.free_count())?, 0);
        assert_eq!(track!(pool.touched_count())?, 4);
        assert_eq!(track!(pool.live_count())?, 4);
        assert_eq!(&track!(pool.block(handles[3]))?[..3], b"foo");
        assert_eq!(pool.metrics().growth_failures(), 1);
        assert_eq!(pool.metrics().allocations(), 4);

        track!(pool.deallocate(handles[2]))?;
        assert_eq!(track!(pool.allocate())?.handle, handles[2]);
        Ok(())
    }

    #[test]
    fn create_rejects_invalid_parameters() {
        let mut pool = PoolAllocator::new();
        let cases = [(16, 0, 16), (4, 4, 16), (0, 4, 16), (16, 4, 0), (16, 4, 12)];
        for &(block_size, block_count, alignment) in &cases {
            let e = pool
                .create(block_size, block_count, alignment)
                .err()
                .map(|e| *e.kind());
            assert_eq!(e, Some(ErrorKind::InitializationFailure));
            assert_eq!(pool.state(), PoolState::Uninitialized);
        }

        let e = PoolAllocatorBuilder::new()
            .max_block_count(2)
            .create(16, 4, 16)
            .err()
            .map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InitializationFailure));

        let e = PoolAllocatorBuilder::new()
            .create(usize::max_value(), 2, 16)
            .err()
            .map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InitializationFailure));
    }

    #[test]
    fn invalid_frees_are_rejected() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(16, 4, 16))?;
        let mut other = track!(PoolAllocatorBuilder::new().create(16, 4, 16))?;
        let a = track!(pool.allocate())?;
        let b = track!(pool.allocate())?;
        let foreign = track!(other.allocate())?;

        // 二重解放
        track!(pool.deallocate(a.handle))?;
        assert_eq!(
            pool.deallocate(a.handle).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidFree)
        );

        // 他のアロケータのハンドル
        assert_eq!(
            pool.deallocate(foreign.handle).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidFree)
        );

        // 未割当ブロック
        let base = track!(pool.addr_from_index(BlockIndex::new(0)))?;
        assert_eq!(
            pool.deallocate_addr(base + 48).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidFree)
        );

        // 境界に沿っていない・範囲外のアドレス
        assert_eq!(
            pool.deallocate_addr(base + 17).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidFree)
        );
        assert_eq!(
            pool.deallocate_addr(base + 64).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidFree)
        );

        assert_eq!(track!(pool.free_count())?, 3);
        assert_eq!(track!(pool.live_count())?, 1);
        assert_eq!(pool.metrics().invalid_frees(), 5);
        assert_eq!(pool.metrics().deallocations(), 1);

        // 不正な解放の後でもフリーリストは壊れていない
        assert_eq!(track!(pool.allocate())?.handle, a.handle);
        assert_ne!(track!(pool.allocate())?.handle, b.handle);
        Ok(())
    }

    #[test]
    fn deallocate_by_address_works() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(16, 4, 16))?;
        let _ = track!(pool.allocate())?;
        let a = track!(pool.allocate())?;
        let addr = track!(pool.addr_from_index(a.handle.index()))?;

        track!(pool.deallocate_addr(addr))?;
        assert_eq!(
            pool.block(a.handle).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidInput)
        );
        assert_eq!(track!(pool.allocate())?.handle, a.handle);
        Ok(())
    }

    #[test]
    fn state_transitions() -> TestResult {
        let mut pool = PoolAllocator::new();
        assert_eq!(pool.state(), PoolState::Uninitialized);
        assert_eq!(pool.metrics().status(), PoolState::Uninitialized);
        assert_eq!(
            pool.allocate().err().map(|e| *e.kind()),
            Some(ErrorKind::Uninitialized)
        );
        assert_eq!(
            pool.destroy().err().map(|e| *e.kind()),
            Some(ErrorKind::Uninitialized)
        );
        assert_eq!(pool.state(), PoolState::Uninitialized);

        track!(pool.create(16, 4, 16))?;
        assert_eq!(pool.metrics().status(), PoolState::Ready);
        assert_eq!(pool.metrics().capacity_bytes(), 64);
        assert_eq!(
            pool.create(16, 4, 16).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidInput)
        );
        let a = track!(pool.allocate())?;

        track!(pool.destroy())?;
        assert_eq!(pool.state(), PoolState::Destroyed);
        assert_eq!(pool.metrics().status(), PoolState::Destroyed);
        assert_eq!(
            pool.destroy().err().map(|e| *e.kind()),
            Some(ErrorKind::UseAfterDestroy)
        );
        assert_eq!(
            pool.allocate().err().map(|e| *e.kind()),
            Some(ErrorKind::UseAfterDestroy)
        );
        assert_eq!(
            pool.deallocate(a.handle).err().map(|e| *e.kind()),
            Some(ErrorKind::UseAfterDestroy)
        );
        assert_eq!(
            pool.free_count().err().map(|e| *e.kind()),
            Some(ErrorKind::UseAfterDestroy)
        );

        // 再作成後は、以前のハンドルは使えない
        track!(pool.create(16, 4, 16))?;
        assert_eq!(pool.state(), PoolState::Ready);
        assert_eq!(
            pool.deallocate(a.handle).err().map(|e| *e.kind()),
            Some(ErrorKind::InvalidFree)
        );
        let b = track!(pool.allocate())?;
        assert_eq!(b.handle.index(), a.handle.index());
        assert_ne!(b.handle, a.handle);
        Ok(())
    }

    #[test]
    fn metrics_follow_operations() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(16, 2, 16))?;
        let a = track!(pool.allocate())?;
        let _ = track!(pool.allocate())?;
        let _ = track!(pool.allocate())?;
        track!(pool.deallocate(a.handle))?;

        let m = pool.metrics();
        assert_eq!(m.allocations(), 3);
        assert_eq!(m.deallocations(), 1);
        assert_eq!(m.live_blocks(), 2);
        assert_eq!(m.growths(), 1);
        assert_eq!(m.block_count(), 4);
        assert_eq!(m.free_blocks(), 2);
        assert_eq!(m.touched_blocks(), 3);
        Ok(())
    }

    #[test]
    fn metrics_reset_on_destroy() -> TestResult {
        let mut pool = PoolAllocator::new();
        let m = pool.metrics().clone();
        track!(pool.create(16, 4, 16))?;
        assert_eq!(m.capacity_bytes(), 64);

        let _ = track!(pool.allocate())?;
        let _ = track!(pool.allocate())?;
        assert_eq!(m.live_blocks(), 2);

        track!(pool.destroy())?;
        assert_eq!(m.live_blocks(), 0);
        assert_eq!(m.capacity_bytes(), 0);

        track!(pool.create(16, 4, 16))?;
        assert_eq!(track!(pool.live_count())?, 0);
        assert_eq!(m.live_blocks(), 0);
        assert_eq!(m.block_size(), 16);
        assert_eq!(m.capacity_bytes(), 64);

        let _ = track!(pool.allocate())?;
        assert_eq!(m.live_blocks(), track!(pool.live_count())? as u64);
        assert_eq!(m.allocations(), 3);
        Ok(())
    }

    #[test]
    fn large_arena_is_created_untouched() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(4096, 16 * 1024, 4096))?;
        assert_eq!(track!(pool.capacity_bytes())?, 64 * 1024 * 1024);
        assert_eq!(track!(pool.touched_count())?, 0);

        let a = track!(pool.allocate())?;
        assert_eq!(track!(pool.touched_count())?, 1);
        assert_eq!(track!(pool.addr_from_index(a.handle.index()))? % 4096, 0);
        let block = track!(pool.block(a.handle))?;
        assert!(block[INDEX_WIDTH..].iter().all(|&b| b == 0));
        Ok(())
    }

    #[test]
    fn churn_keeps_invariants() -> TestResult {
        let mut pool = track!(PoolAllocatorBuilder::new().create(8, 3, 8))?;
        let mut live = Vec::new();
        let mut seed = 12345u64;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            if live.is_empty() || (seed >> 33) % 3 != 0 {
                let a = track!(pool.allocate())?;
                assert!(!live.contains(&a.handle));
                track!(pool.block_mut(a.handle))?
                    .copy_from_slice(&a.handle.index().as_u64().to_le_bytes());
                live.push(a.handle);
            } else {
                let i = (seed >> 40) as usize % live.len();
                let handle = live.swap_remove(i);
                assert_eq!(
                    track!(pool.block(handle))?,
                    &handle.index().as_u64().to_le_bytes()[..]
                );
                track!(pool.deallocate(handle))?;
            }
            let block_count = track!(pool.block_count())?;
            let free_count = track!(pool.free_count())?;
            assert_eq!(free_count + live.len(), block_count);
            assert!(track!(pool.touched_count())? <= block_count);
            assert_eq!(track!(pool.live_count())?, live.len());
        }
        Ok(())
    }

    fn offset(pool: &PoolAllocator, handle: BlockHandle) -> Result<usize> {
        let base = track!(pool.addr_from_index(BlockIndex::new(0)))?;
        let addr = track!(pool.addr_from_index(handle.index()))?;
        Ok(addr - base)
    }
}
