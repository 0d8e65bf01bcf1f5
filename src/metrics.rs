//! [Prometheus][prometheus]用のメトリクス.
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, Gauge, MetricBuilder};

use crate::pool::PoolState;

/// [`PoolAllocator`]のメトリクス.
///
/// [`PoolAllocator`]: ../pool/struct.PoolAllocator.html
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub(crate) status: Gauge,
    pub(crate) block_size: Gauge,
    pub(crate) block_count: Gauge,
    pub(crate) free_blocks: Gauge,
    pub(crate) touched_blocks: Gauge,
    pub(crate) live_blocks: Gauge,
    pub(crate) allocations: Counter,
    pub(crate) deallocations: Counter,
    pub(crate) growths: Counter,
    pub(crate) growth_failures: Counter,
    pub(crate) invalid_frees: Counter,
}
impl PoolMetrics {
    /// アロケータの状態.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// # 0=uninitialized
    /// # 1=ready
    /// # 2=destroyed
    /// blockpool_allocator_status = 0|1|2
    /// ```
    pub fn status(&self) -> PoolState {
        match self.status.value() as u8 {
            0 => PoolState::Uninitialized,
            1 => PoolState::Ready,
            2 => PoolState::Destroyed,
            _ => unreachable!(),
        }
    }

    /// ブロックのサイズ(バイト数).
    ///
    /// アロケータが`Ready`状態ではない場合には`0`となる.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_block_size <GAUGE>
    /// ```
    pub fn block_size(&self) -> u64 {
        self.block_size.value() as u64
    }

    /// アリーナが保持しているブロックの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_block_count <GAUGE>
    /// ```
    pub fn block_count(&self) -> u64 {
        self.block_count.value() as u64
    }

    /// アリーナの容量(バイト数).
    ///
    /// アロケータが`Ready`状態ではない場合には`0`が返される.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_block_size * blockpool_allocator_block_count
    /// ```
    pub fn capacity_bytes(&self) -> u64 {
        self.block_size() * self.block_count()
    }

    /// 空きブロックの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_free_blocks <GAUGE>
    /// ```
    pub fn free_blocks(&self) -> u64 {
        self.free_blocks.value() as u64
    }

    /// これまでに一度でもフリーリストのリンクが書き込まれたブロックの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_touched_blocks <GAUGE>
    /// ```
    pub fn touched_blocks(&self) -> u64 {
        self.touched_blocks.value() as u64
    }

    /// ブロックの割当回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_allocations_total <COUNTER>
    /// ```
    pub fn allocations(&self) -> u64 {
        self.allocations.value() as u64
    }

    /// ブロックの解放回数.
    ///
    /// 不正な解放要求は、ここには含まれない.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_deallocations_total <COUNTER>
    /// ```
    pub fn deallocations(&self) -> u64 {
        self.deallocations.value() as u64
    }

    /// 割当中のブロックの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_live_blocks <GAUGE>
    /// ```
    pub fn live_blocks(&self) -> u64 {
        self.live_blocks.value() as u64
    }

    /// アリーナの拡張回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_growths_total <COUNTER>
    /// ```
    pub fn growths(&self) -> u64 {
        self.growths.value() as u64
    }

    /// アリーナの拡張に失敗した回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_growth_failures_total <COUNTER>
    /// ```
    pub fn growth_failures(&self) -> u64 {
        self.growth_failures.value() as u64
    }

    /// 拒否された解放要求の数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// blockpool_allocator_invalid_frees_total <COUNTER>
    /// ```
    pub fn invalid_frees(&self) -> u64 {
        self.invalid_frees.value() as u64
    }

    pub(crate) fn new(builder: &MetricBuilder) -> Self {
        let mut builder = builder.clone();
        builder.namespace("blockpool").subsystem("allocator");
        PoolMetrics {
            status: builder
                .gauge("status")
                .help("Status of the allocator (0=uninitialized, 1=ready, 2=destroyed)")
                .finish()
                .expect("Never fails"),
            block_size: builder
                .gauge("block_size")
                .help("Size of each block in bytes")
                .finish()
                .expect("Never fails"),
            block_count: builder
                .gauge("block_count")
                .help("Number of blocks held by the arena")
                .finish()
                .expect("Never fails"),
            free_blocks: builder
                .gauge("free_blocks")
                .help("Number of blocks in the free list")
                .finish()
                .expect("Never fails"),
            touched_blocks: builder
                .gauge("touched_blocks")
                .help("Number of blocks whose free list link has been initialized")
                .finish()
                .expect("Never fails"),
            live_blocks: builder
                .gauge("live_blocks")
                .help("Number of allocated blocks not yet released")
                .finish()
                .expect("Never fails"),
            allocations: builder
                .counter("allocations_total")
                .help("Number of allocated blocks")
                .finish()
                .expect("Never fails"),
            deallocations: builder
                .counter("deallocations_total")
                .help("Number of deallocated blocks")
                .finish()
                .expect("Never fails"),
            growths: builder
                .counter("growths_total")
                .help("Number of arena growths")
                .finish()
                .expect("Never fails"),
            growth_failures: builder
                .counter("growth_failures_total")
                .help("Number of failed arena growths")
                .finish()
                .expect("Never fails"),
            invalid_frees: builder
                .counter("invalid_frees_total")
                .help("Number of rejected deallocation requests")
                .finish()
                .expect("Never fails"),
        }
    }

    pub(crate) fn set_status(&self, state: PoolState) {
        self.status.set(f64::from(state as u8));
    }

    pub(crate) fn set_block_size(&self, block_size: usize) {
        self.block_size.set(block_size as f64);
    }

    pub(crate) fn set_counts(&self, counts: BlockCounts) {
        self.block_count.set(counts.total as f64);
        self.free_blocks.set(counts.free as f64);
        self.touched_blocks.set(counts.touched as f64);
        self.live_blocks.set(counts.live as f64);
    }
}

/// ゲージに反映するブロック数の組.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct BlockCounts {
    pub total: usize,
    pub free: usize,
    pub touched: usize,
    pub live: usize,
}
