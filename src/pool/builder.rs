use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};

use crate::pool::PoolAllocator;
use crate::Result;

/// `PoolAllocator`のビルダ.
#[derive(Debug, Clone)]
pub struct PoolAllocatorBuilder {
    logger: Logger,
    metrics: MetricBuilder,
    max_block_count: Option<usize>,
}
impl PoolAllocatorBuilder {
    /// デフォルト設定で`PoolAllocatorBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        PoolAllocatorBuilder {
            logger: Logger::root(Discard, o!()),
            metrics: MetricBuilder::new(),
            max_block_count: None,
        }
    }

    /// アロケータ用の logger を登録する.
    ///
    /// デフォルトでは、ログは全て捨てられる.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// アリーナが保持可能なブロック数の上限を設定する.
    ///
    /// 拡張によってブロック数がこの値を超える場合には、
    /// `allocate()`は`ErrorKind::GrowthFailure`のエラーを返す.
    ///
    /// 拡張は常にブロック数を倍にする形で行われるため、
    /// 初期ブロック数の2の冪倍以外の値を指定した場合には、
    /// 実際に到達可能な上限は、この値以下で最大の「初期ブロック数の2の冪倍」となる.
    ///
    /// デフォルトでは上限なし.
    pub fn max_block_count(&mut self, n: usize) -> &mut Self {
        self.max_block_count = Some(n);
        self
    }

    /// 未初期化状態の`PoolAllocator`を生成する.
    ///
    /// 利用前に`PoolAllocator::create()`を呼び出す必要がある.
    pub fn finish(&self) -> PoolAllocator {
        PoolAllocator::with_options(self.logger.clone(), &self.metrics, self.max_block_count)
    }

    /// `PoolAllocator`を生成し、`PoolAllocator::create()`を呼び出した結果を返す.
    pub fn create(
        &self,
        block_size: usize,
        block_count: usize,
        alignment: usize,
    ) -> Result<PoolAllocator> {
        let mut pool = self.finish();
        track!(pool.create(block_size, block_count, alignment))?;
        Ok(pool)
    }
}
impl Default for PoolAllocatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
