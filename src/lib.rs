//! Block Pool.
//!
//! `blockpool`は、同一サイズのブロック群を高速に割当・解放するための固定長ブロックアロケータ.
//!
//! # 特徴
//!
//! - 一つのアロケータインスタンスは、一種類のブロックサイズのみを扱う
//! - 全てのブロックは、アライメントが保証された単一の連続領域(アリーナ)から切り出される
//! - 空きブロックの管理には、空きブロック自体の先頭にリンクを書き込む"侵入型"の単方向リストを用いる
//!   - リストの構築は遅延して行われ、`create()`時にアリーナ全体を走査するコストは発生しない
//! - 空きブロックが枯渇した場合には、ブロック数を倍にしてアリーナを拡張する
//!   - 拡張によってアリーナの位置が変わり得るため、割当結果はインデックスベースのハンドルとして返される
//! - 割当・解放はいずれもO(1)（拡張時を除く）
//! - スレッドセーフではない（スレッド毎にインスタンスを用意するか、外部で排他を行うこと）
//!
//! # モジュールの依存関係
//!
//! ```text
//! pool => block
//! ```
//!
//! - [pool]モジュール:
//!   - 主に[PoolAllocator]構造体を提供
//!   - `blockpool`の利用者が直接触るのはこの構造体
//! - [block]モジュール:
//!   - ブロックサイズやアライメントの表現を提供
//!
//! # Examples
//!
//! ```
//! use blockpool::pool::PoolAllocatorBuilder;
//!
//! let mut pool = PoolAllocatorBuilder::new().create(16, 4, 16).unwrap();
//!
//! let a = pool.allocate().unwrap();
//! pool.block_mut(a.handle).unwrap()[..3].copy_from_slice(b"foo");
//! assert_eq!(&pool.block(a.handle).unwrap()[..3], b"foo");
//!
//! pool.deallocate(a.handle).unwrap();
//! assert_eq!(pool.allocate().unwrap().handle, a.handle);
//! ```
//!
//! [pool]: ./pool/index.html
//! [PoolAllocator]: ./pool/struct.PoolAllocator.html
//! [block]: ./block/index.html
#![warn(missing_docs)]
extern crate byteorder;
extern crate fixedbitset;
extern crate prometrics;
#[macro_use]
extern crate trackable;
extern crate uuid;
#[macro_use]
extern crate slog;

pub use crate::error::{Error, ErrorKind};

pub mod block;
pub mod metrics;
pub mod pool;

mod error;

/// crate固有の`Result`型.
pub type Result<T> = std::result::Result<T, Error>;
