//! プールのブロック(割当の最小単位)およびアライメント関連の構成要素.
use crate::{ErrorKind, Result};

pub(crate) use self::aligned_bytes::AlignedBytes;

mod aligned_bytes;

/// 空きブロックの先頭に埋め込まれるリンク(次の空きブロックのインデックス)のバイト幅.
pub const INDEX_WIDTH: usize = std::mem::size_of::<u64>();

/// プールが扱うブロックのサイズを表現するための構造体.
///
/// 空きブロックには、その先頭に次の空きブロックのインデックスが書き込まれるため、
/// ブロックサイズは最低でも[`INDEX_WIDTH`]バイト必要となる.
///
/// [`INDEX_WIDTH`]: ./constant.INDEX_WIDTH.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockSize(usize);
impl BlockSize {
    /// 許容されるブロックサイズの最小値.
    pub const MIN: usize = INDEX_WIDTH;

    /// 指定された値のブロックサイズを表現する`BlockSize`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// `block_size`が`BlockSize::MIN`未満の場合には、
    /// 種類が`ErrorKind::InitializationFailure`のエラーが返される.
    ///
    /// # Examples
    ///
    /// ```
    /// use blockpool::ErrorKind;
    /// use blockpool::block::BlockSize;
    ///
    /// assert_eq!(BlockSize::new(16).ok().map(|a| a.as_usize()), Some(16));
    /// assert_eq!(BlockSize::new(8).ok().map(|a| a.as_usize()), Some(8));
    ///
    /// assert_eq!(BlockSize::new(0).err().map(|e| *e.kind()), Some(ErrorKind::InitializationFailure));
    /// assert_eq!(BlockSize::new(7).err().map(|e| *e.kind()), Some(ErrorKind::InitializationFailure));
    /// ```
    pub fn new(block_size: usize) -> Result<Self> {
        track_assert!(
            block_size >= Self::MIN,
            ErrorKind::InitializationFailure,
            "block_size={}, min={}",
            block_size,
            Self::MIN
        );
        Ok(BlockSize(block_size))
    }

    /// ブロックサイズ値を`usize`に変換して返す.
    pub fn as_usize(self) -> usize {
        self.0
    }

    /// `count`個のブロックを格納するのに必要なバイト数を返す.
    ///
    /// オーバーフローする場合には`None`が返される.
    pub fn checked_bytes(self, count: usize) -> Option<usize> {
        self.0.checked_mul(count)
    }
}

/// アリーナの先頭アドレスに要求されるアライメント.
///
/// 値は常に2の冪となる.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alignment(usize);
impl Alignment {
    /// 指定された値のアライメントを表現する`Alignment`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// `alignment`が2の冪ではない場合には、
    /// 種類が`ErrorKind::InitializationFailure`のエラーが返される.
    ///
    /// # Examples
    ///
    /// ```
    /// use blockpool::ErrorKind;
    /// use blockpool::block::Alignment;
    ///
    /// assert_eq!(Alignment::new(1).ok().map(|a| a.as_usize()), Some(1));
    /// assert_eq!(Alignment::new(64).ok().map(|a| a.as_usize()), Some(64));
    ///
    /// assert_eq!(Alignment::new(0).err().map(|e| *e.kind()), Some(ErrorKind::InitializationFailure));
    /// assert_eq!(Alignment::new(24).err().map(|e| *e.kind()), Some(ErrorKind::InitializationFailure));
    /// ```
    pub fn new(alignment: usize) -> Result<Self> {
        track_assert!(
            alignment.is_power_of_two(),
            ErrorKind::InitializationFailure,
            "alignment={}",
            alignment
        );
        Ok(Alignment(alignment))
    }

    /// アライメント値を`usize`に変換して返す.
    pub fn as_usize(self) -> usize {
        self.0
    }
}
impl Default for Alignment {
    fn default() -> Self {
        Alignment(INDEX_WIDTH)
    }
}
