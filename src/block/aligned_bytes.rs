use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::{cmp, ptr, slice};

use crate::block::Alignment;
use crate::{ErrorKind, Result};

/// 開始位置が指定のアライメント境界に揃えられたバイト列.
///
/// 内部的なメモリ管理の方法が異なるだけで、基本的には通常のバイト列(e.g., `&[u8]`)と同様に扱うことが可能.
///
/// 内部バッファは`alloc_zeroed`で確保される.
/// 確保時に全体へ書き込みを行うことはないため、大きなバイト列でも生成コストは長さに比例しない.
#[derive(Debug)]
pub(crate) struct AlignedBytes {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
    alignment: Alignment,
}
impl AlignedBytes {
    /// 新しい`AlignedBytes`インスタンスを生成する.
    ///
    /// 結果のバイト列はゼロ埋めされている.
    ///
    /// # Errors
    ///
    /// バッファの確保に失敗した場合には、種類が`ErrorKind::InitializationFailure`のエラーが返される.
    pub fn new(len: usize, alignment: Alignment) -> Result<Self> {
        let (ptr, layout) = track_assert_some!(
            allocate_zeroed(len, alignment),
            ErrorKind::InitializationFailure,
            "Cannot allocate {} bytes (alignment={})",
            len,
            alignment.as_usize()
        );
        Ok(AlignedBytes {
            ptr,
            len,
            layout,
            alignment,
        })
    }

    /// このバイト列のアライメントを返す.
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// バイト列の先頭アドレスを返す.
    ///
    /// 値は常に`self.alignment()`の境界に揃っている.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// 既存の内容を保持したまま、長さを`new_len`に拡張する.
    ///
    /// 常に再アロケートが行われるため、先頭アドレスは変化する.
    ///
    /// 拡張部分はゼロ埋めされる.
    ///
    /// # Errors
    ///
    /// 再アロケートに失敗した場合には、種類が`ErrorKind::GrowthFailure`のエラーが返される.
    ///
    /// この場合、バイト列の内容および長さは呼び出し前のまま変化しない.
    pub fn try_resize(&mut self, new_len: usize) -> Result<()> {
        track_assert!(
            new_len >= self.len,
            ErrorKind::InvalidInput,
            "Cannot shrink {} bytes to {} bytes",
            self.len,
            new_len
        );
        let (new_ptr, new_layout) = track_assert_some!(
            allocate_zeroed(new_len, self.alignment),
            ErrorKind::GrowthFailure,
            "Cannot reallocate {} bytes to {} bytes",
            self.len,
            new_len
        );

        // 新旧のバッファは別々に確保されたものなので重ならない
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len);
            alloc::dealloc(self.ptr.as_ptr(), self.layout);
        }
        self.ptr = new_ptr;
        self.len = new_len;
        self.layout = new_layout;
        Ok(())
    }
}
impl Drop for AlignedBytes {
    fn drop(&mut self) {
        unsafe {
            alloc::dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}
impl std::ops::Deref for AlignedBytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}
impl std::ops::DerefMut for AlignedBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}
impl AsRef<[u8]> for AlignedBytes {
    fn as_ref(&self) -> &[u8] {
        &*self
    }
}
impl AsMut<[u8]> for AlignedBytes {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut *self
    }
}

// `Vec<u8>`と同様に、内部バッファを排他的に所有している
unsafe impl Send for AlignedBytes {}
unsafe impl Sync for AlignedBytes {}

// ゼロ埋めされたバッファを確保する.
//
// ゼロ埋めのコストを省くために`alloc_zeroed`を使用している(大きな領域ではOSが遅延的にゼロページを割り当てる).
// 長さが`0`の場合にも、最低1バイトは確保する.
//
// レイアウトの計算に失敗した場合や確保失敗時には`None`を返す.
fn allocate_zeroed(len: usize, alignment: Alignment) -> Option<(NonNull<u8>, Layout)> {
    let layout = Layout::from_size_align(cmp::max(len, 1), alignment.as_usize()).ok()?;
    let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) })?;
    Some((ptr, layout))
}
