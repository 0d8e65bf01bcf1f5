/// crate固有のエラー型.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(trackable::error::TrackableError<ErrorKind>);

/// 発生し得るエラーの種別.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// アロケータの構築に失敗した.
    ///
    /// ブロックサイズやブロック数、アライメントの指定が不正な場合や、
    /// 初期バッファの確保ができなかった場合に、このエラーが返される.
    ///
    /// この場合、アロケータの状態は変化しない.
    ///
    /// # 典型的な対応策
    ///
    /// - 入力を修正する
    /// - より小さいブロック数で再度構築を試みる
    InitializationFailure,

    /// プールを拡張するための再アロケートに失敗した.
    ///
    /// `max_block_count`の上限に達している場合にも、このエラーが返される.
    ///
    /// 発行済みのブロックやフリーリストの状態は、失敗前のまま保たれている.
    ///
    /// # 典型的な対応策
    ///
    /// - 不要なブロックを解放してから、再度割当を試みる
    /// - 諦めて処理を中断する
    GrowthFailure,

    /// 解放対象のブロックが不正.
    ///
    /// 二重解放、未割当ブロックの解放、他のアロケータ由来のハンドル・アドレスの解放、等.
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側のプログラムを修正する
    InvalidFree,

    /// 破棄済みのアロケータに対して操作が行われた.
    ///
    /// # 典型的な対応策
    ///
    /// - `create()`を呼び出してから利用する
    UseAfterDestroy,

    /// 未初期化のアロケータに対して操作が行われた.
    ///
    /// # 典型的な対応策
    ///
    /// - `create()`を呼び出してから利用する
    Uninitialized,

    /// 入力が不正.
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側のプログラムを修正して入力を正しくする
    InvalidInput,
}
impl trackable::error::ErrorKind for ErrorKind {}
