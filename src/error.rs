//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use std::sync::Arc;
use thiserror::Error;

/// xlsxstreamクレート全体で使用するエラー型
///
/// ファイルの検証、パーツの解決、スキーマ照合、ストリーミング中に発生する
/// すべてのエラーを統一的に扱うために使用されます。
///
/// # エラーの分類
///
/// - フォーマットエラー（`InvalidFormat`, `Zip`）: 行を1つも出力する前に中断
/// - 解決エラー（`SheetNotFound`, `SchemaMismatch`）: ストリーミング開始前に中断
/// - 共有文字列の欠落: エラーにはならず、空文字列として回復される
/// - コールバックによる停止: エラーではなく`ControlFlow::Break`として返される
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxstream::{ReaderBuilder, XlsxStreamError};
///
/// match ReaderBuilder::new().with_sheet_name("Members").open("members.xlsx") {
///     Err(XlsxStreamError::SheetNotFound(name)) => eprintln!("no sheet named {}", name),
///     Err(e) => eprintln!("failed: {}", e),
///     Ok(_reader) => {}
/// }
/// ```
#[derive(Error, Debug)]
pub enum XlsxStreamError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIPアーカイブの読み込みエラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XMLの解析エラー
    #[error("XML parse error: {0}")]
    Xml(String),

    /// ファイル形式が不正
    ///
    /// 拡張子が`.xlsx`でない、ZIPとして読めない、必須パーツ
    /// （`xl/workbook.xml`など）が存在しない場合に発生します。
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// 指定された名前のシートが存在しない
    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    /// ヘッダー行が期待される列と一致しない
    ///
    /// 期待される列数がヘッダーの列数より多い場合、または期待される列名の
    /// いずれかがヘッダーに存在しない場合に発生します。
    #[error("Header does not match expected columns: {0}")]
    SchemaMismatch(String),

    /// セル参照（例: `A1`）の形式が不正
    #[error("Invalid cell reference: '{0}'")]
    InvalidCellReference(String),

    /// シリアル日付値を日時に変換できない
    #[error("Invalid serial date value: {0}")]
    InvalidSerialDate(f64),

    /// 設定の検証に失敗したエラー
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use xlsxstream::{ReaderBuilder, XlsxStreamError};
    ///
    /// let result = ReaderBuilder::new()
    ///     .with_expected_columns(["id", "id"])  // 重複した列名
    ///     .open("data.xlsx");
    ///
    /// match result {
    ///     Err(XlsxStreamError::Config(msg)) => println!("設定エラー: {}", msg),
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP内のファイル数超過、パストラバーサル、マニフェストパーツの
    /// サイズ超過などの場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// `close()`済みのリーダーを使用した
    #[error("Reader is closed")]
    Closed,
}

impl From<quick_xml::Error> for XlsxStreamError {
    fn from(e: quick_xml::Error) -> Self {
        match e {
            // パーツのストリーム（展開、CRC検証）で発生したエラー
            quick_xml::Error::Io(io_err) => XlsxStreamError::Io(
                Arc::try_unwrap(io_err)
                    .unwrap_or_else(|shared| std::io::Error::new(shared.kind(), shared.to_string())),
            ),
            other => XlsxStreamError::Xml(other.to_string()),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for XlsxStreamError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        XlsxStreamError::Xml(format!("attribute error: {}", e))
    }
}
