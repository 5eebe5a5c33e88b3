//! Builder Module
//!
//! Fluent Builder APIを提供し、`XlsxReader`インスタンスを段階的に構築する。

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::api::{HeaderMode, Policy, SheetSelector};
use crate::error::XlsxStreamError;
use crate::parser::{FileSource, MemorySource, PackageSource};
use crate::reader::XlsxReader;
use crate::security::SecurityConfig;

/// リーダーの設定を保持する内部構造体
#[derive(Debug, Clone, Default)]
pub(crate) struct ReaderConfig {
    /// シート選択方式
    pub sheet: SheetSelector,

    /// ヘッダー行の扱い
    pub header: HeaderMode,

    /// 共有文字列の解決戦略
    pub policy: Policy,

    /// セキュリティ制限
    pub security: SecurityConfig,
}

impl ReaderConfig {
    /// 設定を検証し、正規化した設定を返す
    fn validate(mut self) -> Result<Self, XlsxStreamError> {
        // 1. 空のシート名は先頭シートとして扱う
        if matches!(&self.sheet, SheetSelector::Name(name) if name.is_empty()) {
            self.sheet = SheetSelector::First;
        }

        // 2. 期待される列名の重複を検出
        if let HeaderMode::Expected(ref names) = self.header {
            let mut seen = HashSet::with_capacity(names.len());
            for name in names {
                if !seen.insert(name.as_str()) {
                    return Err(XlsxStreamError::Config(format!(
                        "Duplicate expected column: '{}'",
                        name
                    )));
                }
            }
        }

        Ok(self)
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `XlsxReader`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use xlsxstream::{Policy, ReaderBuilder};
///
/// # fn main() -> Result<(), xlsxstream::XlsxStreamError> {
/// let reader = ReaderBuilder::new()
///     .with_sheet_name("Orders")
///     .with_policy(Policy::LowMemory)
///     .with_expected_columns(["order_id", "amount"])
///     .open("orders.xlsx")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    /// 内部設定（構築中）
    config: ReaderConfig,
}

impl ReaderBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - シート選択: 先頭のシート
    /// - ヘッダー: なし（すべての行を出力）
    /// - 共有文字列: `Policy::Fast`
    pub fn new() -> Self {
        Self::default()
    }

    /// 読み込むシートを選択する
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxstream::{ReaderBuilder, SheetSelector};
    ///
    /// let builder = ReaderBuilder::new().with_sheet(SheetSelector::Index(2));
    /// ```
    pub fn with_sheet(mut self, selector: SheetSelector) -> Self {
        self.config.sheet = selector;
        self
    }

    /// 読み込むシートを名前で選択する
    ///
    /// 空文字列の場合は先頭のシートを読み込みます。
    pub fn with_sheet_name(self, name: impl Into<String>) -> Self {
        self.with_sheet(SheetSelector::Name(name.into()))
    }

    /// 共有文字列の解決戦略を指定する
    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.config.policy = policy;
        self
    }

    /// ヘッダー行の扱いを指定する
    pub fn with_header(mut self, header: HeaderMode) -> Self {
        self.config.header = header;
        self
    }

    /// 期待される列名リストを指定する（`HeaderMode::Expected`の省略形）
    ///
    /// 出力される行はこのリストの順序で並びます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxstream::ReaderBuilder;
    ///
    /// let builder = ReaderBuilder::new().with_expected_columns(["age", "name"]);
    /// ```
    pub fn with_expected_columns<I, T>(self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.with_header(HeaderMode::Expected(
            names.into_iter().map(Into::into).collect(),
        ))
    }

    /// `.xlsx`ファイルを開く
    ///
    /// # 戻り値
    ///
    /// * `Ok(XlsxReader)` - ヘッダー行の照合まで完了したリーダー
    /// * `Err(XlsxStreamError::InvalidFormat)` - 拡張子が`.xlsx`でない、
    ///   またはファイルがXLSXとして読めない場合
    /// * `Err(XlsxStreamError::SheetNotFound)` - 指定したシートが存在しない場合
    /// * `Err(XlsxStreamError::SchemaMismatch)` - ヘッダー行が期待される列と一致しない場合
    /// * `Err(XlsxStreamError::Config)` - 期待される列名が重複している場合
    pub fn open(self, path: impl AsRef<Path>) -> Result<XlsxReader<FileSource>, XlsxStreamError> {
        let config = self.config.validate()?;
        XlsxReader::open(FileSource::new(path)?, &config)
    }

    /// メモリ上のXLSXデータを開く
    ///
    /// 拡張子の検証は行いません。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use xlsxstream::ReaderBuilder;
    ///
    /// # fn main() -> Result<(), xlsxstream::XlsxStreamError> {
    /// let bytes = std::fs::read("report.xlsx")?;
    /// let reader = ReaderBuilder::new().open_bytes(bytes)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open_bytes(
        self,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<XlsxReader<MemorySource>, XlsxStreamError> {
        self.open_source(MemorySource::new(bytes))
    }

    /// 任意の[`PackageSource`]から開く
    pub fn open_source<S: PackageSource>(self, source: S) -> Result<XlsxReader<S>, XlsxStreamError> {
        let config = self.config.validate()?;
        XlsxReader::open(source, &config)
    }
}
