//! Reader Module
//!
//! シートの行をコールバックにストリーミングするリーダーのファサード。
//!
//! `open`でパーツの解決、共有文字列リゾルバの構築、ヘッダー行の照合までを行い、
//! [`XlsxReader::fetch_rows`]で残りの行を1行ずつコールバックに渡します。

use chrono::NaiveDateTime;
use log::debug;
use std::io::BufReader;
use std::ops::ControlFlow;

use crate::api::{HeaderMode, Policy};
use crate::builder::ReaderConfig;
use crate::date::to_calendar_time;
use crate::error::XlsxStreamError;
use crate::parser::package::{Package, PartReader};
use crate::parser::shared_strings::SharedStrings;
use crate::parser::sheet::{estimate_row_count, RowLayout, RowTokenizer};
use crate::parser::{FileSource, PackageSource};
use crate::schema::{match_columns, ColumnMap};

/// ストリーミング中に保持するパーツのカーソル
struct Streams<S: PackageSource> {
    tokenizer: RowTokenizer<BufReader<PartReader<S::Stream>>>,
    strings: SharedStrings<S>,
}

/// 1つのシートの行をストリーミングするリーダー
///
/// [`ReaderBuilder`](crate::ReaderBuilder)で構築します。
/// 行バッファは行ごとに再利用されるため、コールバックに渡される`&[String]`は
/// その呼び出しの間だけ有効です。
///
/// # 使用例
///
/// ```rust,no_run
/// use std::ops::ControlFlow;
/// use xlsxstream::{ReaderBuilder, XlsxStreamError};
///
/// # fn main() -> Result<(), XlsxStreamError> {
/// let mut reader = ReaderBuilder::new()
///     .with_expected_columns(["id", "name"])
///     .open("members.xlsx")?;
///
/// reader.fetch_rows(|row| {
///     println!("{} => {}", row[0], row[1]);
///     ControlFlow::<()>::Continue(())
/// })?;
/// reader.close();
/// # Ok(())
/// # }
/// ```
pub struct XlsxReader<S: PackageSource = FileSource> {
    package: Package<S>,
    streams: Option<Streams<S>>,
    policy: Policy,
    header: Vec<String>,
    columns: Vec<String>,
    column_map: Option<ColumnMap>,
    row_count: Option<usize>,
}

impl<S: PackageSource> XlsxReader<S> {
    /// パッケージを開き、ヘッダー行の処理までを行う
    pub(crate) fn open(source: S, config: &ReaderConfig) -> Result<Self, XlsxStreamError> {
        let package = Package::open(source, &config.sheet, &config.security)?;
        let mut strings = SharedStrings::open(
            &package.source,
            package.shared_strings.as_ref(),
            config.policy,
            &config.security,
        );
        let mut tokenizer = RowTokenizer::new(BufReader::new(package.open_sheet()?));

        let mut header = Vec::new();
        if config.header.reads_header() && tokenizer.next_row(&mut strings, RowLayout::Sparse)? {
            header = tokenizer.row().to_vec();
        }

        let (columns, column_map) = match &config.header {
            HeaderMode::FirstRow => (header.clone(), Some(ColumnMap::identity(header.len()))),
            HeaderMode::Expected(expected) => {
                let map = match_columns(expected, &header)?;
                (expected.clone(), Some(map))
            }
            HeaderMode::None => (Vec::new(), None),
        };

        debug!(
            "reader ready: sheet '{}', policy {:?}, {} header columns, {} output columns",
            package.parts.sheet_name,
            config.policy,
            header.len(),
            columns.len()
        );

        Ok(Self {
            package,
            streams: Some(Streams { tokenizer, strings }),
            policy: config.policy,
            header,
            columns,
            column_map,
            row_count: None,
        })
    }

    /// 残りの行を順にコールバックへ渡す
    ///
    /// コールバックが`ControlFlow::Break(value)`を返すと、その時点で読み込みを止めて
    /// `Ok(ControlFlow::Break(value))`を返します。停止はエラーではなく、
    /// 再度呼び出すと次の行から再開します。
    ///
    /// # 戻り値
    ///
    /// * `Ok(ControlFlow::Continue(()))` - シートの終端まで読み込んだ
    /// * `Ok(ControlFlow::Break(value))` - コールバックが停止を要求した
    /// * `Err(XlsxStreamError::Closed)` - `close`済みの場合
    /// * `Err(XlsxStreamError::Xml)` - シートのXMLが壊れている場合
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use std::ops::ControlFlow;
    /// use xlsxstream::ReaderBuilder;
    ///
    /// # fn main() -> Result<(), xlsxstream::XlsxStreamError> {
    /// let mut reader = ReaderBuilder::new().open("large.xlsx")?;
    ///
    /// // 先頭3行だけ読む
    /// let mut seen = 0;
    /// reader.fetch_rows(|_row| {
    ///     seen += 1;
    ///     if seen == 3 {
    ///         ControlFlow::Break(())
    ///     } else {
    ///         ControlFlow::Continue(())
    ///     }
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn fetch_rows<B, F>(&mut self, mut callback: F) -> Result<ControlFlow<B>, XlsxStreamError>
    where
        F: FnMut(&[String]) -> ControlFlow<B>,
    {
        let streams = self.streams.as_mut().ok_or(XlsxStreamError::Closed)?;
        let layout = match &self.column_map {
            Some(map) => RowLayout::Mapped(map),
            None => RowLayout::Sparse,
        };
        while streams.tokenizer.next_row(&mut streams.strings, layout)? {
            if let ControlFlow::Break(value) = callback(streams.tokenizer.row()) {
                return Ok(ControlFlow::Break(value));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// シートの行数（ヘッダー行を含む）
    ///
    /// 初回の呼び出しでシートパーツを別のストリームで走査し、結果をキャッシュします。
    /// ストリーミングの位置には影響しません。
    pub fn row_count(&mut self) -> Result<usize, XlsxStreamError> {
        if self.streams.is_none() {
            return Err(XlsxStreamError::Closed);
        }
        if let Some(count) = self.row_count {
            return Ok(count);
        }
        let count = estimate_row_count(BufReader::new(self.package.open_sheet()?))?;
        debug!("sheet '{}' has {} rows", self.package.parts.sheet_name, count);
        self.row_count = Some(count);
        Ok(count)
    }

    /// ストリームを解放する
    ///
    /// 何度呼び出しても安全です。以降の`fetch_rows`と`row_count`は
    /// `XlsxStreamError::Closed`を返します。
    pub fn close(&mut self) {
        if self.streams.take().is_some() {
            debug!("closed reader for sheet '{}'", self.package.parts.sheet_name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.streams.is_none()
    }

    /// ヘッダー行のセル値（ヘッダーを読まない設定の場合は空）
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// 出力行の各位置の列名
    ///
    /// `HeaderMode::Expected`では期待される列名リスト、`HeaderMode::FirstRow`では
    /// ヘッダー行、`HeaderMode::None`では空になります。
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// 読み込み中のシート名
    pub fn sheet_name(&self) -> &str {
        &self.package.parts.sheet_name
    }

    /// ワークブック内のすべてのシート名（並び順）
    pub fn sheet_names(&self) -> &[String] {
        &self.package.parts.sheet_names
    }

    /// シートパーツのアーカイブ内パス
    pub fn sheet_part_path(&self) -> &str {
        &self.package.sheet.name
    }

    /// 共有文字列パーツのアーカイブ内パス（存在しない場合は`None`）
    pub fn shared_strings_part_path(&self) -> Option<&str> {
        self.package
            .shared_strings
            .as_ref()
            .map(|part| part.name.as_str())
    }

    /// ワークブックが1904年日付システムを使用しているか
    pub fn is_1904(&self) -> bool {
        self.package.parts.is_1904
    }

    /// シリアル日付値をこのワークブックの日付システムで日時に変換する
    pub fn to_calendar_time(&self, serial: f64) -> Result<NaiveDateTime, XlsxStreamError> {
        to_calendar_time(serial, self.is_1904())
    }
}
