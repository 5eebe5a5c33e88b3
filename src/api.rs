//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

/// 共有文字列の解決戦略
///
/// リーダー構築時に一度だけ選択され、ストリーミング中に切り替わることはありません。
/// どちらの戦略でも解決される文字列は完全に一致し、違いは時間と空間の
/// トレードオフのみです。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Policy {
    /// 共有文字列テーブルを`open`時にすべて読み込む（デフォルト）
    ///
    /// 参照はO(1)、メモリ使用量はユニーク文字列の総バイト数に比例します。
    #[default]
    Fast,

    /// 共有文字列テーブルを事前に読み込まず、参照のたびに走査する
    ///
    /// 昇順の参照パターンでは償却O(1)、最悪O(n)。
    /// メモリ使用量は読み込みバッファ1つ分と直近の1エントリのみです。
    LowMemory,
}

/// シート選択方式
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SheetSelector {
    /// ワークブックの最初のシート（デフォルト）
    #[default]
    First,

    /// シート名指定
    ///
    /// 空文字列は`First`として扱われます。
    /// 例: `SheetSelector::Name("Sheet1".to_string())`
    Name(String),

    /// インデックス指定（0始まり、ワークブック内の並び順）
    Index(usize),
}

/// ヘッダー行の扱い
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum HeaderMode {
    /// ヘッダーなし（デフォルト）
    ///
    /// すべての行をそのまま出力します。行の長さはその行で見つかった
    /// 最大の列位置までとなり、欠落したセルは空文字列で埋められます。
    #[default]
    None,

    /// 先頭行をヘッダーとしてそのまま採用する（検証なし）
    ///
    /// 以降の行はヘッダーと同じ長さの固定長で出力され、
    /// ヘッダーの範囲外の列は無視されます。
    FirstRow,

    /// 先頭行を期待される列名リストと照合する
    ///
    /// 出力される行は、このリストの順序に並べ替えられます。
    /// 一致しない場合は`XlsxStreamError::SchemaMismatch`になります。
    ///
    /// 例: `HeaderMode::Expected(vec!["age".to_string(), "name".to_string()])`
    Expected(Vec<String>),
}

impl HeaderMode {
    /// 先頭行をヘッダーとして消費するかどうか
    pub(crate) fn reads_header(&self) -> bool {
        !matches!(self, HeaderMode::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(Policy::default(), Policy::Fast);
        assert_eq!(SheetSelector::default(), SheetSelector::First);
        assert_eq!(HeaderMode::default(), HeaderMode::None);
    }

    #[test]
    fn test_reads_header() {
        assert!(!HeaderMode::None.reads_header());
        assert!(HeaderMode::FirstRow.reads_header());
        assert!(HeaderMode::Expected(vec!["a".to_string()]).reads_header());
    }
}
