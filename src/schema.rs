//! Column Schema Module
//!
//! ヘッダー行と期待される列名リストを照合し、
//! ソース列インデックスから出力行の位置への対応表を構築するモジュール。

use crate::error::XlsxStreamError;

/// ソース列（0始まり）から出力行の位置への対応表
///
/// `max_index`より右の列は行の再構築時に読み飛ばされます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    /// ソース列インデックス -> 出力位置（`max_index + 1`要素）
    destinations: Vec<Option<usize>>,
    /// 出力行の長さ
    width: usize,
}

impl ColumnMap {
    /// ヘッダーをそのまま採用する恒等写像を生成
    pub fn identity(width: usize) -> Self {
        Self {
            destinations: (0..width).map(Some).collect(),
            width,
        }
    }

    /// ソース列に対応する出力位置を取得
    pub fn destination(&self, source: usize) -> Option<usize> {
        self.destinations.get(source).copied().flatten()
    }

    /// 出力行の長さ
    pub fn width(&self) -> usize {
        self.width
    }

    /// 保持する必要がある最大のソース列インデックス
    ///
    /// 対応する列が1つもない場合は`None`を返します。
    pub fn max_index(&self) -> Option<usize> {
        self.destinations.len().checked_sub(1)
    }
}

/// 期待される列名リストをヘッダー行と照合する
///
/// 完全一致で比較し、ヘッダーに同名の列が複数ある場合は最初の列を採用します。
///
/// # 引数
///
/// * `expected` - 出力行の順序で並べた期待される列名
/// * `discovered` - ヘッダー行のセル値（ソース列順）
///
/// # 戻り値
///
/// * `Ok(ColumnMap)` - 各期待列のソース列から、期待リスト内の位置への対応表
/// * `Err(XlsxStreamError::SchemaMismatch)` - 期待リストがヘッダーより長い、
///   または期待される列名がヘッダーに存在しない場合
///
/// # 使用例
///
/// ```rust
/// use xlsxstream::match_columns;
///
/// let header = vec!["name".to_string(), "age".to_string()];
/// let map = match_columns(&["age", "name"], &header).unwrap();
/// assert_eq!(map.destination(1), Some(0));
/// assert_eq!(map.destination(0), Some(1));
/// ```
pub fn match_columns<S: AsRef<str>>(
    expected: &[S],
    discovered: &[String],
) -> Result<ColumnMap, XlsxStreamError> {
    if expected.len() > discovered.len() {
        return Err(XlsxStreamError::SchemaMismatch(format!(
            "expected {} columns but the header has only {}",
            expected.len(),
            discovered.len()
        )));
    }

    let mut destinations: Vec<Option<usize>> = Vec::new();
    for (position, name) in expected.iter().enumerate() {
        let name = name.as_ref();
        let source = discovered
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| {
                XlsxStreamError::SchemaMismatch(format!("column '{}' not found in header", name))
            })?;
        if destinations.len() <= source {
            destinations.resize(source + 1, None);
        }
        destinations[source] = Some(position);
    }

    Ok(ColumnMap {
        destinations,
        width: expected.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_identity() {
        let map = ColumnMap::identity(3);
        assert_eq!(map.width(), 3);
        assert_eq!(map.max_index(), Some(2));
        assert_eq!(map.destination(0), Some(0));
        assert_eq!(map.destination(2), Some(2));
        assert_eq!(map.destination(3), None);
    }

    #[test]
    fn test_identity_empty() {
        let map = ColumnMap::identity(0);
        assert_eq!(map.width(), 0);
        assert_eq!(map.max_index(), None);
        assert_eq!(map.destination(0), None);
    }

    #[test]
    fn test_reordered_columns() {
        let map = match_columns(&["age", "name"], &header(&["name", "age"])).unwrap();
        assert_eq!(map.width(), 2);
        assert_eq!(map.destination(0), Some(1));
        assert_eq!(map.destination(1), Some(0));
        assert_eq!(map.max_index(), Some(1));
    }

    #[test]
    fn test_subset_tracks_max_index() {
        let discovered = header(&["id", "name", "age", "note", "extra"]);
        let map = match_columns(&["age", "id"], &discovered).unwrap();
        assert_eq!(map.width(), 2);
        assert_eq!(map.destination(0), Some(1));
        assert_eq!(map.destination(1), None);
        assert_eq!(map.destination(2), Some(0));
        assert_eq!(map.destination(3), None);
        assert_eq!(map.max_index(), Some(2));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let map = match_columns(&["a"], &header(&["x", "a", "a"])).unwrap();
        assert_eq!(map.destination(1), Some(0));
        assert_eq!(map.destination(2), None);
        assert_eq!(map.max_index(), Some(1));
    }

    #[test]
    fn test_expected_longer_than_header() {
        match match_columns(&["a", "b", "c"], &header(&["a", "b"])) {
            Err(XlsxStreamError::SchemaMismatch(msg)) => assert!(msg.contains("only 2")),
            other => panic!("Expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_column() {
        match match_columns(&["a", "z"], &header(&["a", "b", "c"])) {
            Err(XlsxStreamError::SchemaMismatch(msg)) => assert!(msg.contains("'z'")),
            other => panic!("Expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_exact_match_only() {
        assert!(match_columns(&["Name"], &header(&["name"])).is_err());
        assert!(match_columns(&["name"], &header(&["name "])).is_err());
    }

    #[test]
    fn test_matching_is_idempotent() {
        let discovered = header(&["c", "b", "a", "b"]);
        let first = match_columns(&["a", "b"], &discovered).unwrap();
        let second = match_columns(&["a", "b"], &discovered).unwrap();
        assert_eq!(first, second);
    }
}
