//! Types Module
//!
//! セル座標と列文字（A, B, ..., AA）の相互変換を提供するモジュール。

use crate::error::XlsxStreamError;

/// 列数の上限（Excelの最大列 XFD = 16,384）
pub(crate) const MAX_COLUMNS: u32 = 16_384;

/// セル参照から0始まりの列インデックスを取得する
///
/// 末尾の行番号（数字）を取り除き、残りの文字を26進数
/// （A=1, Z=26, AA=27, ...）として解釈して0始まりに変換します。
/// 小文字も受け付けます。
///
/// # 引数
///
/// * `reference` - セル参照（例: `"A1"`, `"AC37"`）または列文字のみ（例: `"AC"`）
///
/// # 戻り値
///
/// * `Ok(u32)` - 0始まりの列インデックス
/// * `Err(XlsxStreamError::InvalidCellReference)` - 列文字がない、英字以外を含む、
///   または列数の上限を超える場合
///
/// # 使用例
///
/// ```rust
/// use xlsxstream::column_index;
///
/// assert_eq!(column_index("A1").unwrap(), 0);
/// assert_eq!(column_index("Z5").unwrap(), 25);
/// assert_eq!(column_index("AA1").unwrap(), 26);
/// assert!(column_index("42").is_err());
/// ```
pub fn column_index(reference: &str) -> Result<u32, XlsxStreamError> {
    let bytes = reference.as_bytes();
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1].is_ascii_digit() {
        end -= 1;
    }
    let letters = &bytes[..end];
    if letters.is_empty() {
        return Err(XlsxStreamError::InvalidCellReference(reference.to_string()));
    }

    let mut number: u32 = 0;
    for &b in letters {
        if !b.is_ascii_alphabetic() {
            return Err(XlsxStreamError::InvalidCellReference(reference.to_string()));
        }
        let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
        number = number * 26 + digit;
        if number > MAX_COLUMNS {
            return Err(XlsxStreamError::InvalidCellReference(reference.to_string()));
        }
    }
    Ok(number - 1)
}

/// 0始まりの列インデックスを列文字に変換する（0 -> "A", 25 -> "Z", 26 -> "AA"）
///
/// ```rust
/// use xlsxstream::column_letter;
///
/// assert_eq!(column_letter(0), "A");
/// assert_eq!(column_letter(701), "ZZ");
/// ```
pub fn column_letter(mut col: u32) -> String {
    let mut result = String::new();
    loop {
        let remainder = col % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    result
}

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列から座標を生成（例: "B3" -> (2, 1)）
    ///
    /// 行番号がない、または0の場合はエラーになります。
    pub fn from_a1_notation(reference: &str) -> Result<Self, XlsxStreamError> {
        let col = column_index(reference)?;
        let digits = reference.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        let row = digits
            .parse::<u32>()
            .ok()
            .filter(|&r| r >= 1)
            .ok_or_else(|| XlsxStreamError::InvalidCellReference(reference.to_string()))?;
        Ok(Self::new(row - 1, col))
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        format!("{}{}", column_letter(self.col), self.row + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_basic() {
        assert_eq!(column_index("A1").unwrap(), 0);
        assert_eq!(column_index("Z5").unwrap(), 25);
        assert_eq!(column_index("AA1").unwrap(), 26);
        assert_eq!(column_index("AC37").unwrap(), 28);
        assert_eq!(column_index("AZ1").unwrap(), 51);
        assert_eq!(column_index("BA1").unwrap(), 52);
        assert_eq!(column_index("ZZ100").unwrap(), 701);
        assert_eq!(column_index("BFB").unwrap(), 1509);
        assert_eq!(column_index("XFD1048576").unwrap(), 16_383);
    }

    #[test]
    fn test_column_index_letters_only_and_lowercase() {
        assert_eq!(column_index("C").unwrap(), 2);
        assert_eq!(column_index("ab12").unwrap(), 27);
    }

    #[test]
    fn test_column_index_rejects_missing_letters() {
        assert!(matches!(
            column_index("123"),
            Err(XlsxStreamError::InvalidCellReference(_))
        ));
        assert!(column_index("").is_err());
    }

    #[test]
    fn test_column_index_rejects_garbage() {
        assert!(column_index("A-1").is_err());
        assert!(column_index("1A").is_err());
        assert!(column_index("$A$1").is_err());
    }

    #[test]
    fn test_column_index_rejects_too_wide() {
        assert!(column_index("XFE1").is_err());
        assert!(column_index("ZZZZZZZZ1").is_err());
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(51), "AZ");
        assert_eq!(column_letter(52), "BA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(16_383), "XFD");
    }

    #[test]
    fn test_cell_coord_to_a1_notation() {
        assert_eq!(CellCoord::new(0, 0).to_a1_notation(), "A1");
        assert_eq!(CellCoord::new(0, 25).to_a1_notation(), "Z1");
        assert_eq!(CellCoord::new(99, 701).to_a1_notation(), "ZZ100");
    }

    #[test]
    fn test_cell_coord_from_a1_notation() {
        assert_eq!(CellCoord::from_a1_notation("A1").unwrap(), CellCoord::new(0, 0));
        assert_eq!(CellCoord::from_a1_notation("C107").unwrap(), CellCoord::new(106, 2));
        assert!(CellCoord::from_a1_notation("C").is_err());
        assert!(CellCoord::from_a1_notation("C0").is_err());
    }

    // プロパティベーステスト
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_a1_notation_round_trip(row in 0u32..1_048_576, col in 0u32..MAX_COLUMNS) {
                let coord = CellCoord::new(row, col);
                let a1 = coord.to_a1_notation();
                prop_assert_eq!(column_index(&a1).unwrap(), col);
                prop_assert_eq!(CellCoord::from_a1_notation(&a1).unwrap(), coord);
            }

            #[test]
            fn test_column_index_strictly_increasing(col in 0u32..(MAX_COLUMNS - 1), row in 1u32..1000) {
                let here = format!("{}{}", column_letter(col), row);
                let next = format!("{}{}", column_letter(col + 1), row);
                prop_assert!(column_index(&here).unwrap() < column_index(&next).unwrap());
            }
        }
    }
}
