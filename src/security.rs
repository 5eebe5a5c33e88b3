//! Security Module
//!
//! ZIPアーカイブを開く際のセキュリティ制限を実装するモジュール。
//! エントリ数の上限、全量解析するマニフェストパーツのサイズ上限、
//! パストラバーサル対策を提供します。

use crate::error::XlsxStreamError;

/// セキュリティ設定
///
/// シートデータと共有文字列はストリーミングで読むためサイズ上限を設けず、
/// メモリに全量展開するパーツにのみ上限を適用します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 全量解析するパーツ（workbook.xml, workbook.xml.rels）の最大展開サイズ（バイト）
    /// デフォルト: 16MB (16_777_216 bytes)
    pub max_manifest_size: u64,
    /// `uniqueCount`属性から事前確保する共有文字列テーブルの最大要素数
    /// デフォルト: 1_048_576
    pub max_shared_string_hint: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_file_count: 10_000,
            max_manifest_size: 16_777_216, // 16MB
            max_shared_string_hint: 1_048_576,
        }
    }
}

impl SecurityConfig {
    /// アーカイブのエントリ数を検証
    pub fn check_file_count(&self, count: usize) -> Result<(), XlsxStreamError> {
        if count > self.max_file_count {
            return Err(XlsxStreamError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                count, self.max_file_count
            )));
        }
        Ok(())
    }

    /// 全量解析するパーツの展開サイズを検証
    pub fn check_manifest_size(&self, name: &str, size: u64) -> Result<(), XlsxStreamError> {
        if size > self.max_manifest_size {
            return Err(XlsxStreamError::SecurityViolation(format!(
                "Part '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                name, size, self.max_manifest_size
            )));
        }
        Ok(())
    }
}

/// ファイルパスの検証
///
/// パストラバーサル攻撃を防ぐため、リレーションシップから解決した
/// パーツのパスを検証します。
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:\`やUnix形式の`/`で始まるパス）
    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}
