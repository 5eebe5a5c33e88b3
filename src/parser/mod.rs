//! Parser Module
//!
//! XLSXパッケージの低レベル解析。
//!
//! - [`package`]: ZIPコンテナとパーツの解決
//! - [`shared_strings`]: 共有文字列のインデックス解決
//! - [`sheet`]: ワークシートの行トークナイザと行数の見積もり

pub(crate) mod package;
pub(crate) mod shared_strings;
pub(crate) mod sheet;

pub use package::{FileSource, MemorySource, PackageSource};

/// テスト用のXLSXパッケージ生成
#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    pub fn build_package_with(method: CompressionMethod, entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(method);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn build_package(entries: &[(&str, &str)]) -> Vec<u8> {
        build_package_with(CompressionMethod::Deflated, entries)
    }

    pub fn workbook_xml(names: &[&str], date1904: bool) -> String {
        let sheets: String = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                format!(
                    r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                    name,
                    i + 1,
                    i + 1
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr date1904="{}"/><sheets>{}</sheets></workbook>"#,
            if date1904 { "1" } else { "0" },
            sheets
        )
    }

    pub fn workbook_rels_xml(sheet_count: usize, shared_strings: bool) -> String {
        let mut rels: String = (1..=sheet_count)
            .map(|i| {
                format!(
                    r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                    i, i
                )
            })
            .collect();
        if shared_strings {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
                sheet_count + 1
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            rels
        )
    }

    pub fn shared_strings_xml(strings: &[&str]) -> String {
        let entries: String = strings
            .iter()
            .map(|s| {
                let escaped = s
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;");
                format!("<si><t>{}</t></si>", escaped)
            })
            .collect();
        format!(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{}" uniqueCount="{}">{}</sst>"#,
            strings.len(),
            strings.len(),
            entries
        )
    }

    /// シート名と`<worksheet>`の中身からパッケージを生成
    pub fn simple_package(sheets: &[(&str, &str)], shared: Option<&[&str]>) -> Vec<u8> {
        let names: Vec<&str> = sheets.iter().map(|(name, _)| *name).collect();
        let mut parts = vec![
            ("xl/workbook.xml".to_string(), workbook_xml(&names, false)),
            (
                "xl/_rels/workbook.xml.rels".to_string(),
                workbook_rels_xml(sheets.len(), shared.is_some()),
            ),
        ];
        for (i, (_, body)) in sheets.iter().enumerate() {
            parts.push((
                format!("xl/worksheets/sheet{}.xml", i + 1),
                format!(
                    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{}</worksheet>"#,
                    body
                ),
            ));
        }
        if let Some(strings) = shared {
            parts.push(("xl/sharedStrings.xml".to_string(), shared_strings_xml(strings)));
        }
        let entries: Vec<(&str, &str)> = parts
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_str()))
            .collect();
        build_package(&entries)
    }
}
