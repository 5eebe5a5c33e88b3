//! Security Tests
//!
//! セキュリティ対策のテストケースを実装します。
//! ZIP bomb攻撃、XXE攻撃、パストラバーサル攻撃などへの対策を検証します。

use std::io::{Cursor, Write};
use std::ops::ControlFlow;
use xlsxstream::{Policy, ReaderBuilder, XlsxStreamError};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

const WORKBOOK: &str = r#"<?xml version="1.0"?><workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

fn rels(sheet_target: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="{}"/></Relationships>"#,
        sheet_target
    )
}

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, content) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }
    zip_data
}

/// ZIP bomb攻撃のテスト: 大量のファイルを含むZIPアーカイブ
#[test]
fn test_zip_bomb_too_many_files() {
    // 10,001個のファイルを含むZIPアーカイブを作成（上限: 10,000）
    let mut zip_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut zip_data));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);

        for i in 0..10_001 {
            let file_name = format!("xl/file{}.xml", i);
            zip.start_file(file_name, options).unwrap();
            zip.write_all(b"test").unwrap();
        }

        zip.finish().unwrap();
    }

    match ReaderBuilder::new().open_bytes(zip_data) {
        Err(XlsxStreamError::SecurityViolation(msg)) => {
            assert!(msg.contains("too many files"));
        }
        Err(e) => panic!("Unexpected error: {:?}", e),
        Ok(_) => panic!("Expected SecurityViolation"),
    }
}

/// ZIP bomb攻撃のテスト: 全量解析するマニフェストパーツが大きすぎる
#[test]
fn test_oversized_manifest_part() {
    // 16MB + 1バイト（圧縮後は小さい）
    let mut workbook = WORKBOOK.as_bytes().to_vec();
    workbook.resize(16_777_217, b' ');

    let zip_data = build_zip(&[
        ("xl/workbook.xml", &workbook),
        ("xl/_rels/workbook.xml.rels", rels("worksheets/sheet1.xml").as_bytes()),
        ("xl/worksheets/sheet1.xml", b"<worksheet><sheetData/></worksheet>"),
    ]);

    match ReaderBuilder::new().open_bytes(zip_data) {
        Err(XlsxStreamError::SecurityViolation(msg)) => {
            assert!(msg.contains("exceeds maximum size"));
        }
        Err(e) => panic!("Unexpected error: {:?}", e),
        Ok(_) => panic!("Expected SecurityViolation"),
    }
}

/// パストラバーサル攻撃のテスト: リレーションシップのターゲットに`..`を含む
#[test]
fn test_path_traversal_in_relationship_target() {
    let zip_data = build_zip(&[
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels("../../etc/passwd").as_bytes()),
        ("etc/passwd", b"root:x:0:0"),
    ]);

    match ReaderBuilder::new().open_bytes(zip_data) {
        Err(XlsxStreamError::SecurityViolation(msg)) => {
            assert!(msg.contains("Path traversal"));
        }
        Err(e) => panic!("Unexpected error: {:?}", e),
        Ok(_) => panic!("Expected SecurityViolation"),
    }
}

/// パストラバーサル攻撃のテスト: 絶対パスのターゲットもパッケージ内に閉じる
#[test]
fn test_absolute_target_stays_inside_package() {
    let zip_data = build_zip(&[
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels("//etc/passwd").as_bytes()),
    ]);

    let result = ReaderBuilder::new().open_bytes(zip_data);
    assert!(matches!(result, Err(XlsxStreamError::SecurityViolation(_))));
}

/// パストラバーサル攻撃のテスト: バックスラッシュを含むターゲット
#[test]
fn test_backslash_in_relationship_target() {
    let zip_data = build_zip(&[
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels("worksheets\\..\\..\\secret.xml").as_bytes()),
    ]);

    match ReaderBuilder::new().open_bytes(zip_data) {
        Err(XlsxStreamError::SecurityViolation(msg)) => {
            assert!(msg.contains("Backslash"));
        }
        Err(e) => panic!("Unexpected error: {:?}", e),
        Ok(_) => panic!("Expected SecurityViolation"),
    }
}

/// 危険な名前のエントリは参照されない限り読み込まれない
#[test]
fn test_dangerous_entry_names_are_never_opened() {
    let zip_data = build_zip(&[("../etc/passwd", b"test"), ("/etc/shadow", b"test")]);

    let result = ReaderBuilder::new().open_bytes(zip_data);
    assert!(matches!(result, Err(XlsxStreamError::InvalidFormat(_))));
}

/// XXE攻撃のテスト: 外部エンティティは展開されない
#[test]
fn test_external_entities_are_not_expanded() {
    let sst = br#"<?xml version="1.0"?>
<!DOCTYPE sst [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<sst><si><t>&xxe;</t></si></sst>"#;
    let rels = r#"<?xml version="1.0"?><Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#;
    let zip_data = build_zip(&[
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels.as_bytes()),
        (
            "xl/worksheets/sheet1.xml",
            br#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c></row></sheetData></worksheet>"#,
        ),
        ("xl/sharedStrings.xml", sst),
    ]);

    for policy in [Policy::Fast, Policy::LowMemory] {
        let mut reader = ReaderBuilder::new()
            .with_policy(policy)
            .open_bytes(zip_data.clone())
            .expect("Failed to open package");
        let mut values = Vec::new();
        reader
            .fetch_rows(|row| {
                values.extend(row.iter().cloned());
                ControlFlow::<()>::Continue(())
            })
            .unwrap();
        assert_eq!(values, vec![String::new()], "policy {:?}", policy);
    }
}

/// `uniqueCount`が巨大でも事前確保は上限で打ち切られる
#[test]
fn test_huge_unique_count_hint() {
    let sst = br#"<sst count="1" uniqueCount="18446744073709551615"><si><t>ok</t></si></sst>"#;
    let rels = r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;
    let zip_data = build_zip(&[
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels.as_bytes()),
        (
            "xl/worksheets/sheet1.xml",
            br#"<worksheet><sheetData><row><c t="s"><v>0</v></c></row></sheetData></worksheet>"#,
        ),
        ("xl/sharedStrings.xml", sst),
    ]);

    let mut reader = ReaderBuilder::new().open_bytes(zip_data).unwrap();
    let mut first = String::new();
    reader
        .fetch_rows(|row| {
            first = row[0].clone();
            ControlFlow::Break(())
        })
        .unwrap();
    assert_eq!(first, "ok");
}

/// 正常なファイルの処理が成功することを確認
#[test]
fn test_valid_file_processing() {
    let zip_data = build_zip(&[
        ("xl/workbook.xml", WORKBOOK.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels("worksheets/sheet1.xml").as_bytes()),
        (
            "xl/worksheets/sheet1.xml",
            br#"<worksheet><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData></worksheet>"#,
        ),
    ]);

    let mut reader = ReaderBuilder::new()
        .open_bytes(zip_data)
        .expect("Valid package should open");
    assert_eq!(reader.row_count().unwrap(), 1);
}
