//! Package Module
//!
//! XLSXコンテナ（ZIPアーカイブ）を開き、ワークブックのマニフェストと
//! リレーションシップを解析して、対象シートと共有文字列のパーツを解決する。
//!
//! パーツのストリームはアーカイブから借用せず、ソースを開き直して
//! エントリのデータ位置にシークし、自前で展開する。これにより、シートの
//! カーソルと共有文字列のカーソルをリーダーの生存期間中それぞれ独立に保持できる。

use flate2::read::DeflateDecoder;
use flate2::CrcReader;
use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::{CompressionMethod, ZipArchive};

use crate::api::SheetSelector;
use crate::error::XlsxStreamError;
use crate::security::{validate_zip_path, SecurityConfig};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const PARTS_ROOT: &str = "xl/";

/// XLSXパッケージの読み込み元
///
/// パーツごとに独立したストリームを開けるよう、何度でも開き直せる必要があります。
pub trait PackageSource: Clone {
    /// 読み込みストリームの型
    type Stream: Read + Seek;

    /// 先頭から読み込む新しいストリームを開く
    fn open_stream(&self) -> io::Result<Self::Stream>;
}

/// ファイルパスから読み込むソース
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// 拡張子が`.xlsx`であることを検証してソースを生成
    pub fn new(path: impl AsRef<Path>) -> Result<Self, XlsxStreamError> {
        let path = path.as_ref();
        let is_xlsx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("xlsx"))
            .unwrap_or(false);
        if !is_xlsx {
            return Err(XlsxStreamError::InvalidFormat(format!(
                "file type must be xlsx: {}",
                path.display()
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PackageSource for FileSource {
    type Stream = BufReader<File>;

    fn open_stream(&self) -> io::Result<Self::Stream> {
        Ok(BufReader::new(File::open(&self.path)?))
    }
}

/// メモリ上のバイト列から読み込むソース
///
/// バッファは`Arc`で共有されるため、ストリームを開き直してもコピーは発生しません。
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

impl PackageSource for MemorySource {
    type Stream = Cursor<Arc<[u8]>>;

    fn open_stream(&self) -> io::Result<Self::Stream> {
        Ok(Cursor::new(Arc::clone(&self.data)))
    }
}

/// アーカイブ内のパーツの位置情報
#[derive(Debug, Clone)]
pub(crate) struct PartLocation {
    /// アーカイブ内のパス
    pub name: String,
    /// 圧縮データの開始オフセット
    data_start: u64,
    compressed_size: u64,
    /// 展開後のサイズ
    pub size: u64,
    /// 展開後のデータのCRC-32（セントラルディレクトリの値）
    crc32: u32,
    compression: CompressionMethod,
}

enum Decoded<R: Read> {
    Stored(io::Take<R>),
    Deflated(DeflateDecoder<io::Take<R>>),
}

impl<R: Read> Read for Decoded<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoded::Stored(r) => r.read(buf),
            Decoded::Deflated(r) => r.read(buf),
        }
    }
}

/// 1つのパーツの展開済みバイトストリーム
///
/// 展開後のサイズ分を読み終えた時点（または終端）でCRC-32を検証し、
/// 一致しなければ`InvalidData`のI/Oエラーを返します。
pub(crate) struct PartReader<R: Read> {
    inner: CrcReader<Decoded<R>>,
    name: String,
    expected_crc: u32,
    remaining: u64,
    verified: bool,
}

impl<R: Read> PartReader<R> {
    fn verify(&mut self) -> io::Result<()> {
        let actual = self.inner.crc().sum();
        if actual != self.expected_crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "CRC-32 mismatch in part '{}': expected {:08x}, found {:08x}",
                    self.name, self.expected_crc, actual
                ),
            ));
        }
        self.verified = true;
        Ok(())
    }
}

impl<R: Read> Read for PartReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.remaining = self.remaining.saturating_sub(n as u64);
        let at_end = self.remaining == 0 || (n == 0 && !buf.is_empty());
        if at_end && !self.verified {
            self.verify()?;
        }
        Ok(n)
    }
}

/// パーツを新しいストリームとして開く
pub(crate) fn open_part<S: PackageSource>(
    source: &S,
    part: &PartLocation,
) -> Result<PartReader<S::Stream>, XlsxStreamError> {
    let mut stream = source.open_stream()?;
    stream.seek(SeekFrom::Start(part.data_start))?;
    let limited = stream.take(part.compressed_size);
    let decoded = match part.compression {
        CompressionMethod::Stored => Decoded::Stored(limited),
        CompressionMethod::Deflated => Decoded::Deflated(DeflateDecoder::new(limited)),
        other => {
            return Err(XlsxStreamError::InvalidFormat(format!(
                "unsupported compression method {:?} for part '{}'",
                other, part.name
            )))
        }
    };
    Ok(PartReader {
        inner: CrcReader::new(decoded),
        name: part.name.clone(),
        expected_crc: part.crc32,
        remaining: part.size,
        verified: false,
    })
}

/// ワークブックのシートエントリ（マニフェストの1行）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetEntry {
    pub name: String,
    pub relationship_id: String,
}

/// `xl/workbook.xml`の解析結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WorkbookManifest {
    pub sheets: Vec<SheetEntry>,
    /// `<workbookPr date1904="1"/>`
    pub is_1904: bool,
}

/// `xl/_rels/workbook.xml.rels`の1エントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub target: String,
    pub kind: String,
}

/// 解決済みのパーツのパスとワークブック情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedParts {
    pub sheet_name: String,
    pub sheet_path: String,
    pub shared_strings_path: Option<String>,
    pub sheet_names: Vec<String>,
    pub is_1904: bool,
}

/// 開いたパッケージ
///
/// アーカイブのハンドルは保持せず、ソースとパーツの位置だけを保持します。
#[derive(Debug, Clone)]
pub(crate) struct Package<S: PackageSource> {
    pub source: S,
    pub parts: ResolvedParts,
    pub sheet: PartLocation,
    pub shared_strings: Option<PartLocation>,
}

impl<S: PackageSource> Package<S> {
    /// パッケージを開き、対象シートと共有文字列のパーツを解決する
    ///
    /// # 戻り値
    ///
    /// * `Err(XlsxStreamError::InvalidFormat)` - ZIPとして読めない、必須パーツがない場合
    /// * `Err(XlsxStreamError::SheetNotFound)` - 指定されたシートがない場合
    pub fn open(
        source: S,
        selector: &SheetSelector,
        security: &SecurityConfig,
    ) -> Result<Self, XlsxStreamError> {
        let stream = source.open_stream()?;
        let mut archive = ZipArchive::new(stream).map_err(|e| {
            XlsxStreamError::InvalidFormat(format!("not a valid xlsx container: {}", e))
        })?;
        security.check_file_count(archive.len())?;

        let parts = resolve_parts(&mut archive, selector, security)?;

        let sheet = locate_part(&mut archive, &parts.sheet_path)?.ok_or_else(|| {
            XlsxStreamError::InvalidFormat(format!("sheet part '{}' is missing", parts.sheet_path))
        })?;
        let shared_strings = match &parts.shared_strings_path {
            Some(path) => {
                let located = locate_part(&mut archive, path)?;
                if located.is_none() {
                    warn!("shared string part '{}' is missing", path);
                }
                located
            }
            None => None,
        };

        debug!(
            "opened sheet '{}' at '{}' ({} bytes), shared strings: {:?}",
            parts.sheet_name,
            sheet.name,
            sheet.size,
            shared_strings.as_ref().map(|p| p.name.as_str())
        );

        Ok(Self {
            source,
            parts,
            sheet,
            shared_strings,
        })
    }

    /// シートパーツを新しいストリームとして開く
    pub fn open_sheet(&self) -> Result<PartReader<S::Stream>, XlsxStreamError> {
        open_part(&self.source, &self.sheet)
    }
}

/// マニフェストとリレーションシップから対象シートと共有文字列のパスを解決する
pub(crate) fn resolve_parts<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    selector: &SheetSelector,
    security: &SecurityConfig,
) -> Result<ResolvedParts, XlsxStreamError> {
    let workbook_xml = read_required_part(archive, WORKBOOK_PART, security)?;
    let manifest = parse_workbook(&workbook_xml)?;
    let rels_xml = read_required_part(archive, WORKBOOK_RELS_PART, security)?;
    let relationships = parse_relationships(&rels_xml)?;

    let entry = select_sheet(&manifest, selector)?;
    let relationship = relationships
        .iter()
        .find(|rel| rel.id == entry.relationship_id)
        .ok_or_else(|| {
            XlsxStreamError::InvalidFormat(format!(
                "relationship '{}' for sheet '{}' not found",
                entry.relationship_id, entry.name
            ))
        })?;
    let sheet_path = resolve_target(&relationship.target)?;

    let shared_strings_path = match relationships
        .iter()
        .find(|rel| rel.kind.ends_with("/sharedStrings"))
    {
        Some(rel) => resolve_target(&rel.target)?,
        None => DEFAULT_SHARED_STRINGS_PART.to_string(),
    };

    Ok(ResolvedParts {
        sheet_name: entry.name.clone(),
        sheet_path,
        shared_strings_path: Some(shared_strings_path),
        sheet_names: manifest.sheets.iter().map(|s| s.name.clone()).collect(),
        is_1904: manifest.is_1904,
    })
}

fn select_sheet<'a>(
    manifest: &'a WorkbookManifest,
    selector: &SheetSelector,
) -> Result<&'a SheetEntry, XlsxStreamError> {
    match selector {
        SheetSelector::Name(name) if !name.is_empty() => manifest
            .sheets
            .iter()
            .find(|sheet| &sheet.name == name)
            .ok_or_else(|| XlsxStreamError::SheetNotFound(name.clone())),
        SheetSelector::Index(index) => manifest
            .sheets
            .get(*index)
            .ok_or_else(|| XlsxStreamError::SheetNotFound(format!("#{}", index))),
        _ => manifest
            .sheets
            .first()
            .ok_or_else(|| XlsxStreamError::SheetNotFound("<first sheet>".to_string())),
    }
}

/// リレーションシップのターゲットをアーカイブ内のパスに変換
///
/// 相対パスは`xl/`を前置し、`/`で始まる絶対パスはパッケージのルートから解決します。
fn resolve_target(target: &str) -> Result<String, XlsxStreamError> {
    let path = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{}{}", PARTS_ROOT, target),
    };
    validate_zip_path(&path)
        .map_err(|e| XlsxStreamError::SecurityViolation(format!("Invalid part path: {}", e)))?;
    Ok(path)
}

/// アーカイブ内のエントリ名を大文字小文字を区別せずに検索
fn find_entry_name<R: Read + Seek>(archive: &ZipArchive<R>, path: &str) -> Option<String> {
    archive
        .file_names()
        .find(|name| name.eq_ignore_ascii_case(path))
        .map(str::to_owned)
}

/// パーツの位置情報を取得（存在しない場合は`None`）
pub(crate) fn locate_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Option<PartLocation>, XlsxStreamError> {
    let Some(name) = find_entry_name(archive, path) else {
        return Ok(None);
    };
    let file = archive
        .by_name(&name)
        .map_err(|e| XlsxStreamError::Zip(format!("{}: {}", name, e)))?;
    Ok(Some(PartLocation {
        name,
        data_start: file.data_start(),
        compressed_size: file.compressed_size(),
        size: file.size(),
        crc32: file.crc32(),
        compression: file.compression(),
    }))
}

/// 必須の小さなパーツを全量読み込む
fn read_required_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
    security: &SecurityConfig,
) -> Result<Vec<u8>, XlsxStreamError> {
    let name = find_entry_name(archive, path)
        .ok_or_else(|| XlsxStreamError::InvalidFormat(format!("required part '{}' is missing", path)))?;
    let file = archive
        .by_name(&name)
        .map_err(|e| XlsxStreamError::Zip(format!("{}: {}", name, e)))?;
    security.check_manifest_size(&name, file.size())?;

    let mut content = Vec::with_capacity(file.size() as usize);
    file.take(security.max_manifest_size + 1)
        .read_to_end(&mut content)?;
    security.check_manifest_size(&name, content.len() as u64)?;
    Ok(content)
}

fn attribute_value(
    element: &BytesStart,
    local_name: &[u8],
) -> Result<Option<String>, XlsxStreamError> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local_name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// `xl/workbook.xml`を解析
pub(crate) fn parse_workbook(xml: &[u8]) -> Result<WorkbookManifest, XlsxStreamError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut manifest = WorkbookManifest::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"sheet" => {
                    let name = attribute_value(e, b"name")?.unwrap_or_default();
                    let relationship_id = attribute_value(e, b"id")?.ok_or_else(|| {
                        XlsxStreamError::InvalidFormat(format!(
                            "sheet '{}' has no relationship id",
                            name
                        ))
                    })?;
                    manifest.sheets.push(SheetEntry {
                        name,
                        relationship_id,
                    });
                }
                b"workbookPr" => {
                    if let Some(value) = attribute_value(e, b"date1904")? {
                        manifest.is_1904 = value == "1" || value.eq_ignore_ascii_case("true");
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(manifest)
}

/// `xl/_rels/workbook.xml.rels`を解析
pub(crate) fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, XlsxStreamError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut relationships = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = attribute_value(e, b"Id")?.unwrap_or_default();
                let target = attribute_value(e, b"Target")?.unwrap_or_default();
                let kind = attribute_value(e, b"Type")?.unwrap_or_default();
                relationships.push(Relationship { id, target, kind });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(relationships)
}
