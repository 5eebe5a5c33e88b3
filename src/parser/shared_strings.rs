//! Shared Strings Module
//!
//! 共有文字列テーブル（`xl/sharedStrings.xml`）のインデックス解決を提供するモジュール。
//!
//! 2つの戦略があり、リーダーを開く時点でどちらか一方を選択します。
//!
//! - [`PreindexedStrings`]: 全エントリを一度に読み込み、O(1)で参照する（`Policy::Fast`）
//! - [`ScanningStrings`]: パーツを前方に走査し、直前に解決した1エントリだけを保持する
//!   （`Policy::LowMemory`）
//!
//! どちらも同じエントリ読み取り処理を共有するため、解決結果は常に一致します。

use log::{debug, trace, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{BufRead, BufReader, Read};

use crate::api::Policy;
use crate::error::XlsxStreamError;
use crate::parser::package::{open_part, PackageSource, PartLocation, PartReader};
use crate::security::SecurityConfig;

/// 共有文字列インデックスを文字列に解決する
///
/// 解決できないインデックスは空文字列になります。
pub(crate) trait StringResolver {
    fn resolve(&mut self, index: usize) -> &str;
}

/// `<si>`の開始タグの直後から`</si>`までを読み、テキストを`out`に追記する
///
/// `<t>`の内容をすべて連結し、ふりがな（`<rPh>`）の中身は除外します。
/// `out`が`None`の場合はエントリを読み飛ばすだけです。
fn read_entry<B: BufRead>(
    reader: &mut Reader<B>,
    buf: &mut Vec<u8>,
    mut out: Option<&mut String>,
) -> Result<(), XlsxStreamError> {
    let mut in_text = false;
    let mut phonetic_depth = 0usize;
    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"rPh" => phonetic_depth += 1,
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"si" => return Ok(()),
                _ => {}
            },
            Event::Text(ref e) if in_text && phonetic_depth == 0 => {
                if let Some(out) = out.as_deref_mut() {
                    out.push_str(&e.unescape()?);
                }
            }
            Event::CData(ref e) if in_text && phonetic_depth == 0 => {
                if let Some(out) = out.as_deref_mut() {
                    out.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::Eof => {
                return Err(XlsxStreamError::Xml(
                    "unexpected end of shared strings inside <si>".to_string(),
                ))
            }
            _ => {}
        }
    }
}

/// パーツ内で次に現れた要素
enum Item {
    /// `<sst>`（`uniqueCount`属性の値）
    Root(Option<usize>),
    /// `<si>`を1つ読んだ
    Entry,
    /// パーツの終端
    End,
}

/// 次の`<sst>`または`<si>`まで進む
///
/// `<si>`の場合はその内容を`out`に読み込みます。
fn next_item<B: BufRead>(
    reader: &mut Reader<B>,
    buf: &mut Vec<u8>,
    out: Option<&mut String>,
) -> Result<Item, XlsxStreamError> {
    loop {
        buf.clear();
        let step = match reader.read_event_into(buf)? {
            Event::Start(ref e) if e.local_name().as_ref() == b"sst" => {
                return Ok(Item::Root(unique_count(e)))
            }
            Event::Start(ref e) if e.local_name().as_ref() == b"si" => Entry::Open,
            // <si/> は空文字列のエントリ
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => Entry::Empty,
            Event::Eof => return Ok(Item::End),
            _ => continue,
        };
        if let Entry::Open = step {
            read_entry(reader, buf, out)?;
        }
        return Ok(Item::Entry);
    }
}

enum Entry {
    Open,
    Empty,
}

fn unique_count(e: &BytesStart<'_>) -> Option<usize> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"uniqueCount")
        .and_then(|attr| attr.unescape_value().ok()?.parse::<usize>().ok())
}

/// 次の`<si>`まで進み、その内容を読む
///
/// # 戻り値
///
/// * `Ok(true)` - エントリを1つ読んだ
/// * `Ok(false)` - パーツの終端に達した
fn next_entry<B: BufRead>(
    reader: &mut Reader<B>,
    buf: &mut Vec<u8>,
    mut out: Option<&mut String>,
) -> Result<bool, XlsxStreamError> {
    loop {
        match next_item(reader, buf, out.as_deref_mut())? {
            Item::Root(_) => continue,
            Item::Entry => return Ok(true),
            Item::End => return Ok(false),
        }
    }
}

/// 事前に全エントリを読み込んだ共有文字列テーブル
#[derive(Debug, Clone, Default)]
pub(crate) struct PreindexedStrings {
    strings: Vec<String>,
}

impl PreindexedStrings {
    /// パーツを1回走査して全エントリを読み込む
    ///
    /// `uniqueCount`属性があれば、その値（上限あり）で容量を確保します。
    /// 読み取りに失敗した場合は、それまでに読み終えたエントリだけを保持します。
    /// 失敗位置以降のインデックスは、走査方式と同じく空文字列に解決されます。
    pub fn load<R: Read>(part: R, security: &SecurityConfig) -> Self {
        let mut reader = Reader::from_reader(BufReader::new(part));
        let mut buf = Vec::new();
        let mut strings = Vec::new();
        let mut text = String::new();

        loop {
            match next_item(&mut reader, &mut buf, Some(&mut text)) {
                Ok(Item::Root(hint)) => {
                    strings.reserve(hint.unwrap_or(0).min(security.max_shared_string_hint));
                }
                Ok(Item::Entry) => strings.push(std::mem::take(&mut text)),
                Ok(Item::End) => break,
                Err(e) => {
                    warn!(
                        "shared strings truncated after {} entries: {}",
                        strings.len(),
                        e
                    );
                    break;
                }
            }
        }
        Self { strings }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }
}

impl StringResolver for PreindexedStrings {
    fn resolve(&mut self, index: usize) -> &str {
        match self.strings.get(index) {
            Some(s) => s.as_str(),
            None => {
                debug!(
                    "shared string index {} out of range ({} entries)",
                    index,
                    self.strings.len()
                );
                ""
            }
        }
    }
}

/// 共有文字列パーツを前方に走査するカーソル
///
/// 直前に解決したエントリだけを保持し、カーソルより前のインデックスが
/// 要求された場合はパーツを開き直して先頭から走査します。
pub(crate) struct ScanningStrings<S: PackageSource> {
    source: S,
    part: PartLocation,
    reader: Reader<BufReader<PartReader<S::Stream>>>,
    buf: Vec<u8>,
    /// 次に読む`<si>`のインデックス
    next_index: usize,
    /// 直前に解決したエントリ
    current: Option<(usize, String)>,
    /// 終端に達した、または読み取りに失敗した
    exhausted: bool,
}

impl<S: PackageSource> ScanningStrings<S> {
    pub fn open(source: S, part: PartLocation) -> Result<Self, XlsxStreamError> {
        let reader = Reader::from_reader(BufReader::new(open_part(&source, &part)?));
        Ok(Self {
            source,
            part,
            reader,
            buf: Vec::new(),
            next_index: 0,
            current: None,
            exhausted: false,
        })
    }

    fn rewind(&mut self) -> Result<(), XlsxStreamError> {
        trace!("rewinding shared strings cursor from {}", self.next_index);
        self.reader = Reader::from_reader(BufReader::new(open_part(&self.source, &self.part)?));
        self.next_index = 0;
        self.exhausted = false;
        Ok(())
    }

    /// `index`番目のエントリまで進み、その内容を`current`に格納する
    fn seek(&mut self, index: usize) -> Result<bool, XlsxStreamError> {
        if index < self.next_index {
            self.rewind()?;
        }
        while !self.exhausted && self.next_index <= index {
            if self.next_index == index {
                let mut text = String::new();
                if next_entry(&mut self.reader, &mut self.buf, Some(&mut text))? {
                    self.current = Some((index, text));
                    self.next_index += 1;
                    return Ok(true);
                }
            } else if next_entry(&mut self.reader, &mut self.buf, None)? {
                self.next_index += 1;
                continue;
            }
            self.exhausted = true;
        }
        Ok(false)
    }
}

impl<S: PackageSource> StringResolver for ScanningStrings<S> {
    fn resolve(&mut self, index: usize) -> &str {
        let cached = matches!(&self.current, Some((i, _)) if *i == index);
        if !cached {
            match self.seek(index) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("shared string index {} out of range", index);
                    return "";
                }
                Err(e) => {
                    warn!("failed to read shared string {}: {}", index, e);
                    self.exhausted = true;
                    return "";
                }
            }
        }
        match &self.current {
            Some((_, text)) => text.as_str(),
            None => "",
        }
    }
}

/// 戦略に応じて選択された共有文字列リゾルバ
pub(crate) enum SharedStrings<S: PackageSource> {
    Preindexed(PreindexedStrings),
    Scanning(ScanningStrings<S>),
}

impl<S: PackageSource> SharedStrings<S> {
    /// 共有文字列パーツからリゾルバを構築する
    ///
    /// パーツが存在しない、または読み込みに失敗した場合は、
    /// すべてのインデックスが空文字列に解決される空のテーブルになります。
    pub fn open(
        source: &S,
        part: Option<&PartLocation>,
        policy: Policy,
        security: &SecurityConfig,
    ) -> Self {
        let Some(part) = part else {
            return SharedStrings::Preindexed(PreindexedStrings::default());
        };
        let result = match policy {
            Policy::LowMemory => {
                ScanningStrings::open(source.clone(), part.clone()).map(SharedStrings::Scanning)
            }
            Policy::Fast => open_part(source, part)
                .map(|stream| PreindexedStrings::load(stream, security))
                .map(|strings| {
                    debug!("loaded {} shared strings from '{}'", strings.len(), part.name);
                    SharedStrings::Preindexed(strings)
                }),
        };
        result.unwrap_or_else(|e| {
            warn!("shared string part '{}' is unreadable: {}", part.name, e);
            SharedStrings::Preindexed(PreindexedStrings::default())
        })
    }
}

impl<S: PackageSource> StringResolver for SharedStrings<S> {
    fn resolve(&mut self, index: usize) -> &str {
        match self {
            SharedStrings::Preindexed(strings) => strings.resolve(index),
            SharedStrings::Scanning(strings) => strings.resolve(index),
        }
    }
}
