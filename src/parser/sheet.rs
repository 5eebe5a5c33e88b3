//! Sheet Module
//!
//! ワークシートパーツ（`xl/worksheets/sheetN.xml`）を行単位でトークン化するモジュール。
//!
//! quick-xmlのイベントを状態機械（`Outside` → `InRow` → `InCell` → `InValue`）で処理し、
//! 1行分のセルを再利用可能な行バッファに組み立てます。

use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{self, BufRead};

use crate::error::XlsxStreamError;
use crate::parser::shared_strings::StringResolver;
use crate::schema::ColumnMap;
use crate::types::column_index;

/// 行バッファの列配置
#[derive(Debug, Clone, Copy)]
pub(crate) enum RowLayout<'a> {
    /// ソース列の位置をそのまま使い、空き列は空文字列で埋める
    Sparse,
    /// 列対応表に従って固定幅の行に配置する
    Mapped(&'a ColumnMap),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Outside,
    InRow,
    InCell,
    InValue,
    InInlineText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Shared,
    Inline,
    Literal,
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    col: usize,
    kind: CellKind,
}

/// 行内の列の追跡状態
#[derive(Debug, Default)]
struct RowCursor {
    /// `r`属性のないセルに割り当てる列
    next_col: usize,
    /// 列対応表の範囲を超えたため、残りのセルを無視する
    skip_rest: bool,
}

/// シートパーツを1行ずつ読み出すトークナイザ
pub(crate) struct RowTokenizer<B: BufRead> {
    reader: Reader<B>,
    buf: Vec<u8>,
    value: String,
    /// 行バッファ（先頭`width`要素が現在の行）
    slots: Vec<String>,
    width: usize,
    finished: bool,
}

impl<B: BufRead> RowTokenizer<B> {
    pub fn new(input: B) -> Self {
        Self {
            reader: Reader::from_reader(input),
            buf: Vec::with_capacity(1024),
            value: String::new(),
            slots: Vec::new(),
            width: 0,
            finished: false,
        }
    }

    /// 直前に読み出した行
    pub fn row(&self) -> &[String] {
        &self.slots[..self.width]
    }

    /// 次の行を読み出す
    ///
    /// # 戻り値
    ///
    /// * `Ok(true)` - 1行を読み出した（[`row`](Self::row)で参照できる）
    /// * `Ok(false)` - `</sheetData>`または入力の終端に達した
    /// * `Err(XlsxStreamError::Xml)` - XMLが壊れている場合
    ///
    /// エラーを返した後のトークナイザは終了状態になり、以降は`Ok(false)`を返します。
    pub fn next_row(
        &mut self,
        strings: &mut dyn StringResolver,
        layout: RowLayout<'_>,
    ) -> Result<bool, XlsxStreamError> {
        if self.finished {
            return Ok(false);
        }
        let result = self.read_row(strings, layout);
        if result.is_err() {
            // 以降の行は出力しない
            self.finished = true;
            self.width = 0;
        }
        result
    }

    fn read_row(
        &mut self,
        strings: &mut dyn StringResolver,
        layout: RowLayout<'_>,
    ) -> Result<bool, XlsxStreamError> {
        let mut state = State::Outside;
        let mut cursor = RowCursor::default();
        let mut cell: Option<Cell> = None;
        let mut phonetic = false;

        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(ref e) => match (state, e.local_name().as_ref()) {
                    (State::Outside, b"row") => {
                        start_row(&mut self.slots, &mut self.width, layout);
                        cursor = RowCursor::default();
                        state = State::InRow;
                    }
                    (State::InRow, b"c") => {
                        cell = begin_cell(e, &mut cursor, layout)?;
                        self.value.clear();
                        phonetic = false;
                        state = State::InCell;
                    }
                    (State::InCell, b"v") => state = State::InValue,
                    (State::InCell, b"rPh") => phonetic = true,
                    (State::InCell, b"t")
                        if !phonetic
                            && matches!(cell, Some(Cell { kind: CellKind::Inline, .. })) =>
                    {
                        state = State::InInlineText
                    }
                    _ => {}
                },
                Event::Empty(ref e) => {
                    if state == State::InRow && e.local_name().as_ref() == b"c" {
                        if let Some(empty) = begin_cell(e, &mut cursor, layout)? {
                            place(
                                &mut self.slots,
                                &mut self.width,
                                layout,
                                empty,
                                "",
                                strings,
                            );
                        }
                    }
                    // <row/> はセルを持たないため行を生成しない
                }
                Event::Text(ref e) if matches!(state, State::InValue | State::InInlineText) => {
                    self.value.push_str(&e.unescape()?);
                }
                Event::CData(ref e) if matches!(state, State::InValue | State::InInlineText) => {
                    self.value.push_str(&String::from_utf8_lossy(e));
                }
                Event::End(ref e) => match (state, e.local_name().as_ref()) {
                    (State::InValue, b"v") => state = State::InCell,
                    (State::InInlineText, b"t") => state = State::InCell,
                    (State::InCell, b"rPh") => phonetic = false,
                    (State::InCell, b"c") => {
                        if let Some(done) = cell.take() {
                            place(
                                &mut self.slots,
                                &mut self.width,
                                layout,
                                done,
                                &self.value,
                                strings,
                            );
                        }
                        state = State::InRow;
                    }
                    (State::InRow, b"row") => return Ok(true),
                    (State::Outside, b"sheetData") => {
                        self.finished = true;
                        return Ok(false);
                    }
                    _ => {}
                },
                Event::Eof => {
                    if state == State::Outside {
                        self.finished = true;
                        return Ok(false);
                    }
                    return Err(XlsxStreamError::Xml(format!(
                        "unexpected end of sheet data at byte {}",
                        self.reader.buffer_position()
                    )));
                }
                _ => {}
            }
        }
    }
}

fn start_row(slots: &mut Vec<String>, width: &mut usize, layout: RowLayout<'_>) {
    match layout {
        RowLayout::Sparse => *width = 0,
        RowLayout::Mapped(map) => {
            *width = 0;
            extend_row(slots, width, map.width());
        }
    }
}

/// 行バッファを`new_width`まで広げ、新しい列を空文字列にする
fn extend_row(slots: &mut Vec<String>, width: &mut usize, new_width: usize) {
    if new_width <= *width {
        return;
    }
    for i in *width..new_width {
        match slots.get_mut(i) {
            Some(slot) => slot.clear(),
            None => slots.push(String::new()),
        }
    }
    *width = new_width;
}

/// `<c>`の属性を読み、セルの列と種類を決める
///
/// 読み飛ばすセルの場合は`None`を返します。
fn begin_cell(
    e: &BytesStart,
    cursor: &mut RowCursor,
    layout: RowLayout<'_>,
) -> Result<Option<Cell>, XlsxStreamError> {
    if cursor.skip_rest {
        return Ok(None);
    }

    let mut column = None;
    let mut kind = CellKind::Literal;
    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.local_name().as_ref() {
            b"r" => {
                let reference = attr.unescape_value()?;
                match column_index(&reference) {
                    Ok(col) => column = Some(col as usize),
                    Err(err) => {
                        warn!("skipping cell: {}", err);
                        return Ok(None);
                    }
                }
            }
            b"t" => {
                kind = match attr.value.as_ref() {
                    b"s" => CellKind::Shared,
                    b"inlineStr" => CellKind::Inline,
                    _ => CellKind::Literal,
                }
            }
            _ => {}
        }
    }

    let col = column.unwrap_or(cursor.next_col);
    cursor.next_col = col + 1;

    if let RowLayout::Mapped(map) = layout {
        if map.max_index().map_or(true, |max| col > max) {
            cursor.skip_rest = true;
            return Ok(None);
        }
    }
    Ok(Some(Cell { col, kind }))
}

/// セルの値を行バッファの該当位置に書き込む
fn place(
    slots: &mut Vec<String>,
    width: &mut usize,
    layout: RowLayout<'_>,
    cell: Cell,
    value: &str,
    strings: &mut dyn StringResolver,
) {
    let dest = match layout {
        RowLayout::Sparse => {
            extend_row(slots, width, cell.col + 1);
            cell.col
        }
        RowLayout::Mapped(map) => match map.destination(cell.col) {
            Some(dest) => dest,
            None => return,
        },
    };

    let slot = &mut slots[dest];
    slot.clear();
    if value.is_empty() {
        return;
    }
    match cell.kind {
        CellKind::Shared => match value.trim().parse::<usize>() {
            Ok(index) => slot.push_str(strings.resolve(index)),
            Err(_) => warn!("invalid shared string index '{}'", value),
        },
        CellKind::Inline | CellKind::Literal => slot.push_str(value),
    }
}

/// シートパーツの行数を見積もる
///
/// タグ単位（`>`まで）に読み進めて`</row>`の数を数えます。
/// トークナイザとは独立した走査で、ヘッダー行も含めて数えます。
pub(crate) fn estimate_row_count<R: BufRead>(mut reader: R) -> io::Result<usize> {
    let mut count = 0;
    let mut chunk = Vec::with_capacity(256);
    loop {
        chunk.clear();
        if reader.read_until(b'>', &mut chunk)? == 0 {
            break;
        }
        if is_row_end_tag(&chunk) {
            count += 1;
        }
    }
    Ok(count)
}

fn is_row_end_tag(chunk: &[u8]) -> bool {
    let Some(open) = chunk.iter().rposition(|&b| b == b'<') else {
        return false;
    };
    let Some(name) = chunk[open..]
        .strip_prefix(b"</")
        .and_then(|tag| tag.strip_suffix(b">"))
    else {
        return false;
    };
    let end = name
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    let name = &name[..end];
    let local = match name.iter().position(|&b| b == b':') {
        Some(colon) => &name[colon + 1..],
        None => name,
    };
    local == b"row"
}
