//! Serial Date Module
//!
//! Excelのシリアル日付値（1900年/1904年システム）を日時に変換するモジュール。
//!
//! シリアル値の整数部が61以下の範囲は、ユリウス日を経由して
//! Fliegel–Van Flandernアルゴリズムで変換します。1900年システムでは
//! Excelが実在しない1900年2月29日を数えているため、この範囲だけ
//! 1日ずれた値が記録されており、境界の61（1900-03-01）で整合します。

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::XlsxStreamError;

/// 修正ユリウス日の起点（MJD 0 = JD 2400000.5）
const MJD0: f64 = 2_400_000.5;
/// 1900年システムのシリアル値0に対応する修正ユリウス日（1899-12-30）
const OFFSET_1900: f64 = 15_018.0;
/// 1904年システムのシリアル値0に対応する修正ユリウス日（1904-01-01）
const OFFSET_1904: f64 = 16_480.0;
/// 一度に加算する最大日数（約290年）
const MAX_DURATION_DAYS: i64 = 106_750;
/// 受け付けるシリアル値の絶対値の上限
const MAX_SERIAL: f64 = 100_000_000.0;
const NANOS_PER_DAY: f64 = 86_400_000_000_000.0;

/// シリアル日付値を日時に変換する
///
/// # 引数
///
/// * `serial` - Excelのシリアル日付値（小数部は時刻）
/// * `epoch_1904` - 1904年システムを使用するかどうか
///
/// # 戻り値
///
/// * `Ok(NaiveDateTime)` - マイクロ秒に丸めた日時
/// * `Err(XlsxStreamError::InvalidSerialDate)` - 値が有限でない、または表現可能な範囲外の場合
///
/// # エポックシステム
///
/// - 1900年システム: 1899年12月30日起算（61以下はユリウス日経由）
/// - 1904年システム: 1904年1月1日起算
///
/// # 使用例
///
/// ```rust
/// use chrono::NaiveDate;
/// use xlsxstream::to_calendar_time;
///
/// let dt = to_calendar_time(45658.5, false).unwrap();
/// assert_eq!(dt, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap());
/// ```
pub fn to_calendar_time(serial: f64, epoch_1904: bool) -> Result<NaiveDateTime, XlsxStreamError> {
    if !serial.is_finite() || serial.abs() > MAX_SERIAL {
        return Err(XlsxStreamError::InvalidSerialDate(serial));
    }

    let int_part = serial.trunc() as i64;
    if int_part <= 61 {
        let offset = if epoch_1904 { OFFSET_1904 } else { OFFSET_1900 };
        return julian_to_gregorian(MJD0, serial + offset)
            .ok_or(XlsxStreamError::InvalidSerialDate(serial));
    }

    let epoch = if epoch_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    }
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .ok_or(XlsxStreamError::InvalidSerialDate(serial))?;

    let mut date = epoch;
    let mut remaining = int_part;
    while remaining > MAX_DURATION_DAYS {
        date = date
            .checked_add_signed(Duration::days(MAX_DURATION_DAYS))
            .ok_or(XlsxStreamError::InvalidSerialDate(serial))?;
        remaining -= MAX_DURATION_DAYS;
    }
    let fraction = serial - int_part as f64;
    date.checked_add_signed(Duration::days(remaining))
        .and_then(|d| d.checked_add_signed(Duration::microseconds(fraction_micros(fraction))))
        .ok_or(XlsxStreamError::InvalidSerialDate(serial))
}

/// 2つの部分に分けたユリウス日をグレゴリオ暦の日時に変換
fn julian_to_gregorian(part1: f64, part2: f64) -> Option<NaiveDateTime> {
    let days = part1.trunc() + part2.trunc();
    let fraction = part1.fract() + part2.fract();
    let (days, fraction) = shift_to_noon(days, fraction);
    let (year, month, day) = fliegel_van_flandern(days as i64);
    let month = u32::try_from(month).ok()?;
    let day = u32::try_from(day).ok()?;
    let year = i32::try_from(year).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::microseconds(fraction_micros(fraction)))
}

/// ユリウス日は正午起点のため、日付部分と小数部分を正午基準に揃える
fn shift_to_noon(days: f64, fraction: f64) -> (f64, f64) {
    if -0.5 < fraction && fraction < 0.5 {
        (days, fraction + 0.5)
    } else if fraction >= 0.5 {
        (days + 1.0, fraction - 0.5)
    } else {
        (days - 1.0, fraction + 1.5)
    }
}

/// ユリウス通日から (年, 月, 日) を求める
fn fliegel_van_flandern(jd: i64) -> (i64, i64, i64) {
    let mut l = jd + 68_569;
    let n = (4 * l) / 146_097;
    l -= (146_097 * n + 3) / 4;
    let i = (4_000 * (l + 1)) / 1_461_001;
    l = l - (1_461 * i) / 4 + 31;
    let j = (80 * l) / 2_447;
    let d = l - (2_447 * j) / 80;
    l = j / 11;
    let m = j + 2 - 12 * l;
    let y = 100 * (n - 49) + i + l;
    (y, m, d)
}

/// 1日の割合をマイクロ秒に変換（0.5マイクロ秒は切り上げ）
fn fraction_micros(fraction: f64) -> i64 {
    let nanos = (NANOS_PER_DAY * fraction + 500.0) as i64;
    nanos / 1_000
}
