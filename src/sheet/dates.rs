//! Spreadsheet date handling: spotting date number formats and turning
//! serial day numbers into timestamps.

use chrono::{Duration, NaiveDate, NaiveDateTime};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Built-in number format IDs that render as dates or times.
pub fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Whether a custom number format code displays a date or time.
///
/// Only the first (positive) section counts. Quoted literals, escaped
/// characters and bracketed modifiers such as colours are ignored; elapsed
/// time brackets (`[h]`, `[mm]`, `[ss]`) still count as time.
pub fn is_date_format_code(code: &str) -> bool {
    let mut chars = code.chars();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                in_quotes = false;
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            '\\' | '_' | '*' => {
                chars.next();
            }
            ';' => return false,
            '[' => {
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                let inner = inner.to_ascii_lowercase();
                if !inner.is_empty() && inner.chars().all(|c| matches!(c, 'h' | 'm' | 's')) {
                    return true;
                }
            }
            'd' | 'D' | 'm' | 'M' | 'y' | 'Y' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }

    false
}

/// Convert a serial day number to a timestamp.
///
/// The 1900 system carries the historical leap-day bug: serial 60 is the
/// non-existent 1900-02-29, so serials strictly between 0 and 60 count
/// from 1899-12-31. Zero and everything from 60 up count from 1899-12-30. Returns `None` for negative or absurd serials.
pub fn serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_466.0 {
        return None;
    }

    let epoch = if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if serial > 0.0 && serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };

    let total_ms = (serial * MS_PER_DAY).round() as i64;
    let midnight = epoch.and_hms_opt(0, 0, 0)?;
    midnight.checked_add_signed(Duration::milliseconds(total_ms))
}
