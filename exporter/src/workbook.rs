//! Workbook assembly: one formatted sheet per symbol, matching the layout the
//! downstream analysts expect (frozen header, padded numeric columns).

use anyhow::Result;
use chrono::Local;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use shared::Candle;
use std::path::{Path, PathBuf};

const HEADERS: [&str; 7] = ["Timestamp", "Symbol", "Open", "High", "Low", "Close", "Volume"];

/// Excel caps sheet names at 31 characters.
pub fn sheet_name(symbol: &str) -> String {
    symbol.chars().take(31).collect()
}

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_text_wrap()
        .set_align(FormatAlign::Top)
        .set_border(FormatBorder::Thin)
        .set_background_color(Color::RGB(0xD9D9D9))
}

fn price_format() -> Format {
    Format::new().set_num_format("#,##0.00000000")
}

fn volume_format() -> Format {
    Format::new().set_num_format("#,##0.00")
}

fn write_sheet(worksheet: &mut Worksheet, candles: &[Candle]) -> Result<()> {
    let header = header_format();
    let price = price_format();
    let volume = volume_format();

    for (col, title) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (i, candle) in candles.iter().enumerate() {
        let row = (i + 1) as u32;
        worksheet.write_string(row, 0, candle.timestamp.format("%Y-%m-%d %H:%M:%S").to_string())?;
        worksheet.write_string(row, 1, &candle.symbol)?;
        for (col, value) in [candle.open, candle.high, candle.low, candle.close]
            .iter()
            .enumerate()
        {
            worksheet.write_number_with_format(
                row,
                (col + 2) as u16,
                value.to_f64().unwrap_or(0.0),
                &price,
            )?;
        }
        worksheet.write_number_with_format(
            row,
            6,
            candle.volume.to_f64().unwrap_or(0.0),
            &volume,
        )?;
    }

    worksheet.set_column_width(0, 20)?;
    worksheet.set_column_width(1, 12)?;
    for col in 2..=6u16 {
        worksheet.set_column_width(col, 15)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    Ok(())
}

/// Write one symbol's candles into `{dir}/{SYMBOL}_data_{stamp}.xlsx`.
pub fn export_single(dir: &Path, symbol: &str, candles: &[Candle]) -> Result<PathBuf> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("OHLCV Data")?;
    write_sheet(worksheet, candles)?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{}_data_{}.xlsx", symbol, stamp));
    workbook.save(&path)?;
    Ok(path)
}

/// Write every symbol into one workbook, one sheet per symbol, at
/// `{dir}/all_crypto_data_{stamp}.xlsx`.
pub fn export_workbook(dir: &Path, sheets: &[(String, Vec<Candle>)]) -> Result<PathBuf> {
    let mut workbook = Workbook::new();
    for (symbol, candles) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet_name(symbol))?;
        write_sheet(worksheet, candles)?;
    }

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("all_crypto_data_{}.xlsx", stamp));
    workbook.save(&path)?;
    Ok(path)
}
