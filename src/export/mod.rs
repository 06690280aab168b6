use std::io::Write;

use thiserror::Error;

use crate::core::ProjectionYear;

pub const CSV_HEADERS: [&str; 9] = [
    "Age",
    "Year",
    "Balance",
    "Contribution",
    "Withdrawal (Nominal)",
    "Withdrawal (Real)",
    "Growth",
    "FIRE Target",
    "Status",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV output: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub fn write_projection_csv<W: Write>(
    rows: &[ProjectionYear],
    writer: W,
) -> Result<(), ExportError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(CSV_HEADERS)?;
    for row in rows {
        csv.write_record([
            row.age.to_string(),
            row.year.to_string(),
            row.balance.to_string(),
            row.contribution.to_string(),
            row.withdrawal_nominal.to_string(),
            row.withdrawal_real.to_string(),
            row.investment_growth.to_string(),
            row.fire_target.to_string(),
            row.status.as_str().to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn projection_csv_string(rows: &[ProjectionYear]) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_projection_csv(rows, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Short label for charts and summary cards, e.g. `$1.2M` or `$340K`.
///
/// The suffix is picked from the value as it will be displayed, so `999_950`
/// reads `$1.0M` rather than `$1000K`.
pub fn format_currency_compact(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }

    let units = value.round();
    let thousands = (value / 1_000.0).round();
    let sign = if units < 0.0 { "-" } else { "" };
    if thousands.abs() >= 1_000.0 {
        format!("{sign}${:.1}M", value.abs() / 1_000_000.0)
    } else if units.abs() >= 1_000.0 {
        format!("{sign}${:.0}K", thousands.abs())
    } else {
        format!("{sign}${:.0}", units.abs())
    }
}

pub fn format_currency_full(value: f64) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }

    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}")
}
