fn needs_formula_guard(value: &str) -> bool {
    matches!(value.chars().next(), Some('=' | '+' | '-' | '@'))
}

fn guard_cell(value: &str) -> String {
    if needs_formula_guard(value) {
        format!("'{}", value)
    } else {
        value.to_string()
    }
}

/// Renders a header row plus records as CSV bytes. Cells that a spreadsheet
/// would evaluate as a formula are prefixed with a quote.
pub fn render_csv(headers: &[&str], rows: &[Vec<String>]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row.iter().map(|cell| guard_cell(cell)))?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("Failed to flush CSV: {}", err))
}
