// Receipt and report tables (CSV/TSV)

use std::io::Read;
use std::path::Path;

use splitbill_core::{IdGenerator, Receipt};
use splitbill_engine::Report;

use crate::amount::format_amount;
use crate::canonical::{canonicalize_with_total, RawRow};
use crate::error::IoError;

/// Column order of the receipt table.
pub const COLUMNS: [&str; 4] = ["id", "name", "count", "total_price"];

/// Column order of the report summary table.
pub const REPORT_COLUMNS: [&str; 5] = [
    "participant_id",
    "participant",
    "purchased_subtotal",
    "purchased_others",
    "purchased_total",
];

/// Render a receipt as a comma-separated table. An empty receipt yields the
/// header row only.
pub fn export_items(receipt: &Receipt) -> Result<String, IoError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for item in receipt.items() {
        writer.write_record([
            item.id.0.to_string(),
            item.name.clone(),
            item.count.to_string(),
            format_amount(item.total_price),
        ])?;
    }
    finish(writer)
}

pub fn export_items_to_path(receipt: &Receipt, path: &Path) -> Result<(), IoError> {
    std::fs::write(path, export_items(receipt)?)?;
    Ok(())
}

/// Rebuild a receipt from a table. Columns are matched by header name
/// (case-insensitive), the `id` column is ignored and fresh ids are drawn
/// from `ids`. Every field goes through the canonicalization coercions.
///
/// Blank content yields an empty receipt with the given total.
pub fn import_items_from_str(
    content: &str,
    total: f64,
    ids: &IdGenerator,
) -> Result<Receipt, IoError> {
    if content.trim().is_empty() {
        return Ok(Receipt::empty(total));
    }

    let delimiter = sniff_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    };
    let name_col = column("name").ok_or_else(|| IoError::MissingColumn("name".into()))?;
    let count_col = column("count");
    let price_col = column("total_price");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |col: Option<usize>| {
            col.and_then(|c| record.get(c)).unwrap_or_default().to_string()
        };
        rows.push(RawRow::new(field(Some(name_col)), field(count_col), field(price_col)));
    }

    log::debug!("imported {} rows (delimiter {:?})", rows.len(), delimiter as char);
    Ok(canonicalize_with_total(rows, total, ids))
}

pub fn import_items(path: &Path, total: f64, ids: &IdGenerator) -> Result<Receipt, IoError> {
    let content = read_file_as_utf8(path)?;
    import_items_from_str(&content, total, ids)
}

/// One summary row per participant, in report order.
pub fn export_report(report: &Report) -> Result<String, IoError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(REPORT_COLUMNS)?;
    for p in &report.participants {
        writer.write_record([
            p.participant_id.0.to_string(),
            p.name.clone(),
            format_amount(p.purchased_subtotal),
            format_amount(p.purchased_others),
            format_amount(p.purchased_total),
        ])?;
    }
    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, IoError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| IoError::Io(e.error().to_string()))?;
    String::from_utf8(bytes).map_err(|e| IoError::Csv(e.to_string()))
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Ties go to the delimiter producing more columns
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed. A byte order mark picks the
/// encoding (UTF-8, UTF-16LE/BE); without one, invalid UTF-8 is read as
/// Windows-1252, which is what spreadsheet exports usually are.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(&bytes) {
        let (decoded, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return Ok(decoded.into_owned());
    }

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitbill_core::Item;
    use std::fs;
    use tempfile::tempdir;

    fn sample(ids: &IdGenerator) -> Receipt {
        Receipt::new(
            vec![
                Item::new(ids.next_item(), "Coffee", 2, 10_000.0),
                Item::new(ids.next_item(), "Nasi, Goreng", 1, 27_500.5),
                Item::new(ids.next_item(), "Tip jar", 1, 0.125),
            ],
            45_000.0,
        )
    }

    fn rows(receipt: &Receipt) -> Vec<(String, u32, f64)> {
        receipt
            .items()
            .map(|it| (it.name.clone(), it.count, it.total_price))
            .collect()
    }

    #[test]
    fn empty_receipt_exports_header_only() {
        let out = export_items(&Receipt::empty(0.0)).unwrap();
        assert_eq!(out, "id,name,count,total_price\n");
    }

    #[test]
    fn blank_table_imports_as_empty_receipt() {
        let ids = IdGenerator::new();
        let receipt = import_items_from_str("  \n", 12.0, &ids).unwrap();
        assert!(receipt.is_empty());
        assert_eq!(receipt.total, 12.0);
    }

    #[test]
    fn export_then_import_preserves_rows() {
        let ids = IdGenerator::new();
        let original = sample(&ids);
        let table = export_items(&original).unwrap();
        let back = import_items_from_str(&table, original.total, &ids).unwrap();

        assert_eq!(rows(&back), rows(&original));
        // Fresh ids on import
        let old: Vec<_> = original.items().map(|it| it.id).collect();
        assert!(back.items().all(|it| !old.contains(&it.id)));
    }

    #[test]
    fn second_round_trip_is_idempotent() {
        let ids = IdGenerator::new();
        let once = import_items_from_str(&export_items(&sample(&ids)).unwrap(), 45_000.0, &ids).unwrap();
        let twice = import_items_from_str(&export_items(&once).unwrap(), 45_000.0, &ids).unwrap();
        assert_eq!(rows(&once), rows(&twice));
    }

    #[test]
    fn import_matches_headers_case_insensitively_in_any_order() {
        let ids = IdGenerator::new();
        let table = "Total_Price;NAME;Count\n10.000;Teh Manis;2\n5.000;Kerupuk;x3\n";
        let receipt = import_items_from_str(table, 15_000.0, &ids).unwrap();
        assert_eq!(
            rows(&receipt),
            vec![
                ("Teh Manis".to_string(), 2, 10_000.0),
                ("Kerupuk".to_string(), 3, 5_000.0),
            ]
        );
    }

    #[test]
    fn import_applies_coercions() {
        let ids = IdGenerator::new();
        let table = "id,name,count,total_price\n1,Soup,zero,n/a\n2,,1,3\n3,Bread,,-4\n";
        let receipt = import_items_from_str(table, 0.0, &ids).unwrap();
        assert_eq!(
            rows(&receipt),
            vec![("Soup".to_string(), 1, 0.0), ("Bread".to_string(), 1, 0.0)]
        );
    }

    #[test]
    fn import_without_name_column_fails() {
        let ids = IdGenerator::new();
        let err = import_items_from_str("item,count\nTea,1\n", 0.0, &ids).unwrap_err();
        assert!(matches!(err, IoError::MissingColumn(ref c) if c == "name"));
    }

    #[test]
    fn import_from_windows_1252_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        // "Café" with 0xE9
        fs::write(&path, b"name,count,total_price\nCaf\xe9,1,4.5\n").unwrap();

        let ids = IdGenerator::new();
        let receipt = import_items(&path, 4.5, &ids).unwrap();
        assert_eq!(receipt.items().next().unwrap().name, "Café");
    }

    #[test]
    fn import_from_utf16_file_with_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "name,count,total_price\nCafé,2,9.000\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        fs::write(&path, bytes).unwrap();

        let ids = IdGenerator::new();
        let receipt = import_items(&path, 9000.0, &ids).unwrap();
        let item = receipt.items().next().unwrap();
        assert_eq!(item.name, "Café");
        assert_eq!(item.count, 2);
        assert_eq!(item.total_price, 9000.0);
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.csv");
        fs::write(&path, b"\xEF\xBB\xBFname,count\n").unwrap();
        assert_eq!(read_file_as_utf8(&path).unwrap(), "name,count\n");
    }

    #[test]
    fn export_to_path_writes_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let ids = IdGenerator::new();
        export_items_to_path(&sample(&ids), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("id,name,count,total_price\n"));
        assert!(content.contains("\"Nasi, Goreng\""));
    }

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Name;Age;City\nAlice;30;Paris\nBob;25;London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "name\tcount\ttotal_price\nTea\t1\t5\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_single_column_defaults_to_comma() {
        assert_eq!(sniff_delimiter("name\nTea\n"), b',');
    }
}
