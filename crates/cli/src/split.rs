//! `splitbill split`: claims table + receipt to a per-participant report.

use std::path::{Path, PathBuf};

use splitbill_core::{ItemId, Receipt};
use splitbill_engine::{BillSession, Report};
use splitbill_io::csv::{export_report, import_items, read_file_as_utf8, sniff_delimiter};
use splitbill_io::{receipt_from_json, report_to_json, try_parse_amount};

use crate::exit_codes::EXIT_NOT_FOUND;
use crate::{emit, CliError};

/// One row of the assignments table. `line` is the 1-based file line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRow {
    pub line: usize,
    pub participant: String,
    pub item: String,
    pub count: u32,
}

pub fn parse_claims(content: &str) -> Result<Vec<ClaimRow>, CliError> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| CliError::usage(format!("assignments: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    };
    let (Some(participant_col), Some(item_col)) = (column("participant"), column("item")) else {
        return Err(CliError::usage("assignments table needs 'participant' and 'item' columns")
            .with_hint("header line: participant,item,count"));
    };
    let count_col = column("count");

    let mut claims = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CliError::usage(format!("assignments: {e}")))?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        let field = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or_default();

        let participant = field(Some(participant_col));
        let item = field(Some(item_col));
        if participant.is_empty() && item.is_empty() {
            continue;
        }
        if participant.is_empty() || item.is_empty() {
            return Err(CliError::usage(format!(
                "assignments line {line}: participant and item are both required"
            )));
        }

        let count = match field(count_col) {
            "" => 1,
            text => text.parse::<u32>().map_err(|_| {
                CliError::usage(format!("assignments line {line}: count '{text}' is not a whole number"))
            })?,
        };

        claims.push(ClaimRow {
            line,
            participant: participant.to_string(),
            item: item.to_string(),
            count,
        });
    }
    Ok(claims)
}

/// Resolve `#n` (1-based position) or a case-insensitive item name.
pub fn resolve_item(receipt: &Receipt, spec: &str) -> Result<ItemId, CliError> {
    if let Some(pos) = spec.strip_prefix('#') {
        let index: usize = pos
            .trim()
            .parse()
            .map_err(|_| CliError::usage(format!("'{spec}' is not a valid item position")))?;
        return index
            .checked_sub(1)
            .and_then(|i| receipt.items().nth(i))
            .map(|it| it.id)
            .ok_or_else(|| {
                CliError::new(
                    EXIT_NOT_FOUND,
                    format!("no item at position {index} (receipt has {})", receipt.len()),
                )
            });
    }

    let wanted = spec.trim().to_lowercase();
    let matches: Vec<ItemId> = receipt
        .items()
        .filter(|it| it.name.to_lowercase() == wanted)
        .map(|it| it.id)
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(CliError::new(EXIT_NOT_FOUND, format!("unknown item '{spec}'"))),
        _ => Err(CliError::usage(format!("'{spec}' matches {} items", matches.len()))
            .with_hint("name the item by position instead, e.g. #2")),
    }
}

/// Build a session from a receipt and claims. Participants join in order of
/// first mention, after the `extra` ones.
pub fn build_session(
    receipt: Receipt,
    session: &mut BillSession,
    claims: &[ClaimRow],
    extra: &[String],
) -> Result<(), CliError> {
    if extra.iter().any(|name| name.trim().is_empty()) {
        return Err(CliError::usage("--participant needs a non-blank name"));
    }
    for name in extra.iter().map(String::as_str).chain(claims.iter().map(|c| c.participant.as_str())) {
        if session.participants().find_by_name(name).is_none() {
            session.add_participant(name.trim());
        }
    }

    session.submit_receipt(receipt);
    let receipt = session
        .receipt()
        .cloned()
        .ok_or_else(|| CliError::general("receipt was not stored"))?;

    for claim in claims {
        let item = resolve_item(&receipt, &claim.item).map_err(|e| CliError {
            message: format!("assignments line {}: {}", claim.line, e.message),
            ..e
        })?;
        let participant = session
            .participants()
            .find_by_name(&claim.participant)
            .map(|p| p.id)
            .ok_or_else(|| CliError::general(format!("participant '{}' missing", claim.participant)))?;

        tracing::debug!("line {}: {} claims {} of {item}", claim.line, claim.participant, claim.count);
        session.assign(item, participant, claim.count).map_err(|e| {
            let err = CliError::ledger(e);
            CliError {
                message: format!("assignments line {}: {}", claim.line, err.message),
                ..err
            }
        })?;
    }
    Ok(())
}

pub fn cmd_split(
    items: Option<PathBuf>,
    total: Option<String>,
    receipt: Option<PathBuf>,
    assign: PathBuf,
    participants: Vec<String>,
    json: bool,
    out: Option<PathBuf>,
) -> Result<(), CliError> {
    let mut session = BillSession::new();

    let receipt = match (items, receipt) {
        (_, Some(path)) => {
            let content = read_file_as_utf8(&path).map_err(|e| CliError::from_io_error(e, &path))?;
            receipt_from_json(&content, session.ids()).map_err(|e| CliError::from_io_error(e, &path))?
        }
        (Some(path), None) => {
            let total_text = total.unwrap_or_default();
            let total = try_parse_amount(&total_text)
                .ok_or_else(|| CliError::usage(format!("total '{total_text}' is not an amount")))?;
            import_items(&path, total, session.ids()).map_err(|e| CliError::from_io_error(e, &path))?
        }
        (None, None) => {
            return Err(CliError::usage("either --items with --total, or --receipt, is required"))
        }
    };

    let content = read_file_as_utf8(&assign).map_err(|e| CliError::from_io_error(e, &assign))?;
    let claims = parse_claims(&content)?;
    build_session(receipt, &mut session, &claims, &participants)?;

    let report = session.report().map_err(CliError::ledger)?;

    if let Some(path) = out.as_deref() {
        write_report_file(&report, path)?;
    }

    if json {
        let doc = report_to_json(&report).map_err(|e| CliError::general(e.to_string()))?;
        emit(&doc, None)?;
    } else {
        print!("{}", render_table(&report));
    }

    if report.unclaimed_subtotal > 0.0 {
        eprintln!(
            "warning: {:.2} of the subtotal is unclaimed and not charged to anyone",
            report.unclaimed_subtotal
        );
    }
    Ok(())
}

fn write_report_file(report: &Report, path: &Path) -> Result<(), CliError> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let content = if is_json {
        report_to_json(report)
    } else {
        export_report(report)
    }
    .map_err(|e| CliError::general(e.to_string()))?;
    emit(&content, Some(path))
}

/// Human-readable summary: one row per participant plus totals.
pub fn render_table(report: &Report) -> String {
    let width = report
        .participants
        .iter()
        .map(|p| p.name.chars().count())
        .chain(["participant".len(), "unclaimed".len()])
        .max()
        .unwrap_or(0);

    let mut out = format!(
        "{:<width$}  {:>12}  {:>12}  {:>12}\n",
        "participant", "subtotal", "others", "total"
    );
    for p in &report.participants {
        out.push_str(&format!(
            "{:<width$}  {:>12.2}  {:>12.2}  {:>12.2}\n",
            p.name, p.purchased_subtotal, p.purchased_others, p.purchased_total
        ));
    }
    if report.unclaimed_subtotal > 0.0 {
        out.push_str(&format!(
            "{:<width$}  {:>12.2}  {:>12}  {:>12}\n",
            "unclaimed", report.unclaimed_subtotal, "-", "-"
        ));
    }
    out.push_str(&format!(
        "receipt: subtotal {:.2}, others {:.2}, total {:.2}\n",
        report.receipt_subtotal, report.others_total, report.receipt_total
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::{EXIT_OVER_ASSIGNMENT, EXIT_USAGE};
    use splitbill_core::{IdGenerator, Item};

    fn receipt(ids: &IdGenerator) -> Receipt {
        Receipt::new(
            vec![
                Item::new(ids.next_item(), "Coffee", 2, 10_000.0),
                Item::new(ids.next_item(), "Cake", 1, 15_000.0),
                Item::new(ids.next_item(), "Water", 1, 5_000.0),
                Item::new(ids.next_item(), "water", 1, 5_000.0),
            ],
            44_000.0,
        )
    }

    #[test]
    fn claims_table_with_defaults() {
        let claims = parse_claims("Participant;Item;Count\nAlice;Coffee;2\nBob;#2;\n;;\n").unwrap();
        assert_eq!(
            claims,
            vec![
                ClaimRow { line: 2, participant: "Alice".into(), item: "Coffee".into(), count: 2 },
                ClaimRow { line: 3, participant: "Bob".into(), item: "#2".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn claims_table_errors() {
        let err = parse_claims("participant,item,count\nAlice,Coffee,two\n").unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.message.contains("line 2"), "{}", err.message);

        let err = parse_claims("who,what\nAlice,Coffee\n").unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }

    #[test]
    fn items_resolve_by_name_or_position() {
        let ids = IdGenerator::new();
        let r = receipt(&ids);
        let coffee = r.items().next().unwrap().id;
        assert_eq!(resolve_item(&r, "  coffee ").unwrap(), coffee);
        assert_eq!(resolve_item(&r, "#1").unwrap(), coffee);
        assert_eq!(resolve_item(&r, "#9").unwrap_err().code, EXIT_NOT_FOUND);
        assert_eq!(resolve_item(&r, "#0").unwrap_err().code, EXIT_NOT_FOUND);
        assert_eq!(resolve_item(&r, "Tea").unwrap_err().code, EXIT_NOT_FOUND);

        let ambiguous = resolve_item(&r, "Water").unwrap_err();
        assert_eq!(ambiguous.code, EXIT_USAGE);
        assert!(ambiguous.hint.is_some());
    }

    #[test]
    fn session_follows_claims() {
        let mut session = BillSession::new();
        let r = receipt(session.ids());
        let claims = parse_claims("participant,item,count\nAlice,Coffee,2\nBob,Cake,1\nalice,#3,1\n").unwrap();
        build_session(r, &mut session, &claims, &["Carol".to_string()]).unwrap();

        let names: Vec<_> = session.participants().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Carol", "Alice", "Bob"]);

        let report = session.report().unwrap();
        let alice = &report.participants[1];
        assert_eq!(alice.items.len(), 2);
        assert!((alice.purchased_subtotal - 15_000.0).abs() < 1e-6);
        assert!((report.unclaimed_subtotal - 5_000.0).abs() < 1e-6);
        assert_eq!(report.participants[0].purchased_total, 0.0);
    }

    #[test]
    fn blank_extra_participant_is_rejected() {
        let mut session = BillSession::new();
        let r = receipt(session.ids());
        let claims = parse_claims("participant,item,count\nAlice,Coffee,1\n").unwrap();
        let err = build_session(r, &mut session, &claims, &["Carol".to_string(), "  ".to_string()])
            .unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(session.participants().is_empty());
    }

    #[test]
    fn over_assignment_names_the_line() {
        let mut session = BillSession::new();
        let r = receipt(session.ids());
        let claims = parse_claims("participant,item,count\nAlice,Cake,1\nBob,Cake,1\n").unwrap();
        let err = build_session(r, &mut session, &claims, &[]).unwrap_err();
        assert_eq!(err.code, EXIT_OVER_ASSIGNMENT);
        assert!(err.message.starts_with("assignments line 3:"), "{}", err.message);
    }

    #[test]
    fn table_lists_everyone() {
        let mut session = BillSession::new();
        let r = receipt(session.ids());
        let claims = parse_claims("participant,item\nAlice,Cake\n").unwrap();
        build_session(r, &mut session, &claims, &[]).unwrap();
        let table = render_table(&session.report().unwrap());
        assert!(table.starts_with("participant"));
        assert!(table.contains("Alice"));
        assert!(table.contains("unclaimed"));
        assert!(table.ends_with("total 44000.00\n"));
    }
}
