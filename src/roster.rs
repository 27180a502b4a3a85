//! Class roster CSV import.

use crate::db::models::RosterEntry;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("CSV appears empty or invalid")]
    Empty,
    #[error("CSV must include email and userName columns")]
    MissingColumns,
}

/// Rows ready to insert plus the reasons other rows were dropped.
#[derive(Debug, Default)]
pub struct Roster {
    pub entries: Vec<RosterEntry>,
    pub rejected: Vec<String>,
}

/// Splits CSV text into records, honouring quoted fields (which may contain
/// commas, doubled quotes and line breaks). Each record carries the line it
/// starts on.
fn parse_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut start = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut buf)),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut buf));
                records.push((start, std::mem::take(&mut fields)));
                line += 1;
                start = line;
            }
            '\n' => {
                buf.push(ch);
                line += 1;
            }
            _ => buf.push(ch),
        }
    }

    if !buf.is_empty() || !fields.is_empty() {
        fields.push(buf);
        records.push((start, fields));
    }
    records
}

/// Reads a roster with `email` and `username` columns and an optional
/// `classcode` column (header names are case-insensitive). Emails are
/// lowercased; rows without a class code column take `default_class`.
pub fn parse(text: &str, default_class: &str) -> Result<Roster, RosterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = parse_records(text).into_iter();

    let (_, header) = records.next().ok_or(RosterError::Empty)?;
    let header: Vec<String> = header
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    let column = |name: &str| header.iter().position(|h| h == name);

    let (Some(email_idx), Some(name_idx)) = (column("email"), column("username")) else {
        return Err(RosterError::MissingColumns);
    };
    let class_idx = column("classcode");

    let mut roster = Roster::default();
    for (line, row) in records {
        if row.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let field = |idx: usize| row.get(idx).map(|v| v.trim()).unwrap_or_default();

        let email = field(email_idx).to_lowercase();
        let user_name = field(name_idx).to_string();
        let class_code = match class_idx {
            Some(idx) => field(idx).to_string(),
            None => default_class.trim().to_string(),
        };

        if email.is_empty() || user_name.is_empty() {
            roster
                .rejected
                .push(format!("Line {line}: missing email or userName"));
            continue;
        }
        if class_code.is_empty() {
            roster.rejected.push(format!("Line {line}: missing classCode"));
            continue;
        }

        roster.entries.push(RosterEntry {
            line,
            email,
            user_name,
            class_code,
        });
    }

    Ok(roster)
}
