use std::collections::HashMap;

use rusqlite::{OptionalExtension, Transaction};

use crate::error::StructureError;
use crate::grid::Layout;
use crate::structure::{self, NewRoom, Status};

type Result<T> = std::result::Result<T, StructureError>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub blocks_created: usize,
    pub floors_created: usize,
    pub rooms_created: usize,
}

#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RosterSummary {
    pub imported: usize,
    pub errors: Vec<RowError>,
}

/// Split one CSV line into fields. Handles quoted fields and doubled
/// quotes; no embedded newlines (the importers read line by line).
pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

const STRUCTURE_HEADERS: [&str; 5] = [
    "blockname",
    "floornumber",
    "roomcode",
    "capacity",
    "isexamusable",
];

/// Map header names (case-insensitive, trimmed) to column indexes,
/// requiring every name in `required`.
fn header_indexes(header_line: &str, required: &[&str]) -> Result<HashMap<String, usize>> {
    let mut indexes = HashMap::new();
    for (i, field) in parse_csv_record(header_line).iter().enumerate() {
        indexes.insert(field.trim().to_ascii_lowercase(), i);
    }
    for name in required {
        if !indexes.contains_key(*name) {
            return Err(StructureError::format(format!(
                "missing required column: {name}"
            )));
        }
    }
    Ok(indexes)
}

fn field<'a>(fields: &'a [String], indexes: &HashMap<String, usize>, name: &str) -> &'a str {
    indexes
        .get(name)
        .and_then(|i| fields.get(*i))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn parse_exam_usable(raw: &str) -> bool {
    !matches!(
        raw.to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "n"
    )
}

/// Atomic structural import: create any missing blocks/floors/rooms from a
/// CSV with columns BlockName,FloorNumber,RoomCode,Capacity,IsExamUsable.
///
/// The first failing row aborts the whole run; the caller rolls the
/// transaction back on error. Line numbers in messages use the legacy
/// convention: 1-based data row + 2.
pub fn import_structure_csv(tx: &Transaction<'_>, text: &str) -> Result<ImportSummary> {
    let mut lines = text.lines();
    let Some(header_line) = lines.next() else {
        return Err(StructureError::format("import file is empty"));
    };
    let indexes = header_indexes(header_line, &STRUCTURE_HEADERS)?;

    let mut summary = ImportSummary::default();
    let mut block_cache: HashMap<String, i64> = HashMap::new();
    let mut floor_cache: HashMap<String, i64> = HashMap::new();
    let mut seen_codes: HashMap<String, usize> = HashMap::new();
    let mut data_rows = 0usize;

    for raw_line in lines {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        data_rows += 1;
        let line_no = data_rows + 2;
        let fields = parse_csv_record(line);

        let block_name = field(&fields, &indexes, "blockname");
        if block_name.is_empty() {
            return Err(StructureError::format(format!(
                "line {line_no}: BlockName must not be empty"
            )));
        }
        let floor_number: i64 = match field(&fields, &indexes, "floornumber").parse() {
            Ok(v) => v,
            Err(_) => {
                return Err(StructureError::format(format!(
                    "line {line_no}: FloorNumber must be an integer"
                )))
            }
        };
        let room_code = field(&fields, &indexes, "roomcode");
        if room_code.is_empty() {
            return Err(StructureError::format(format!(
                "line {line_no}: RoomCode must not be empty"
            )));
        }
        let capacity: i64 = match field(&fields, &indexes, "capacity").parse() {
            Ok(v) if v > 0 => v,
            _ => {
                return Err(StructureError::format(format!(
                    "line {line_no}: Capacity must be a positive integer"
                )))
            }
        };
        let exam_usable = parse_exam_usable(field(&fields, &indexes, "isexamusable"));

        let code_key = room_code.to_ascii_lowercase();
        if let Some(first_line) = seen_codes.get(&code_key) {
            return Err(StructureError::format(format!(
                "line {line_no}: duplicate RoomCode '{room_code}' (first seen on line {first_line})"
            )));
        }
        seen_codes.insert(code_key, line_no);

        let block_id = resolve_block(tx, &mut block_cache, block_name, &mut summary)?;
        let floor_id = resolve_floor(tx, &mut floor_cache, block_id, floor_number, &mut summary)?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM rooms WHERE floor_id = ? AND room_code = ?",
                (floor_id, room_code),
                |r| r.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(StructureError::validation(format!(
                "line {line_no}: room '{room_code}' already exists on floor {floor_number} of block '{block_name}'"
            )));
        }

        // Imported rooms start without a grid; layout is configured later.
        structure::create_room(
            tx,
            &NewRoom {
                block_id,
                floor_id,
                room_code: room_code.to_string(),
                capacity,
                exam_usable,
                layout: Layout::default(),
            },
        )?;
        summary.rooms_created += 1;
    }

    if data_rows == 0 {
        return Err(StructureError::format("import file has no data rows"));
    }
    Ok(summary)
}

fn resolve_block(
    tx: &Transaction<'_>,
    cache: &mut HashMap<String, i64>,
    name: &str,
    summary: &mut ImportSummary,
) -> Result<i64> {
    if let Some(id) = cache.get(name) {
        return Ok(*id);
    }
    let existing: Option<i64> = tx
        .query_row("SELECT id FROM blocks WHERE name = ?", [name], |r| r.get(0))
        .optional()?;
    let id = match existing {
        Some(id) => id,
        None => {
            let block = structure::create_block(tx, name, Status::Active)?;
            summary.blocks_created += 1;
            block.id
        }
    };
    cache.insert(name.to_string(), id);
    Ok(id)
}

fn resolve_floor(
    tx: &Transaction<'_>,
    cache: &mut HashMap<String, i64>,
    block_id: i64,
    floor_number: i64,
    summary: &mut ImportSummary,
) -> Result<i64> {
    let key = format!("{block_id}-{floor_number}");
    if let Some(id) = cache.get(&key) {
        return Ok(*id);
    }
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM floors WHERE block_id = ? AND floor_number = ?",
            (block_id, floor_number),
            |r| r.get(0),
        )
        .optional()?;
    let id = match existing {
        Some(id) => id,
        None => {
            let floor = structure::create_floor(tx, block_id, floor_number, Status::Active)?;
            summary.floors_created += 1;
            floor.id
        }
    };
    cache.insert(key, id);
    Ok(id)
}

const ROSTER_HEADERS: [&str; 2] = ["rollno", "fullname"];

/// Best-effort student roster import (columns RollNo,FullName,Email).
///
/// Unlike the structural import, bad rows are collected and reported while
/// the valid ones commit; the two batch strategies are intentionally
/// different and call sites rely on both.
pub fn import_students_csv(tx: &Transaction<'_>, text: &str) -> Result<RosterSummary> {
    let mut lines = text.lines();
    let Some(header_line) = lines.next() else {
        return Err(StructureError::format("import file is empty"));
    };
    let indexes = header_indexes(header_line, &ROSTER_HEADERS)?;

    let mut summary = RosterSummary::default();
    let mut seen_rolls: HashMap<String, usize> = HashMap::new();
    let mut data_rows = 0usize;

    for raw_line in lines {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        data_rows += 1;
        let line_no = data_rows + 2;
        let fields = parse_csv_record(line);

        let roll_no = field(&fields, &indexes, "rollno");
        if roll_no.is_empty() {
            summary.errors.push(RowError {
                line: line_no,
                message: "RollNo must not be empty".to_string(),
            });
            continue;
        }
        let full_name = field(&fields, &indexes, "fullname");
        if full_name.is_empty() {
            summary.errors.push(RowError {
                line: line_no,
                message: "FullName must not be empty".to_string(),
            });
            continue;
        }
        let email = field(&fields, &indexes, "email");

        let roll_key = roll_no.to_ascii_lowercase();
        if let Some(first_line) = seen_rolls.get(&roll_key) {
            summary.errors.push(RowError {
                line: line_no,
                message: format!("duplicate RollNo '{roll_no}' (first seen on line {first_line})"),
            });
            continue;
        }
        seen_rolls.insert(roll_key, line_no);

        let existing: Option<i64> = tx
            .query_row("SELECT id FROM students WHERE roll_no = ?", [roll_no], |r| {
                r.get(0)
            })
            .optional()?;
        if existing.is_some() {
            summary.errors.push(RowError {
                line: line_no,
                message: format!("student with RollNo '{roll_no}' already exists"),
            });
            continue;
        }

        tx.execute(
            "INSERT INTO students(roll_no, full_name, email) VALUES(?, ?, ?)",
            (
                roll_no,
                full_name,
                if email.is_empty() { None } else { Some(email) },
            ),
        )?;
        summary.imported += 1;
    }

    if data_rows == 0 {
        return Err(StructureError::format("import file has no data rows"));
    }
    Ok(summary)
}
