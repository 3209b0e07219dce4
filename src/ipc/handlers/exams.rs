use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_exams_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "exams": [] }));
    };
    let mut stmt = match conn.prepare(
        "SELECT
           e.id,
           e.title,
           e.exam_date,
           (SELECT COUNT(*) FROM seat_allocations sa WHERE sa.exam_id = e.id) AS allocation_count
         FROM exams e
         ORDER BY e.exam_date, e.title",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "title": row.get::<_, String>(1)?,
                "examDate": row.get::<_, String>(2)?,
                "allocationCount": row.get::<_, i64>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(exams) => ok(&req.id, json!({ "exams": exams })),
        Err(e) => err(&req.id, "internal_error", e.to_string(), None),
    }
}

fn handle_exams_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let title = match str_param(&req.params, "title") {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing title", None),
    };
    if title.is_empty() {
        return err(&req.id, "validation_error", "title must not be empty", None);
    }
    let Some(date_raw) = str_param(&req.params, "examDate") else {
        return err(&req.id, "bad_params", "missing examDate", None);
    };
    // Stored as ISO text so date comparisons work lexicographically.
    let exam_date = match NaiveDate::parse_from_str(date_raw, "%Y-%m-%d") {
        Ok(d) => d.format("%Y-%m-%d").to_string(),
        Err(_) => {
            return err(
                &req.id,
                "validation_error",
                "examDate must be YYYY-MM-DD",
                None,
            )
        }
    };

    if let Err(e) = conn.execute(
        "INSERT INTO exams(title, exam_date) VALUES(?, ?)",
        (&title, &exam_date),
    ) {
        return err(&req.id, "internal_error", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({
            "id": conn.last_insert_rowid(),
            "title": title,
            "examDate": exam_date,
        }),
    )
}

fn handle_exams_allocate_seat(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(exam_id) = i64_param(&req.params, "examId") else {
        return err(&req.id, "bad_params", "missing examId", None);
    };
    let Some(seat_id) = i64_param(&req.params, "seatId") else {
        return err(&req.id, "bad_params", "missing seatId", None);
    };
    let student_id = i64_param(&req.params, "studentId");

    let exam_exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM exams WHERE id = ?", [exam_id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    if exam_exists.is_none() {
        return err(&req.id, "not_found", "exam not found", None);
    }
    let seat_exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM seats WHERE id = ?", [seat_id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    if seat_exists.is_none() {
        return err(&req.id, "not_found", "seat not found", None);
    }

    let taken: Option<i64> = match conn
        .query_row(
            "SELECT id FROM seat_allocations WHERE exam_id = ? AND seat_id = ?",
            (exam_id, seat_id),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    if taken.is_some() {
        return err(
            &req.id,
            "validation_error",
            "seat is already allocated for this exam",
            None,
        );
    }

    if let Err(e) = conn.execute(
        "INSERT INTO seat_allocations(exam_id, seat_id, student_id) VALUES(?, ?, ?)",
        (exam_id, seat_id, student_id),
    ) {
        return err(&req.id, "internal_error", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({
            "id": conn.last_insert_rowid(),
            "examId": exam_id,
            "seatId": seat_id,
            "studentId": student_id,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.list" => Some(handle_exams_list(state, req)),
        "exams.create" => Some(handle_exams_create(state, req)),
        "exams.allocateSeat" => Some(handle_exams_allocate_seat(state, req)),
        _ => None,
    }
}
