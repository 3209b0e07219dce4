use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let mut stmt = match conn.prepare(
        "SELECT id, roll_no, full_name, email FROM students ORDER BY roll_no",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "rollNo": row.get::<_, String>(1)?,
                "fullName": row.get::<_, String>(2)?,
                "email": row.get::<_, Option<String>>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "internal_error", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let roll_no = match str_param(&req.params, "rollNo") {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing rollNo", None),
    };
    if roll_no.is_empty() {
        return err(&req.id, "validation_error", "rollNo must not be empty", None);
    }
    let full_name = match str_param(&req.params, "fullName") {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing fullName", None),
    };
    if full_name.is_empty() {
        return err(
            &req.id,
            "validation_error",
            "fullName must not be empty",
            None,
        );
    }
    let email = str_param(&req.params, "email")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let taken: Option<i64> = match conn
        .query_row(
            "SELECT id FROM students WHERE roll_no = ?",
            [&roll_no],
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
            format!("student with roll number '{roll_no}' already exists"),
            None,
        );
    }

    if let Err(e) = conn.execute(
        "INSERT INTO students(roll_no, full_name, email) VALUES(?, ?, ?)",
        (&roll_no, &full_name, &email),
    ) {
        return err(&req.id, "internal_error", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({
            "id": conn.last_insert_rowid(),
            "rollNo": roll_no,
            "fullName": full_name,
            "email": email,
        }),
    )
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    let existing: Option<(String, String, Option<String>)> = match conn
        .query_row(
            "SELECT roll_no, full_name, email FROM students WHERE id = ?",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    let Some((mut roll_no, mut full_name, mut email)) = existing else {
        return err(&req.id, "not_found", "student not found", None);
    };

    if let Some(v) = str_param(&req.params, "rollNo") {
        let v = v.trim();
        if v.is_empty() {
            return err(&req.id, "validation_error", "rollNo must not be empty", None);
        }
        if v != roll_no {
            let taken: Option<i64> = match conn
                .query_row(
                    "SELECT id FROM students WHERE roll_no = ? AND id != ?",
                    (v, id),
                    |r| r.get(0),
                )
                .optional()
            {
                Ok(t) => t,
                Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
            };
            if taken.is_some() {
                return err(
                    &req.id,
                    "validation_error",
                    format!("student with roll number '{v}' already exists"),
                    None,
                );
            }
            roll_no = v.to_string();
        }
    }
    if let Some(v) = str_param(&req.params, "fullName") {
        let v = v.trim();
        if v.is_empty() {
            return err(
                &req.id,
                "validation_error",
                "fullName must not be empty",
                None,
            );
        }
        full_name = v.to_string();
    }
    if let Some(v) = str_param(&req.params, "email") {
        let v = v.trim();
        email = if v.is_empty() {
            None
        } else {
            Some(v.to_string())
        };
    }

    if let Err(e) = conn.execute(
        "UPDATE students SET roll_no = ?, full_name = ?, email = ? WHERE id = ?",
        (&roll_no, &full_name, &email, id),
    ) {
        return err(&req.id, "internal_error", e.to_string(), None);
    }
    ok(
        &req.id,
        json!({
            "id": id,
            "rollNo": roll_no,
            "fullName": full_name,
            "email": email,
        }),
    )
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    let has_history: i64 = match conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM seat_allocations WHERE student_id = ?)",
        [id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    if has_history != 0 {
        return err(
            &req.id,
            "conflict",
            "student has examination history and cannot be deleted",
            None,
        );
    }

    if let Err(e) = conn.execute("DELETE FROM students WHERE id = ?", [id]) {
        return err(&req.id, "internal_error", e.to_string(), None);
    }
    ok(&req.id, json!({ "deleted": true }))
}

fn handle_students_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let text = match super::import_structure::read_import_text(&req.params) {
        Ok(t) => t,
        Err((code, message)) => return err(&req.id, code, message, None),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match crate::import::import_students_csv(&tx, &text) {
        // Best-effort: valid rows commit even when some rows failed.
        Ok(summary) => match tx.commit() {
            Ok(()) => {
                log::info!(
                    "student import: {} imported, {} rejected",
                    summary.imported,
                    summary.errors.len()
                );
                let errors: Vec<serde_json::Value> = summary
                    .errors
                    .iter()
                    .map(|e| json!({ "line": e.line, "message": e.message }))
                    .collect();
                ok(
                    &req.id,
                    json!({ "imported": summary.imported, "errors": errors }),
                )
            }
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            crate::ipc::error::domain_err(&req.id, &e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.importCsv" => Some(handle_students_import_csv(state, req)),
        _ => None,
    }
}
