use crate::import;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::Path;

/// Import text comes either inline (`content`) or from a file (`path`);
/// the HTTP upload layer that used to produce it is out of scope here.
pub(crate) fn read_import_text(
    params: &serde_json::Value,
) -> Result<String, (&'static str, String)> {
    if let Some(content) = params.get("content").and_then(|v| v.as_str()) {
        return Ok(content.to_string());
    }
    let Some(path) = params.get("path").and_then(|v| v.as_str()) else {
        return Err(("bad_params", "missing path or content".to_string()));
    };
    std::fs::read_to_string(Path::new(path))
        .map_err(|e| ("io_error", format!("failed to read {path}: {e}")))
}

fn handle_structure_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let text = match read_import_text(&req.params) {
        Ok(t) => t,
        Err((code, message)) => return err(&req.id, code, message, None),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match import::import_structure_csv(&tx, &text) {
        Ok(summary) => match tx.commit() {
            Ok(()) => {
                log::info!(
                    "structure import: {} blocks, {} floors, {} rooms",
                    summary.blocks_created,
                    summary.floors_created,
                    summary.rooms_created
                );
                ok(
                    &req.id,
                    json!({
                        "blocksCreated": summary.blocks_created,
                        "floorsCreated": summary.floors_created,
                        "roomsCreated": summary.rooms_created,
                    }),
                )
            }
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        // All-or-nothing: any row failure discards the whole run.
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "structure.importCsv" => Some(handle_structure_import_csv(state, req)),
        _ => None,
    }
}
