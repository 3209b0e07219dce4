use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::structure::{self, Block, Status};
use serde_json::json;

fn block_json(block: &Block) -> serde_json::Value {
    json!({
        "id": block.id,
        "name": block.name,
        "status": block.status.as_str(),
    })
}

fn parse_status(params: &serde_json::Value) -> Result<Option<Status>, crate::error::StructureError> {
    match str_param(params, "status") {
        Some(s) => Status::parse(s).map(Some),
        None => Ok(None),
    }
}

fn handle_blocks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "blocks": [] }));
    };

    // Counts let the dashboard show the hierarchy at a glance; correlated
    // subqueries avoid double-counting from joins.
    let mut stmt = match conn.prepare(
        "SELECT
           b.id,
           b.name,
           b.status,
           (SELECT COUNT(*) FROM floors f WHERE f.block_id = b.id) AS floor_count,
           (SELECT COUNT(*) FROM rooms r WHERE r.block_id = b.id) AS room_count
         FROM blocks b
         ORDER BY b.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let status: String = row.get(2)?;
            let floor_count: i64 = row.get(3)?;
            let room_count: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "name": name,
                "status": status,
                "floorCount": floor_count,
                "roomCount": room_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(blocks) => ok(&req.id, json!({ "blocks": blocks })),
        Err(e) => err(&req.id, "internal_error", e.to_string(), None),
    }
}

fn handle_blocks_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(name) = str_param(&req.params, "name") else {
        return err(&req.id, "bad_params", "missing name", None);
    };
    let status = match parse_status(&req.params) {
        Ok(v) => v.unwrap_or(Status::Active),
        Err(e) => return domain_err(&req.id, &e),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match structure::create_block(&tx, name, status) {
        Ok(block) => match tx.commit() {
            Ok(()) => ok(&req.id, block_json(&block)),
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

fn handle_blocks_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let name = str_param(&req.params, "name");
    let status = match parse_status(&req.params) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match structure::update_block(&tx, id, name, status) {
        Ok(block) => match tx.commit() {
            Ok(()) => ok(&req.id, block_json(&block)),
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

fn handle_blocks_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match structure::delete_block(&tx, id) {
        Ok(()) => match tx.commit() {
            Ok(()) => ok(&req.id, json!({ "deleted": true })),
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "blocks.list" => Some(handle_blocks_list(state, req)),
        "blocks.create" => Some(handle_blocks_create(state, req)),
        "blocks.update" => Some(handle_blocks_update(state, req)),
        "blocks.delete" => Some(handle_blocks_delete(state, req)),
        _ => None,
    }
}
