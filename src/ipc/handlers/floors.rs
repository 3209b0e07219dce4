use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{i64_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::structure::{self, Floor, Status};
use serde_json::json;

fn floor_json(floor: &Floor) -> serde_json::Value {
    json!({
        "id": floor.id,
        "blockId": floor.block_id,
        "floorNumber": floor.floor_number,
        "status": floor.status.as_str(),
    })
}

fn parse_status(params: &serde_json::Value) -> Result<Option<Status>, crate::error::StructureError> {
    match str_param(params, "status") {
        Some(s) => Status::parse(s).map(Some),
        None => Ok(None),
    }
}

fn handle_floors_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "floors": [] }));
    };
    let block_id = i64_param(&req.params, "blockId");

    let sql = "SELECT
           f.id,
           f.block_id,
           f.floor_number,
           f.status,
           (SELECT COUNT(*) FROM rooms r WHERE r.floor_id = f.id) AS room_count
         FROM floors f
         WHERE (?1 IS NULL OR f.block_id = ?1)
         ORDER BY f.block_id, f.floor_number";
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };

    let rows = stmt
        .query_map([block_id], |row| {
            let id: i64 = row.get(0)?;
            let bid: i64 = row.get(1)?;
            let number: i64 = row.get(2)?;
            let status: String = row.get(3)?;
            let room_count: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "blockId": bid,
                "floorNumber": number,
                "status": status,
                "roomCount": room_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(floors) => ok(&req.id, json!({ "floors": floors })),
        Err(e) => err(&req.id, "internal_error", e.to_string(), None),
    }
}

fn handle_floors_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(block_id) = i64_param(&req.params, "blockId") else {
        return err(&req.id, "bad_params", "missing blockId", None);
    };
    let Some(floor_number) = i64_param(&req.params, "floorNumber") else {
        return err(&req.id, "bad_params", "missing floorNumber", None);
    };
    let status = match parse_status(&req.params) {
        Ok(v) => v.unwrap_or(Status::Active),
        Err(e) => return domain_err(&req.id, &e),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match structure::create_floor(&tx, block_id, floor_number, status) {
        Ok(floor) => match tx.commit() {
            Ok(()) => ok(&req.id, floor_json(&floor)),
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

fn handle_floors_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let floor_number = i64_param(&req.params, "floorNumber");
    let status = match parse_status(&req.params) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match structure::update_floor(&tx, id, floor_number, status) {
        Ok(floor) => match tx.commit() {
            Ok(()) => ok(&req.id, floor_json(&floor)),
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

fn handle_floors_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    match structure::delete_floor(&tx, id) {
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
        "floors.list" => Some(handle_floors_list(state, req)),
        "floors.create" => Some(handle_floors_create(state, req)),
        "floors.update" => Some(handle_floors_update(state, req)),
        "floors.delete" => Some(handle_floors_delete(state, req)),
        _ => None,
    }
}
