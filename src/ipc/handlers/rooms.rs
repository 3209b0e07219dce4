use crate::grid::Layout;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{bool_param, i64_param, str_param, u32_param};
use crate::ipc::types::{AppState, Request};
use crate::structure::{self, BulkRoomSpec, NewRoom, Room, RoomPatch, Status};
use chrono::Local;
use serde_json::json;

fn room_json(room: &Room) -> serde_json::Value {
    json!({
        "id": room.id,
        "blockId": room.block_id,
        "floorId": room.floor_id,
        "roomCode": room.room_code,
        "capacity": room.capacity,
        "examUsable": room.exam_usable,
        "status": room.status.as_str(),
        "totalRows": room.layout.total_rows,
        "benchesPerRow": room.layout.benches_per_row,
        "seatsPerBench": room.layout.seats_per_bench,
    })
}

/// A layout is supplied only as a full triple; a partial one is a caller
/// mistake, not a zero-fill.
fn parse_layout(params: &serde_json::Value) -> Result<Option<Layout>, &'static str> {
    let rows = u32_param(params, "totalRows");
    let benches = u32_param(params, "benchesPerRow");
    let seats = u32_param(params, "seatsPerBench");
    match (rows, benches, seats) {
        (Some(r), Some(b), Some(s)) => Ok(Some(Layout::new(r, b, s))),
        (None, None, None) => Ok(None),
        _ => Err("totalRows, benchesPerRow and seatsPerBench must be supplied together"),
    }
}

fn handle_rooms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "rooms": [] }));
    };
    let floor_id = i64_param(&req.params, "floorId");

    let sql = "SELECT
           r.id, r.block_id, r.floor_id, r.room_code, r.capacity, r.exam_usable, r.status,
           r.total_rows, r.benches_per_row, r.seats_per_bench,
           (SELECT COUNT(*) FROM seats s WHERE s.room_id = r.id) AS seat_count
         FROM rooms r
         WHERE (?1 IS NULL OR r.floor_id = ?1)
         ORDER BY r.floor_id, r.room_code";
    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };

    let rows = stmt
        .query_map([floor_id], |row| {
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "blockId": row.get::<_, i64>(1)?,
                "floorId": row.get::<_, i64>(2)?,
                "roomCode": row.get::<_, String>(3)?,
                "capacity": row.get::<_, i64>(4)?,
                "examUsable": row.get::<_, i64>(5)? != 0,
                "status": row.get::<_, String>(6)?,
                "totalRows": row.get::<_, i64>(7)?,
                "benchesPerRow": row.get::<_, i64>(8)?,
                "seatsPerBench": row.get::<_, i64>(9)?,
                "seatCount": row.get::<_, i64>(10)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(rooms) => ok(&req.id, json!({ "rooms": rooms })),
        Err(e) => err(&req.id, "internal_error", e.to_string(), None),
    }
}

fn handle_rooms_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(block_id) = i64_param(&req.params, "blockId") else {
        return err(&req.id, "bad_params", "missing blockId", None);
    };
    let Some(floor_id) = i64_param(&req.params, "floorId") else {
        return err(&req.id, "bad_params", "missing floorId", None);
    };
    let Some(room_code) = str_param(&req.params, "roomCode") else {
        return err(&req.id, "bad_params", "missing roomCode", None);
    };
    let Some(capacity) = i64_param(&req.params, "capacity") else {
        return err(&req.id, "bad_params", "missing capacity", None);
    };
    let exam_usable = bool_param(&req.params, "examUsable").unwrap_or(true);
    let layout = match parse_layout(&req.params) {
        Ok(v) => v.unwrap_or_default(),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let spec = NewRoom {
        block_id,
        floor_id,
        room_code: room_code.to_string(),
        capacity,
        exam_usable,
        layout,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match structure::create_room(&tx, &spec) {
        Ok(room) => match tx.commit() {
            Ok(()) => ok(&req.id, room_json(&room)),
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

fn handle_rooms_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let status = match str_param(&req.params, "status") {
        Some(s) => match Status::parse(s) {
            Ok(v) => Some(v),
            Err(e) => return domain_err(&req.id, &e),
        },
        None => None,
    };
    let layout = match parse_layout(&req.params) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let patch = RoomPatch {
        room_code: str_param(&req.params, "roomCode").map(str::to_string),
        capacity: i64_param(&req.params, "capacity"),
        exam_usable: bool_param(&req.params, "examUsable"),
        status,
        layout,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    let today = Local::now().date_naive();
    match structure::update_room(&tx, id, &patch, today) {
        Ok(outcome) => match tx.commit() {
            // A rejected layout still commits the other field changes; the
            // caller sees a conflict for the layout portion.
            Ok(()) => match outcome.layout_rejected {
                Some(reason) => err(
                    &req.id,
                    "conflict",
                    reason,
                    Some(json!({ "room": room_json(&outcome.room), "layoutApplied": false })),
                ),
                None => ok(&req.id, room_json(&outcome.room)),
            },
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

fn handle_rooms_disable(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    match structure::disable_room(&tx, id) {
        Ok(room) => match tx.commit() {
            Ok(()) => ok(&req.id, room_json(&room)),
            Err(e) => err(&req.id, "internal_error", e.to_string(), None),
        },
        Err(e) => {
            let _ = tx.rollback();
            domain_err(&req.id, &e)
        }
    }
}

fn handle_rooms_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    match structure::delete_room(&tx, id) {
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

fn handle_room_layout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(id) = i64_param(&req.params, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    let room = match structure::get_room(conn, id) {
        Ok(r) => r,
        Err(e) => return domain_err(&req.id, &e),
    };
    let seats = match structure::room_seats(conn, id) {
        Ok(s) => s,
        Err(e) => return domain_err(&req.id, &e),
    };
    let seats_json: Vec<serde_json::Value> = seats
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "roomId": s.room_id,
                "rowLabel": s.row_label,
                "benchNumber": s.bench_number,
                "seatNumber": s.seat_number,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "room": room_json(&room),
            "seats": seats_json,
            "seatCount": seats.len(),
        }),
    )
}

fn handle_rooms_bulk_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(block_id) = i64_param(&req.params, "blockId") else {
        return err(&req.id, "bad_params", "missing blockId", None);
    };
    let Some(floor_id) = i64_param(&req.params, "floorId") else {
        return err(&req.id, "bad_params", "missing floorId", None);
    };
    let Some(items) = req.params.get("rooms").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing rooms array", None);
    };

    let mut specs = Vec::with_capacity(items.len());
    for item in items {
        let Some(room_code) = item.get("roomCode").and_then(|v| v.as_str()) else {
            return err(&req.id, "bad_params", "each room needs a roomCode", None);
        };
        let Some(capacity) = item.get("capacity").and_then(|v| v.as_i64()) else {
            return err(&req.id, "bad_params", "each room needs a capacity", None);
        };
        specs.push(BulkRoomSpec {
            room_code: room_code.to_string(),
            capacity,
        });
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "internal_error", e.to_string(), None),
    };
    match structure::bulk_create_rooms(&tx, block_id, floor_id, &specs) {
        Ok(rooms) => match tx.commit() {
            Ok(()) => ok(
                &req.id,
                json!({
                    "created": rooms.len(),
                    "rooms": rooms.iter().map(room_json).collect::<Vec<_>>(),
                }),
            ),
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
        "rooms.list" => Some(handle_rooms_list(state, req)),
        "rooms.create" => Some(handle_rooms_create(state, req)),
        "rooms.update" => Some(handle_rooms_update(state, req)),
        "rooms.disable" => Some(handle_rooms_disable(state, req)),
        "rooms.delete" => Some(handle_rooms_delete(state, req)),
        "rooms.bulkCreate" => Some(handle_rooms_bulk_create(state, req)),
        "room.layout" => Some(handle_room_layout(state, req)),
        _ => None,
    }
}
