use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::error::StructureError;
use crate::grid::{self, Layout};

type Result<T> = std::result::Result<T, StructureError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Active" => Ok(Self::Active),
            "Inactive" => Ok(Self::Inactive),
            other => Err(StructureError::validation(format!(
                "status must be Active or Inactive, got '{other}'"
            ))),
        }
    }

    fn from_db(s: &str) -> Self {
        // Schema defaults and the parse above keep the column well-formed;
        // treat anything unexpected as Inactive rather than failing reads.
        if s == "Active" {
            Self::Active
        } else {
            Self::Inactive
        }
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub id: i64,
    pub name: String,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct Floor {
    pub id: i64,
    pub block_id: i64,
    pub floor_number: i64,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: i64,
    pub block_id: i64,
    pub floor_id: i64,
    pub room_code: String,
    pub capacity: i64,
    pub exam_usable: bool,
    pub status: Status,
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub struct Seat {
    pub id: i64,
    pub room_id: i64,
    pub row_label: String,
    pub bench_number: i64,
    pub seat_number: i64,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub block_id: i64,
    pub floor_id: i64,
    pub room_code: String,
    pub capacity: i64,
    pub exam_usable: bool,
    pub layout: Layout,
}

/// Partial update for a room. Layout is handled separately from the other
/// fields: a layout change can be rejected while the rest still applies.
#[derive(Debug, Clone, Default)]
pub struct RoomPatch {
    pub room_code: Option<String>,
    pub capacity: Option<i64>,
    pub exam_usable: Option<bool>,
    pub status: Option<Status>,
    pub layout: Option<Layout>,
}

#[derive(Debug, Clone)]
pub struct RoomUpdate {
    pub room: Room,
    /// Set when the requested layout change was rejected because seats in
    /// this room are allocated to a future-dated exam. Non-layout fields
    /// have still been applied.
    pub layout_rejected: Option<String>,
}

pub fn get_block(conn: &Connection, id: i64) -> Result<Block> {
    conn.query_row(
        "SELECT id, name, status FROM blocks WHERE id = ?",
        [id],
        |r| {
            Ok(Block {
                id: r.get(0)?,
                name: r.get(1)?,
                status: Status::from_db(&r.get::<_, String>(2)?),
            })
        },
    )
    .optional()?
    .ok_or_else(|| StructureError::not_found(format!("block {id} not found")))
}

pub fn get_floor(conn: &Connection, id: i64) -> Result<Floor> {
    conn.query_row(
        "SELECT id, block_id, floor_number, status FROM floors WHERE id = ?",
        [id],
        |r| {
            Ok(Floor {
                id: r.get(0)?,
                block_id: r.get(1)?,
                floor_number: r.get(2)?,
                status: Status::from_db(&r.get::<_, String>(3)?),
            })
        },
    )
    .optional()?
    .ok_or_else(|| StructureError::not_found(format!("floor {id} not found")))
}

fn room_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: r.get(0)?,
        block_id: r.get(1)?,
        floor_id: r.get(2)?,
        room_code: r.get(3)?,
        capacity: r.get(4)?,
        exam_usable: r.get::<_, i64>(5)? != 0,
        status: Status::from_db(&r.get::<_, String>(6)?),
        layout: Layout::new(
            r.get::<_, u32>(7)?,
            r.get::<_, u32>(8)?,
            r.get::<_, u32>(9)?,
        ),
    })
}

const ROOM_COLS: &str = "id, block_id, floor_id, room_code, capacity, exam_usable, status, \
     total_rows, benches_per_row, seats_per_bench";

pub fn get_room(conn: &Connection, id: i64) -> Result<Room> {
    conn.query_row(
        &format!("SELECT {ROOM_COLS} FROM rooms WHERE id = ?"),
        [id],
        room_from_row,
    )
    .optional()?
    .ok_or_else(|| StructureError::not_found(format!("room {id} not found")))
}

pub fn create_block(tx: &Transaction<'_>, name: &str, status: Status) -> Result<Block> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StructureError::validation("block name must not be empty"));
    }
    let taken: Option<i64> = tx
        .query_row("SELECT id FROM blocks WHERE name = ?", [name], |r| r.get(0))
        .optional()?;
    if taken.is_some() {
        return Err(StructureError::validation(format!(
            "block name '{name}' already exists"
        )));
    }
    tx.execute(
        "INSERT INTO blocks(name, status) VALUES(?, ?)",
        (name, status.as_str()),
    )?;
    Ok(Block {
        id: tx.last_insert_rowid(),
        name: name.to_string(),
        status,
    })
}

pub fn update_block(
    tx: &Transaction<'_>,
    id: i64,
    name: Option<&str>,
    status: Option<Status>,
) -> Result<Block> {
    let mut block = get_block(tx, id)?;

    if let Some(name) = name {
        let name = name.trim();
        if name.is_empty() {
            return Err(StructureError::validation("block name must not be empty"));
        }
        if name != block.name {
            let taken: Option<i64> = tx
                .query_row(
                    "SELECT id FROM blocks WHERE name = ? AND id != ?",
                    (name, id),
                    |r| r.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(StructureError::validation(format!(
                    "block name '{name}' already exists"
                )));
            }
            block.name = name.to_string();
        }
    }
    if let Some(status) = status {
        block.status = status;
    }

    tx.execute(
        "UPDATE blocks SET name = ?, status = ? WHERE id = ?",
        (&block.name, block.status.as_str(), id),
    )?;
    Ok(block)
}

pub fn delete_block(tx: &Transaction<'_>, id: i64) -> Result<()> {
    get_block(tx, id)?;
    let floors: i64 = tx.query_row(
        "SELECT COUNT(*) FROM floors WHERE block_id = ?",
        [id],
        |r| r.get(0),
    )?;
    if floors > 0 {
        return Err(StructureError::conflict(
            "block has existing floors and cannot be deleted",
        ));
    }
    tx.execute("DELETE FROM blocks WHERE id = ?", [id])?;
    Ok(())
}

pub fn create_floor(
    tx: &Transaction<'_>,
    block_id: i64,
    floor_number: i64,
    status: Status,
) -> Result<Floor> {
    get_block(tx, block_id)?;
    let taken: Option<i64> = tx
        .query_row(
            "SELECT id FROM floors WHERE block_id = ? AND floor_number = ?",
            (block_id, floor_number),
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(StructureError::validation(format!(
            "floor {floor_number} already exists in this block"
        )));
    }
    tx.execute(
        "INSERT INTO floors(block_id, floor_number, status) VALUES(?, ?, ?)",
        (block_id, floor_number, status.as_str()),
    )?;
    Ok(Floor {
        id: tx.last_insert_rowid(),
        block_id,
        floor_number,
        status,
    })
}

pub fn update_floor(
    tx: &Transaction<'_>,
    id: i64,
    floor_number: Option<i64>,
    status: Option<Status>,
) -> Result<Floor> {
    let mut floor = get_floor(tx, id)?;

    if let Some(number) = floor_number {
        if number != floor.floor_number {
            let taken: Option<i64> = tx
                .query_row(
                    "SELECT id FROM floors WHERE block_id = ? AND floor_number = ? AND id != ?",
                    (floor.block_id, number, id),
                    |r| r.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(StructureError::validation(format!(
                    "floor {number} already exists in this block"
                )));
            }
            floor.floor_number = number;
        }
    }

    if let Some(status) = status {
        if floor.status == Status::Active && status == Status::Inactive {
            let active_rooms: i64 = tx.query_row(
                "SELECT COUNT(*) FROM rooms WHERE floor_id = ? AND status = 'Active'",
                [id],
                |r| r.get(0),
            )?;
            if active_rooms > 0 {
                return Err(StructureError::conflict(
                    "floor has active rooms and cannot be deactivated",
                ));
            }
        }
        floor.status = status;
    }

    tx.execute(
        "UPDATE floors SET floor_number = ?, status = ? WHERE id = ?",
        (floor.floor_number, floor.status.as_str(), id),
    )?;
    Ok(floor)
}

pub fn delete_floor(tx: &Transaction<'_>, id: i64) -> Result<()> {
    get_floor(tx, id)?;
    let rooms: i64 = tx.query_row(
        "SELECT COUNT(*) FROM rooms WHERE floor_id = ?",
        [id],
        |r| r.get(0),
    )?;
    if rooms > 0 {
        return Err(StructureError::conflict(
            "floor has existing rooms and cannot be deleted",
        ));
    }
    tx.execute("DELETE FROM floors WHERE id = ?", [id])?;
    Ok(())
}

fn check_layout_size(layout: Layout) -> Result<()> {
    let count = layout.seat_count();
    if count > grid::MAX_SEATS {
        return Err(StructureError::validation(format!(
            "layout would generate {} seats; the limit is {}",
            count,
            grid::MAX_SEATS
        )));
    }
    Ok(())
}

fn check_room_code_free(
    tx: &Transaction<'_>,
    floor_id: i64,
    room_code: &str,
    exclude_room: Option<i64>,
) -> Result<()> {
    let taken: Option<i64> = tx
        .query_row(
            "SELECT id FROM rooms WHERE floor_id = ? AND room_code = ? AND id != ?",
            (floor_id, room_code, exclude_room.unwrap_or(-1)),
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(StructureError::validation(format!(
            "room code '{room_code}' already exists on this floor"
        )));
    }
    Ok(())
}

pub fn create_room(tx: &Transaction<'_>, spec: &NewRoom) -> Result<Room> {
    let floor = get_floor(tx, spec.floor_id)?;
    if floor.block_id != spec.block_id {
        return Err(StructureError::validation(format!(
            "floor {} does not belong to block {}",
            spec.floor_id, spec.block_id
        )));
    }
    let room_code = spec.room_code.trim();
    if room_code.is_empty() {
        return Err(StructureError::validation("room code must not be empty"));
    }
    if spec.capacity <= 0 {
        return Err(StructureError::validation(
            "capacity must be a positive integer",
        ));
    }
    check_layout_size(spec.layout)?;
    check_room_code_free(tx, spec.floor_id, room_code, None)?;

    tx.execute(
        "INSERT INTO rooms(block_id, floor_id, room_code, capacity, exam_usable, status,
                           total_rows, benches_per_row, seats_per_bench)
         VALUES(?, ?, ?, ?, ?, 'Active', ?, ?, ?)",
        (
            spec.block_id,
            spec.floor_id,
            room_code,
            spec.capacity,
            spec.exam_usable as i64,
            spec.layout.total_rows,
            spec.layout.benches_per_row,
            spec.layout.seats_per_bench,
        ),
    )?;
    let id = tx.last_insert_rowid();
    if !spec.layout.is_empty() {
        regenerate_seats(tx, id, spec.layout)?;
    }

    Ok(Room {
        id,
        block_id: spec.block_id,
        floor_id: spec.floor_id,
        room_code: room_code.to_string(),
        capacity: spec.capacity,
        exam_usable: spec.exam_usable,
        status: Status::Active,
        layout: spec.layout,
    })
}

/// Apply a partial room update.
///
/// Non-layout fields always apply. A layout change is refused while any
/// seat of the room is allocated to an exam dated `today` or later; the
/// refusal is reported through `layout_rejected` so the caller can commit
/// the rest and still surface a conflict.
pub fn update_room(
    tx: &Transaction<'_>,
    id: i64,
    patch: &RoomPatch,
    today: NaiveDate,
) -> Result<RoomUpdate> {
    let mut room = get_room(tx, id)?;

    if let Some(code) = &patch.room_code {
        let code = code.trim();
        if code.is_empty() {
            return Err(StructureError::validation("room code must not be empty"));
        }
        if code != room.room_code {
            check_room_code_free(tx, room.floor_id, code, Some(id))?;
            room.room_code = code.to_string();
        }
    }
    if let Some(capacity) = patch.capacity {
        if capacity <= 0 {
            return Err(StructureError::validation(
                "capacity must be a positive integer",
            ));
        }
        room.capacity = capacity;
    }
    if let Some(exam_usable) = patch.exam_usable {
        room.exam_usable = exam_usable;
    }
    if let Some(status) = patch.status {
        room.status = status;
    }

    tx.execute(
        "UPDATE rooms SET room_code = ?, capacity = ?, exam_usable = ?, status = ? WHERE id = ?",
        (
            &room.room_code,
            room.capacity,
            room.exam_usable as i64,
            room.status.as_str(),
            id,
        ),
    )?;

    let mut layout_rejected = None;
    if let Some(layout) = patch.layout {
        if layout != room.layout {
            check_layout_size(layout)?;
            if has_future_allocations(tx, id, today)? {
                layout_rejected = Some("room is booked for future exams".to_string());
            } else {
                tx.execute(
                    "UPDATE rooms SET total_rows = ?, benches_per_row = ?, seats_per_bench = ?
                     WHERE id = ?",
                    (
                        layout.total_rows,
                        layout.benches_per_row,
                        layout.seats_per_bench,
                        id,
                    ),
                )?;
                regenerate_seats(tx, id, layout)?;
                room.layout = layout;
            }
        }
    }

    Ok(RoomUpdate {
        room,
        layout_rejected,
    })
}

pub fn disable_room(tx: &Transaction<'_>, id: i64) -> Result<Room> {
    let mut room = get_room(tx, id)?;
    tx.execute("UPDATE rooms SET status = 'Inactive' WHERE id = ?", [id])?;
    room.status = Status::Inactive;
    Ok(room)
}

pub fn delete_room(tx: &Transaction<'_>, id: i64) -> Result<()> {
    get_room(tx, id)?;
    let has_history: i64 = tx.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM seat_allocations sa
            JOIN seats s ON s.id = sa.seat_id
            WHERE s.room_id = ?
        )",
        [id],
        |r| r.get(0),
    )?;
    if has_history != 0 {
        return Err(StructureError::conflict(
            "room has examination history and cannot be deleted",
        ));
    }
    // No ON DELETE CASCADE; delete in dependency order.
    tx.execute("DELETE FROM seats WHERE room_id = ?", [id])?;
    tx.execute("DELETE FROM rooms WHERE id = ?", [id])?;
    Ok(())
}

/// Drop and re-insert the seat grid for a room inside the current
/// transaction. Allocations tied to the dropped seats go with them; the
/// future-exam check in `update_room` has already ruled out upcoming ones.
pub fn regenerate_seats(tx: &Transaction<'_>, room_id: i64, layout: Layout) -> Result<()> {
    tx.execute(
        "DELETE FROM seat_allocations
         WHERE seat_id IN (SELECT id FROM seats WHERE room_id = ?)",
        [room_id],
    )?;
    tx.execute("DELETE FROM seats WHERE room_id = ?", [room_id])?;

    if layout.is_empty() {
        return Ok(());
    }
    let mut insert = tx.prepare(
        "INSERT INTO seats(room_id, row_label, bench_number, seat_number) VALUES(?, ?, ?, ?)",
    )?;
    for pos in grid::generate(layout) {
        insert.execute((room_id, &pos.row_label, pos.bench_number, pos.seat_number))?;
    }
    Ok(())
}

pub fn has_future_allocations(conn: &Connection, room_id: i64, today: NaiveDate) -> Result<bool> {
    let found: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM seat_allocations sa
            JOIN seats s ON s.id = sa.seat_id
            JOIN exams e ON e.id = sa.exam_id
            WHERE s.room_id = ? AND e.exam_date >= ?
        )",
        (room_id, today.format("%Y-%m-%d").to_string()),
        |r| r.get(0),
    )?;
    Ok(found != 0)
}

/// Seats for a room ordered the way a hall chart reads: row label (short
/// labels before long, so Z sorts before AA), then bench, then seat.
pub fn room_seats(conn: &Connection, room_id: i64) -> Result<Vec<Seat>> {
    let mut stmt = conn.prepare(
        "SELECT id, room_id, row_label, bench_number, seat_number
         FROM seats WHERE room_id = ?
         ORDER BY length(row_label), row_label, bench_number, seat_number",
    )?;
    let seats = stmt
        .query_map([room_id], |r| {
            Ok(Seat {
                id: r.get(0)?,
                room_id: r.get(1)?,
                row_label: r.get(2)?,
                bench_number: r.get(3)?,
                seat_number: r.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(seats)
}

#[derive(Debug, Clone)]
pub struct BulkRoomSpec {
    pub room_code: String,
    pub capacity: i64,
}

/// Create several rooms on one floor as an atomic batch: the first failing
/// room aborts the whole batch (the caller rolls the transaction back).
pub fn bulk_create_rooms(
    tx: &Transaction<'_>,
    block_id: i64,
    floor_id: i64,
    rooms: &[BulkRoomSpec],
) -> Result<Vec<Room>> {
    if rooms.is_empty() {
        return Err(StructureError::validation("rooms list must not be empty"));
    }
    let mut created = Vec::with_capacity(rooms.len());
    for spec in rooms {
        created.push(create_room(
            tx,
            &NewRoom {
                block_id,
                floor_id,
                room_code: spec.room_code.clone(),
                capacity: spec.capacity,
                exam_usable: true,
                layout: Layout::default(),
            },
        )?);
    }
    Ok(created)
}
