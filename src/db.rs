use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "seatsync.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Create the structural tables. Idempotent; runs on every workspace open.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS blocks(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'Active'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS floors(
            id INTEGER PRIMARY KEY,
            block_id INTEGER NOT NULL,
            floor_number INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'Active',
            UNIQUE(block_id, floor_number),
            FOREIGN KEY(block_id) REFERENCES blocks(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_floors_block ON floors(block_id)",
        [],
    )?;

    // Room codes are unique per floor; the legacy global scope is gone.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rooms(
            id INTEGER PRIMARY KEY,
            block_id INTEGER NOT NULL,
            floor_id INTEGER NOT NULL,
            room_code TEXT NOT NULL,
            capacity INTEGER NOT NULL,
            exam_usable INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'Active',
            total_rows INTEGER NOT NULL DEFAULT 0,
            benches_per_row INTEGER NOT NULL DEFAULT 0,
            seats_per_bench INTEGER NOT NULL DEFAULT 0,
            UNIQUE(floor_id, room_code),
            FOREIGN KEY(block_id) REFERENCES blocks(id),
            FOREIGN KEY(floor_id) REFERENCES floors(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rooms_floor ON rooms(floor_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rooms_block ON rooms(block_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seats(
            id INTEGER PRIMARY KEY,
            room_id INTEGER NOT NULL,
            row_label TEXT NOT NULL,
            bench_number INTEGER NOT NULL,
            seat_number INTEGER NOT NULL,
            UNIQUE(room_id, row_label, bench_number, seat_number),
            FOREIGN KEY(room_id) REFERENCES rooms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_seats_room ON seats(room_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY,
            roll_no TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            email TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            exam_date TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seat_allocations(
            id INTEGER PRIMARY KEY,
            exam_id INTEGER NOT NULL,
            seat_id INTEGER NOT NULL,
            student_id INTEGER,
            UNIQUE(exam_id, seat_id),
            FOREIGN KEY(exam_id) REFERENCES exams(id),
            FOREIGN KEY(seat_id) REFERENCES seats(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_seat_allocations_seat ON seat_allocations(seat_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_seat_allocations_exam ON seat_allocations(exam_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_seat_allocations_student ON seat_allocations(student_id)",
        [],
    )?;

    Ok(())
}
