use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_seatsyncd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn seatsyncd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(v: &serde_json::Value) -> &str {
    v.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
}

fn result_i64(v: &serde_json::Value, key: &str) -> i64 {
    v.get("result")
        .and_then(|r| r.get(key))
        .and_then(|x| x.as_i64())
        .unwrap_or_else(|| panic!("missing result.{key} in {v}"))
}

fn seats_of(layout: &serde_json::Value) -> Vec<(String, i64, i64)> {
    layout
        .get("result")
        .and_then(|r| r.get("seats"))
        .and_then(|s| s.as_array())
        .expect("seats array")
        .iter()
        .map(|s| {
            (
                s.get("rowLabel").and_then(|v| v.as_str()).unwrap().to_string(),
                s.get("benchNumber").and_then(|v| v.as_i64()).unwrap(),
                s.get("seatNumber").and_then(|v| v.as_i64()).unwrap(),
            )
        })
        .collect()
}

fn setup(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) -> (i64, i64) {
    let _ = request(
        stdin,
        reader,
        "s1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let block = request(
        stdin,
        reader,
        "s2",
        "blocks.create",
        json!({ "name": "Science" }),
    );
    let block_id = result_i64(&block, "id");
    let floor = request(
        stdin,
        reader,
        "s3",
        "floors.create",
        json!({ "blockId": block_id, "floorNumber": 1 }),
    );
    (block_id, result_i64(&floor, "id"))
}

#[test]
fn layout_triple_generates_the_exact_grid() {
    let workspace = temp_dir("seatsync-grid");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (block_id, floor_id) = setup(&mut stdin, &mut reader, &workspace);

    // Scenario A: 5 rows x 4 benches x 2 seats = 40 seats, rows A-E.
    let room = request(
        &mut stdin,
        &mut reader,
        "1",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": floor_id,
            "roomCode": "LH-101",
            "capacity": 60,
            "totalRows": 5,
            "benchesPerRow": 4,
            "seatsPerBench": 2
        }),
    );
    let room_id = result_i64(&room, "id");

    let layout = request(
        &mut stdin,
        &mut reader,
        "2",
        "room.layout",
        json!({ "id": room_id }),
    );
    assert_eq!(result_i64(&layout, "seatCount"), 40);
    let seats = seats_of(&layout);
    assert_eq!(seats.len(), 40);

    let rows: std::collections::BTreeSet<&str> =
        seats.iter().map(|(r, _, _)| r.as_str()).collect();
    assert_eq!(
        rows.into_iter().collect::<Vec<_>>(),
        vec!["A", "B", "C", "D", "E"]
    );
    assert!(seats.iter().all(|(_, b, _)| (1..=4).contains(b)));
    assert!(seats.iter().all(|(_, _, s)| (1..=2).contains(s)));
    assert_eq!(seats[0], ("A".to_string(), 1, 1));
    assert_eq!(seats[39], ("E".to_string(), 4, 2));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn reapplying_the_same_layout_keeps_the_same_seat_set() {
    let workspace = temp_dir("seatsync-grid-idem");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (block_id, floor_id) = setup(&mut stdin, &mut reader, &workspace);

    let room = request(
        &mut stdin,
        &mut reader,
        "1",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": floor_id,
            "roomCode": "LH-102",
            "capacity": 30,
            "totalRows": 3,
            "benchesPerRow": 3,
            "seatsPerBench": 2
        }),
    );
    let room_id = result_i64(&room, "id");

    let before = request(
        &mut stdin,
        &mut reader,
        "2",
        "room.layout",
        json!({ "id": room_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "rooms.update",
        json!({
            "id": room_id,
            "totalRows": 3,
            "benchesPerRow": 3,
            "seatsPerBench": 2
        }),
    );
    let after = request(
        &mut stdin,
        &mut reader,
        "4",
        "room.layout",
        json!({ "id": room_id }),
    );
    // Seat ids may differ; the (row, bench, seat) tuples must not.
    assert_eq!(seats_of(&before), seats_of(&after));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn oversized_layout_is_a_validation_error() {
    let workspace = temp_dir("seatsync-grid-oversized");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (block_id, floor_id) = setup(&mut stdin, &mut reader, &workspace);

    let create = request(
        &mut stdin,
        &mut reader,
        "1",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": floor_id,
            "roomCode": "MEGA-1",
            "capacity": 60,
            "totalRows": 66000,
            "benchesPerRow": 66000,
            "seatsPerBench": 2
        }),
    );
    assert_eq!(error_code(&create), "validation_error");

    let room = request(
        &mut stdin,
        &mut reader,
        "2",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": floor_id,
            "roomCode": "LH-104",
            "capacity": 60,
            "totalRows": 5,
            "benchesPerRow": 4,
            "seatsPerBench": 2
        }),
    );
    let room_id = result_i64(&room, "id");
    let update = request(
        &mut stdin,
        &mut reader,
        "3",
        "rooms.update",
        json!({
            "id": room_id,
            "totalRows": 66000,
            "benchesPerRow": 66000,
            "seatsPerBench": 2
        }),
    );
    assert_eq!(error_code(&update), "validation_error");

    let layout = request(
        &mut stdin,
        &mut reader,
        "4",
        "room.layout",
        json!({ "id": room_id }),
    );
    assert_eq!(result_i64(&layout, "seatCount"), 40);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn rows_past_z_sort_after_single_letter_rows() {
    let workspace = temp_dir("seatsync-grid-widerows");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (block_id, floor_id) = setup(&mut stdin, &mut reader, &workspace);

    let room = request(
        &mut stdin,
        &mut reader,
        "1",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": floor_id,
            "roomCode": "HALL-1",
            "capacity": 30,
            "totalRows": 28,
            "benchesPerRow": 1,
            "seatsPerBench": 1
        }),
    );
    let layout = request(
        &mut stdin,
        &mut reader,
        "2",
        "room.layout",
        json!({ "id": result_i64(&room, "id") }),
    );
    let seats = seats_of(&layout);
    assert_eq!(seats.len(), 28);
    assert_eq!(seats[25].0, "Z");
    assert_eq!(seats[26].0, "AA");
    assert_eq!(seats[27].0, "AB");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn zero_dimension_clears_all_seats() {
    let workspace = temp_dir("seatsync-grid-zero");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (block_id, floor_id) = setup(&mut stdin, &mut reader, &workspace);

    let room = request(
        &mut stdin,
        &mut reader,
        "1",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": floor_id,
            "roomCode": "LH-103",
            "capacity": 30,
            "totalRows": 3,
            "benchesPerRow": 3,
            "seatsPerBench": 2
        }),
    );
    let room_id = result_i64(&room, "id");

    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "rooms.update",
        json!({
            "id": room_id,
            "totalRows": 0,
            "benchesPerRow": 3,
            "seatsPerBench": 2
        }),
    );
    let layout = request(
        &mut stdin,
        &mut reader,
        "3",
        "room.layout",
        json!({ "id": room_id }),
    );
    assert_eq!(result_i64(&layout, "seatCount"), 0);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn room_codes_are_scoped_to_their_floor() {
    let workspace = temp_dir("seatsync-room-codes");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (block_id, floor_id) = setup(&mut stdin, &mut reader, &workspace);

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": floor_id,
            "roomCode": "LH-201",
            "capacity": 40
        }),
    );
    let dup = request(
        &mut stdin,
        &mut reader,
        "2",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": floor_id,
            "roomCode": "LH-201",
            "capacity": 40
        }),
    );
    assert_eq!(error_code(&dup), "validation_error");

    // Same code on a different floor of the same block is allowed.
    let floor2 = request(
        &mut stdin,
        &mut reader,
        "3",
        "floors.create",
        json!({ "blockId": block_id, "floorNumber": 2 }),
    );
    let other = request(
        &mut stdin,
        &mut reader,
        "4",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": result_i64(&floor2, "id"),
            "roomCode": "LH-201",
            "capacity": 40
        }),
    );
    assert_eq!(other.get("ok").and_then(|v| v.as_bool()), Some(true));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn room_floor_must_belong_to_room_block() {
    let workspace = temp_dir("seatsync-containment");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (block_id, _floor_id) = setup(&mut stdin, &mut reader, &workspace);

    let other_block = request(
        &mut stdin,
        &mut reader,
        "1",
        "blocks.create",
        json!({ "name": "Arts" }),
    );
    let other_floor = request(
        &mut stdin,
        &mut reader,
        "2",
        "floors.create",
        json!({ "blockId": result_i64(&other_block, "id"), "floorNumber": 1 }),
    );

    // Science block id paired with an Arts floor id.
    let mismatched = request(
        &mut stdin,
        &mut reader,
        "3",
        "rooms.create",
        json!({
            "blockId": block_id,
            "floorId": result_i64(&other_floor, "id"),
            "roomCode": "X-1",
            "capacity": 10
        }),
    );
    assert_eq!(error_code(&mismatched), "validation_error");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
