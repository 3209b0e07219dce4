//! Seat grid generation. A room's layout is three dimensions (rows, benches
//! per row, seats per bench); the grid is fully derived from them, so
//! regenerating for the same layout always yields the same positions.

/// Hard cap on the number of seats one room may generate. Caller input is
/// validated against this before any grid is materialized.
pub const MAX_SEATS: u64 = 10_000;

/// Room layout dimensions. A layout with any zero dimension is empty and
/// produces no seats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    pub total_rows: u32,
    pub benches_per_row: u32,
    pub seats_per_bench: u32,
}

impl Layout {
    pub fn new(total_rows: u32, benches_per_row: u32, seats_per_bench: u32) -> Self {
        Layout {
            total_rows,
            benches_per_row,
            seats_per_bench,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows == 0 || self.benches_per_row == 0 || self.seats_per_bench == 0
    }

    /// Widened so the product cannot overflow for any `u32` triple.
    pub fn seat_count(&self) -> u64 {
        self.total_rows as u64 * self.benches_per_row as u64 * self.seats_per_bench as u64
    }
}

/// One position in a generated grid, before it gets a database id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatPos {
    pub row_label: String,
    pub bench_number: u32,
    pub seat_number: u32,
}

/// Spreadsheet-style label for a 1-based row index: A..Z, then AA, AB, ...
pub fn row_label(row: u32) -> String {
    let mut n = row;
    let mut label = String::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        label.insert(0, (b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    label
}

/// Generate every seat position for the layout, ordered row-major: row,
/// then bench, then seat, all 1-based.
pub fn generate(layout: Layout) -> Vec<SeatPos> {
    if layout.is_empty() {
        return Vec::new();
    }
    let mut seats = Vec::with_capacity(layout.seat_count() as usize);
    for row in 1..=layout.total_rows {
        let label = row_label(row);
        for bench in 1..=layout.benches_per_row {
            for seat in 1..=layout.seats_per_bench {
                seats.push(SeatPos {
                    row_label: label.clone(),
                    bench_number: bench,
                    seat_number: seat,
                });
            }
        }
    }
    seats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_labels_roll_over_like_spreadsheet_columns() {
        assert_eq!(row_label(1), "A");
        assert_eq!(row_label(26), "Z");
        assert_eq!(row_label(27), "AA");
        assert_eq!(row_label(28), "AB");
        assert_eq!(row_label(52), "AZ");
        assert_eq!(row_label(53), "BA");
        assert_eq!(row_label(702), "ZZ");
        assert_eq!(row_label(703), "AAA");
    }

    #[test]
    fn generate_covers_the_full_grid_in_order() {
        let seats = generate(Layout::new(5, 4, 2));
        assert_eq!(seats.len(), 40);
        assert_eq!(
            seats[0],
            SeatPos {
                row_label: "A".to_string(),
                bench_number: 1,
                seat_number: 1,
            }
        );
        assert_eq!(
            seats[39],
            SeatPos {
                row_label: "E".to_string(),
                bench_number: 4,
                seat_number: 2,
            }
        );
        // Row-major order: all of row A comes before any of row B.
        let last_a = seats.iter().rposition(|s| s.row_label == "A").unwrap();
        let first_b = seats.iter().position(|s| s.row_label == "B").unwrap();
        assert!(last_a < first_b);
    }

    #[test]
    fn zero_dimension_means_no_seats() {
        assert!(generate(Layout::new(0, 4, 2)).is_empty());
        assert!(generate(Layout::new(5, 0, 2)).is_empty());
        assert!(generate(Layout::new(5, 4, 0)).is_empty());
        assert!(Layout::default().is_empty());
    }

    #[test]
    #[allow(arithmetic_overflow)]
    fn seat_count_survives_oversized_dimensions() {
        let layout = Layout::new(66_000, 66_000, 2);
        assert_eq!(layout.seat_count(), 8_712_000_000);
        assert!(layout.seat_count() > MAX_SEATS);
        assert_eq!(
            Layout::new(u32::MAX, u32::MAX, u32::MAX).seat_count(),
            u32::MAX as u64 * u32::MAX as u64 * u32::MAX as u64
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let layout = Layout::new(3, 2, 2);
        assert_eq!(generate(layout), generate(layout));
    }
}
