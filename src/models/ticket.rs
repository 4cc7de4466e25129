use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::hall::TheatreHall;
use super::performance::PerformanceSummary;
use crate::error::FieldErrors;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub performance_id: i64,
    pub order_id: i64,
    pub row: i32,
    pub seat: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Validate)]
pub struct NewTicket {
    pub row: i32,
    pub seat: i32,
    #[validate(range(min = 1, message = "performance must be a valid id"))]
    pub performance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetail {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub performance: PerformanceSummary,
}

/// Checks `row` against `hall.rows` then `seat` against `hall.seats_in_row`.
/// Both ranges start at 1 and are inclusive. Only the first violation is reported.
pub fn validate_ticket(row: i32, seat: i32, hall: &TheatreHall) -> Result<(), FieldErrors> {
    let checks = [
        (row, "row", "rows", hall.rows),
        (seat, "seat", "seats_in_row", hall.seats_in_row),
    ];

    for (value, field, hall_attr, max) in checks {
        if !(1..=max).contains(&value) {
            return Err(FieldErrors::single(
                field,
                format!("{field} number must be in available range: (1, {hall_attr}): (1, {max})"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hall(rows: i32, seats_in_row: i32) -> TheatreHall {
        TheatreHall { id: 1, name: "Green".into(), rows, seats_in_row }
    }

    #[test]
    fn corners_are_inside() {
        let h = hall(25, 30);
        assert!(validate_ticket(1, 1, &h).is_ok());
        assert!(validate_ticket(25, 30, &h).is_ok());
    }

    #[test]
    fn row_error_message_names_range() {
        let errors = validate_ticket(26, 1, &hall(25, 30)).unwrap_err();
        assert_eq!(
            errors.get("row"),
            Some(&["row number must be in available range: (1, rows): (1, 25)".to_string()][..])
        );
    }

    #[test]
    fn seat_checked_after_row() {
        let errors = validate_ticket(0, 0, &hall(5, 5)).unwrap_err();
        assert!(errors.get("row").is_some());
        assert!(errors.get("seat").is_none());

        let errors = validate_ticket(3, 6, &hall(5, 5)).unwrap_err();
        assert_eq!(
            errors.get("seat"),
            Some(&["seat number must be in available range: (1, seats_in_row): (1, 5)".to_string()][..])
        );
    }

    proptest! {
        #[test]
        fn accepted_iff_inside_hall(rows in 1i32..60, seats in 1i32..60, row in -5i32..70, seat in -5i32..70) {
            let inside = (1..=rows).contains(&row) && (1..=seats).contains(&seat);
            prop_assert_eq!(validate_ticket(row, seat, &hall(rows, seats)).is_ok(), inside);
        }
    }
}
