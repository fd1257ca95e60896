//! Price arithmetic for a booking.
//!
//! Every seat of a showtime costs the showtime's base ticket price; snacks
//! add their unit price times quantity.

use crate::types::{Money, SeatCode, SnackSelection};
use serde::{Deserialize, Serialize};

/// Total due: `seats × ticket_price + Σ snack.price × snack.quantity`
#[must_use]
pub fn calculate_total_amount(
    seats: &[SeatCode],
    ticket_price: Money,
    snacks: &[SnackSelection],
) -> Money {
    let seat_count = u32::try_from(seats.len()).unwrap_or(u32::MAX);
    ticket_price.multiply(seat_count) + snacks_total(snacks)
}

/// Sum of all snack subtotals
#[must_use]
pub fn snacks_total(snacks: &[SnackSelection]) -> Money {
    snacks.iter().map(SnackSelection::subtotal).sum()
}

/// A seat with the price it was sold at
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedSeat {
    /// Seat code
    pub code: SeatCode,
    /// Price for this seat
    pub price: Money,
}

/// Attach the per-seat price to each selected seat
#[must_use]
pub fn priced_seats(seats: &[SeatCode], ticket_price: Money) -> Vec<PricedSeat> {
    seats
        .iter()
        .map(|code| PricedSeat {
            code: code.clone(),
            price: ticket_price,
        })
        .collect()
}

/// What a payment line is for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemKind {
    /// A seat ticket
    Ticket,
    /// A concession item
    Snack,
}

/// One line of a payment request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Ticket or snack
    pub kind: LineItemKind,
    /// Seat code or snack name
    pub description: String,
    /// Units
    pub quantity: u32,
    /// Price per unit
    pub unit_price: Money,
}

impl LineItem {
    /// Unit price times quantity
    #[must_use]
    pub const fn amount(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Payment lines: one ticket per seat, then one line per snack
#[must_use]
pub fn line_items(
    seats: &[SeatCode],
    ticket_price: Money,
    snacks: &[SnackSelection],
) -> Vec<LineItem> {
    let tickets = priced_seats(seats, ticket_price)
        .into_iter()
        .map(|seat| LineItem {
            kind: LineItemKind::Ticket,
            description: seat.code.to_string(),
            quantity: 1,
            unit_price: seat.price,
        });
    let snacks = snacks.iter().map(|snack| LineItem {
        kind: LineItemKind::Snack,
        description: snack.name.clone(),
        quantity: snack.quantity,
        unit_price: snack.price,
    });
    tickets.chain(snacks).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SnackId;
    use proptest::prelude::*;

    fn seats(codes: &[&str]) -> Vec<SeatCode> {
        codes.iter().filter_map(|c| SeatCode::parse(c).ok()).collect()
    }

    fn combo(quantity: u32, price: u64) -> SnackSelection {
        SnackSelection {
            id: SnackId::new(1),
            name: "Popcorn combo".to_string(),
            quantity,
            price: Money::new(price),
        }
    }

    #[test]
    fn three_seats_and_two_combos() {
        let total = calculate_total_amount(
            &seats(&["A1", "A2", "B5"]),
            Money::new(90_000),
            &[combo(2, 60_000)],
        );
        assert_eq!(total, Money::new(390_000));
    }

    #[test]
    fn empty_booking_costs_nothing() {
        assert_eq!(calculate_total_amount(&[], Money::new(90_000), &[]), Money::ZERO);
    }

    #[test]
    fn line_items_sum_to_total() {
        let chosen = seats(&["A1", "A2"]);
        let snacks = [combo(2, 60_000), combo(1, 35_000)];
        let items = line_items(&chosen, Money::new(90_000), &snacks);
        assert_eq!(items.len(), 4);
        assert_eq!(items[0].kind, LineItemKind::Ticket);
        assert_eq!(items[0].description, "A1");
        assert_eq!(items[3].kind, LineItemKind::Snack);
        let sum: Money = items.iter().map(LineItem::amount).sum();
        assert_eq!(sum, calculate_total_amount(&chosen, Money::new(90_000), &snacks));
    }

    #[test]
    fn priced_seats_carry_ticket_price() {
        let priced = priced_seats(&seats(&["C3"]), Money::new(75_000));
        assert_eq!(priced.len(), 1);
        assert_eq!(priced[0].price, Money::new(75_000));
    }

    proptest! {
        #[test]
        fn total_matches_formula(
            seat_count in 0usize..12,
            ticket_price in 0u64..500_000,
            snack_lines in proptest::collection::vec((0u32..10, 0u64..200_000), 0..6),
        ) {
            let chosen: Vec<SeatCode> = (1..=seat_count)
                .filter_map(|n| SeatCode::parse(&format!("A{n}")).ok())
                .collect();
            let snacks: Vec<SnackSelection> = snack_lines
                .iter()
                .map(|&(quantity, price)| combo(quantity, price))
                .collect();

            let expected = seat_count as u64 * ticket_price
                + snack_lines.iter().map(|&(q, p)| u64::from(q) * p).sum::<u64>();

            prop_assert_eq!(
                calculate_total_amount(&chosen, Money::new(ticket_price), &snacks),
                Money::new(expected)
            );
        }
    }
}
