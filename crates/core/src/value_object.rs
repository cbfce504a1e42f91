//! Value object trait and the scalar quantities the inventory works in.

/// Units of stock. Signed so that malformed requests (zero/negative) can be
/// represented and rejected by the domain instead of at decode time.
pub type Quantity = i64;

/// Unit price in the smallest currency unit (e.g. cents). Single currency.
pub type UnitPrice = i64;

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two stock
/// snapshots with the same name, quantity and description are the same
/// snapshot, regardless of where they came from.
///
/// The trait requires:
/// - **Clone**: value objects are cheap to copy
/// - **PartialEq**: compared by their attribute values
/// - **Debug**: helpful for logging and tests
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
