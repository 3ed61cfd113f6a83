//! # Validation Module
//!
//! Input validation for order engine requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request shape (THIS MODULE)                                  │
//! │  ├── Quantities, line counts, ids, note lengths                        │
//! │  └── Runs before a unit of work is opened                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Business rules (status, pricing, promotion, ledger)          │
//! │  └── Runs against locked rows inside the unit of work                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0, quantity > 0)                                  │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_quantity, validate_uuid};
//!
//! validate_quantity(5).unwrap();
//! assert!(validate_uuid("order", "not-a-uuid").is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_NOTE_LENGTH, MAX_ORDER_LINES};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a tendered cash amount. Zero means "not supplied".
pub fn validate_cash_received(amount: Option<i64>) -> ValidationResult<()> {
    match amount {
        Some(value) if value < 0 => Err(ValidationError::OutOfRange {
            field: "cash_received".to_string(),
            min: 0,
            max: i64::MAX,
        }),
        _ => Ok(()),
    }
}

/// Validates and normalises a 1-based page request.
///
/// ## Returns
/// `(page, per_page)` with `per_page` clamped to `max_per_page`, and a
/// missing or zero `per_page` replaced by `default_per_page`.
pub fn validate_page(
    page: i64,
    per_page: Option<i64>,
    default_per_page: i64,
    max_per_page: i64,
) -> ValidationResult<(i64, i64)> {
    if page < 1 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }

    let per_page = match per_page {
        None | Some(0) => default_per_page,
        Some(n) if n < 0 => {
            return Err(ValidationError::MustBePositive {
                field: "per_page".to_string(),
            })
        }
        Some(n) => n,
    };

    Ok((page, per_page.min(max_per_page).max(1)))
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in an order request.
///
/// ## Rules
/// - At least one line
/// - Must not exceed MAX_ORDER_LINES (100)
pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines > MAX_ORDER_LINES {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_ORDER_LINES as i64,
        });
    }

    Ok(())
}

/// Rejects the first id that appears twice.
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_unique_ids;
///
/// assert!(validate_unique_ids("product_id", ["a", "b"]).is_ok());
/// assert!(validate_unique_ids("product_id", ["a", "a"]).is_err());
/// ```
pub fn validate_unique_ids<'a, I>(field: &str, ids: I) -> ValidationResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ValidationError::Duplicate {
                field: field.to_string(),
                value: id.to_string(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates an optional free-text note (cancellation reason, notes).
///
/// ## Returns
/// The trimmed note, or `None` when empty.
pub fn validate_note(field: &str, note: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if note.chars().count() > MAX_NOTE_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTE_LENGTH,
        });
    }

    Ok(Some(note.to_string()))
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Rules
/// - Must not be empty
/// - 36 characters with hyphens: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_uuid;
///
/// assert!(validate_uuid("order_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("order_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

/// Validates a non-empty reference id (product, option, promotion ids).
pub fn validate_reference(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
