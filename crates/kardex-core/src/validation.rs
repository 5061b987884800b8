//! # Validation Module
//!
//! Pure business-rule checks for movements and products.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: validate_movement (THIS MODULE)                              │
//! │  ├── quantity > 0                                                      │
//! │  ├── date is a real YYYY-MM-DD calendar date                           │
//! │  ├── registered_by present after trimming                              │
//! │  └── inflow unit price >= 0                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: check_against_product (THIS MODULE)                          │
//! │  ├── product resolved through the catalog                              │
//! │  ├── resulting stock fits in an i64                                    │
//! │  └── outflow fits current stock (advisory, fail fast)                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Ledger commit (kardex-db)                                    │
//! │  ├── version-checked stock update (authoritative)                      │
//! │  └── CHECK (stock_current >= 0)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Layer 2 passing does not guarantee the commit succeeds: another movement
//! may land in between, in which case the ledger reports `InsufficientStock`.
//!
//! ## Usage
//! ```rust
//! use kardex_core::types::MovementRequest;
//! use kardex_core::validation::validate_movement;
//!
//! let request = MovementRequest::inflow("p-1", "2024-02-30", 5, None, "", "ana");
//! assert!(validate_movement(&request).is_err()); // no February 30th
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{MovementKind, MovementRequest, NewProduct, Product, ProductDetails, ValidatedMovement};
use crate::{DEFAULT_UNIT_OF_MEASURE, MAX_ACTOR_LENGTH, MOVEMENT_DATE_FORMAT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_CODE_LENGTH: usize = 50;
const MAX_NAME_LENGTH: usize = 200;
const MAX_UNIT_LENGTH: usize = 20;

// =============================================================================
// Movement Validators
// =============================================================================

/// Validates a movement quantity.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::InvalidQuantity { quantity });
    }

    Ok(())
}

/// Parses a movement date.
///
/// ## Rules
/// - Exactly `YYYY-MM-DD`, zero padded
/// - Must name a real calendar day (`2024-02-30` and `2024-13-40` fail)
///
/// ## Example
/// ```rust
/// use kardex_core::validation::parse_movement_date;
///
/// assert!(parse_movement_date("2024-02-29").is_ok());
/// assert!(parse_movement_date("2023-02-29").is_err());
/// assert!(parse_movement_date("2024-3-1").is_err());
/// ```
pub fn parse_movement_date(value: &str) -> ValidationResult<NaiveDate> {
    let trimmed = value.trim();
    let invalid = || ValidationError::InvalidDate {
        value: value.to_string(),
    };

    let date = NaiveDate::parse_from_str(trimmed, MOVEMENT_DATE_FORMAT).map_err(|_| invalid())?;

    // chrono accepts unpadded fields and signed years; require the canonical form
    if date.format(MOVEMENT_DATE_FORMAT).to_string() != trimmed {
        return Err(invalid());
    }

    Ok(date)
}

/// Validates the actor identity and returns it trimmed.
pub fn validate_actor(registered_by: &str) -> ValidationResult<String> {
    let actor = registered_by.trim();

    if actor.is_empty() {
        return Err(ValidationError::MissingActor);
    }

    if actor.chars().count() > MAX_ACTOR_LENGTH {
        return Err(ValidationError::ActorTooLong {
            max: MAX_ACTOR_LENGTH,
        });
    }

    Ok(actor.to_string())
}

/// Validates an optional inflow unit price. Zero is allowed.
pub fn validate_unit_price(unit_price_cents: Option<i64>) -> ValidationResult<()> {
    match unit_price_cents {
        Some(cents) if cents < 0 => Err(ValidationError::NegativeUnitPrice { cents }),
        _ => Ok(()),
    }
}

/// Runs every shape check on a movement request.
///
/// Checks run in a fixed order (quantity, date, actor, unit price) and the
/// first failure is reported. No product state is consulted here.
pub fn validate_movement(request: &MovementRequest) -> ValidationResult<ValidatedMovement> {
    validate_quantity(request.quantity)?;
    let movement_date = parse_movement_date(&request.date)?;
    let registered_by = validate_actor(&request.registered_by)?;

    if let MovementKind::Inflow { unit_price_cents } = request.kind {
        validate_unit_price(unit_price_cents)?;
    }

    Ok(ValidatedMovement {
        product_id: request.product_id.trim().to_string(),
        kind: request.kind,
        movement_date,
        quantity: request.quantity,
        notes: request.notes.trim().to_string(),
        registered_by,
    })
}

/// Checks a validated movement against the product it references.
///
/// ## Rules
/// - The product must have been resolved (`None` → `ProductNotFound`)
/// - The resulting stock must be representable (`QuantityTooLarge`)
/// - Outflows must not exceed `stock_current` as last read
///
/// The ledger commits only against the version it checked here, so the
/// overflow check is exact. The stock check is advisory: the ledger
/// re-asserts it at commit time against the latest version.
pub fn check_against_product<'a>(
    movement: &ValidatedMovement,
    product: Option<&'a Product>,
) -> CoreResult<&'a Product> {
    let product =
        product.ok_or_else(|| CoreError::ProductNotFound(movement.product_id.clone()))?;

    if product.stock_current.checked_add(movement.delta()).is_none() {
        return Err(ValidationError::QuantityTooLarge {
            quantity: movement.quantity,
            stock: product.stock_current,
        }
        .into());
    }

    if movement.is_outflow() && !product.can_withdraw(movement.quantity) {
        return Err(CoreError::InsufficientStock {
            product_id: product.id.clone(),
            available: product.stock_current,
            requested: movement.quantity,
        });
    }

    Ok(product)
}

// =============================================================================
// Product Validators
// =============================================================================

fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

fn non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustBeNonNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

fn unit_of_measure(value: Option<&str>) -> ValidationResult<String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_UNIT_OF_MEASURE.to_string()),
        Some(unit) if unit.chars().count() > MAX_UNIT_LENGTH => Err(ValidationError::TooLong {
            field: "unit_of_measure".to_string(),
            max: MAX_UNIT_LENGTH,
        }),
        Some(unit) => Ok(unit.to_string()),
    }
}

fn category(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validates and normalizes the attributes of a new product.
///
/// Text fields come back trimmed, a blank category becomes `None` and a
/// missing unit of measure becomes [`DEFAULT_UNIT_OF_MEASURE`].
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<NewProduct> {
    let code = required_text("code", &product.code, MAX_CODE_LENGTH)?;
    let name = required_text("name", &product.name, MAX_NAME_LENGTH)?;
    let unit = unit_of_measure(product.unit_of_measure.as_deref())?;
    non_negative("unit_price_cents", product.unit_price_cents)?;
    non_negative("stock_initial", product.stock_initial)?;

    Ok(NewProduct {
        code,
        name,
        category_id: category(product.category_id.as_deref()),
        unit_of_measure: Some(unit),
        unit_price_cents: product.unit_price_cents,
        stock_initial: product.stock_initial,
    })
}

/// Validates and normalizes editable product attributes.
pub fn validate_product_details(details: &ProductDetails) -> ValidationResult<ProductDetails> {
    let code = required_text("code", &details.code, MAX_CODE_LENGTH)?;
    let name = required_text("name", &details.name, MAX_NAME_LENGTH)?;
    let unit = unit_of_measure(details.unit_of_measure.as_deref())?;
    non_negative("unit_price_cents", details.unit_price_cents)?;

    Ok(ProductDetails {
        code,
        name,
        category_id: category(details.category_id.as_deref()),
        unit_of_measure: Some(unit),
        unit_price_cents: details.unit_price_cents,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
