use crate::db::models::{Exchange, ExchangeStatus};
use crate::error::{AppError, Result};

/// Validate a review request against its exchange and return the receiver:
/// always the participant on the other side of the caller.
///
/// Checks run in order, first failure wins: exchange completed, caller a
/// participant, rating in range, declared receiver (if any) consistent.
pub fn validate_review(
    exchange: &Exchange,
    caller_id: i64,
    declared_receiver_id: Option<i64>,
    rating: i32,
) -> Result<i64> {
    if exchange.status != ExchangeStatus::Completed {
        return Err(AppError::Validation(
            "Cannot review an exchange that is not completed".to_string(),
        ));
    }

    let Some(receiver_id) = exchange.other_participant(caller_id) else {
        return Err(AppError::Forbidden(
            "Not authorized to review this exchange".to_string(),
        ));
    };

    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation(
            "Rating must be an integer between 1 and 5".to_string(),
        ));
    }

    if let Some(declared) = declared_receiver_id {
        if declared != receiver_id {
            return Err(AppError::Validation(
                "Receiver must be the other participant of the exchange".to_string(),
            ));
        }
    }

    Ok(receiver_id)
}
