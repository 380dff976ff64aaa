use crate::db::models::{Exchange, ExchangeStatus};
use crate::error::{AppError, Result};

/// The exchange state machine. `rejected` and `completed` are terminal.
///
/// ```text
/// pending -> accepted | rejected
/// accepted -> in_progress
/// in_progress -> completed
/// ```
pub fn can_transition(from: ExchangeStatus, to: ExchangeStatus) -> bool {
    use ExchangeStatus::*;
    matches!(
        (from, to),
        (Pending, Accepted) | (Pending, Rejected) | (Accepted, InProgress) | (InProgress, Completed)
    )
}

/// Check that `caller` may move `exchange` to `new_status`.
///
/// Participants drive transitions; only the provider answers a pending
/// request. Admins bypass the authority checks but not the transition table.
pub fn validate_transition(
    exchange: &Exchange,
    new_status: ExchangeStatus,
    caller_id: i64,
    caller_is_admin: bool,
) -> Result<()> {
    if !caller_is_admin && !exchange.is_participant(caller_id) {
        return Err(AppError::Forbidden(
            "Not authorized to update this exchange".to_string(),
        ));
    }

    if !can_transition(exchange.status, new_status) {
        return Err(AppError::Validation(format!(
            "Cannot transition exchange from {} to {}",
            exchange.status, new_status
        )));
    }

    if exchange.status == ExchangeStatus::Pending
        && !caller_is_admin
        && caller_id != exchange.provider_id
    {
        return Err(AppError::Forbidden(
            "Only the provider may accept or reject this exchange".to_string(),
        ));
    }

    Ok(())
}

/// Next-session scheduling is only meaningful while the exchange is underway.
pub fn can_schedule_session(status: ExchangeStatus) -> bool {
    matches!(status, ExchangeStatus::Accepted | ExchangeStatus::InProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn exchange(status: ExchangeStatus) -> Exchange {
        Exchange {
            id: 1,
            requester_id: 10,
            provider_id: 20,
            requester_skill_id: None,
            provider_skill_id: None,
            status,
            next_session: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use ExchangeStatus::*;
        assert!(can_transition(Pending, Accepted));
        assert!(can_transition(Pending, Rejected));
        assert!(can_transition(Accepted, InProgress));
        assert!(can_transition(InProgress, Completed));

        assert!(!can_transition(Pending, InProgress));
        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Accepted, Completed));
        assert!(!can_transition(Accepted, Rejected));
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        use ExchangeStatus::*;
        for from in [Completed, Rejected] {
            for to in [Pending, Accepted, InProgress, Completed, Rejected] {
                assert!(!can_transition(from, to), "{from} -> {to} should be rejected");
            }
        }
    }

    #[test]
    fn only_provider_accepts_pending() {
        let e = exchange(ExchangeStatus::Pending);

        assert!(validate_transition(&e, ExchangeStatus::Accepted, 20, false).is_ok());

        // The requester cannot answer their own request
        let err = validate_transition(&e, ExchangeStatus::Accepted, 10, false).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // Neither can a third party
        let err = validate_transition(&e, ExchangeStatus::Accepted, 99, false).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn either_participant_progresses_and_completes() {
        let e = exchange(ExchangeStatus::Accepted);
        assert!(validate_transition(&e, ExchangeStatus::InProgress, 10, false).is_ok());
        assert!(validate_transition(&e, ExchangeStatus::InProgress, 20, false).is_ok());

        let e = exchange(ExchangeStatus::InProgress);
        assert!(validate_transition(&e, ExchangeStatus::Completed, 10, false).is_ok());
    }

    #[test]
    fn admin_bypasses_authority_but_not_the_table() {
        let e = exchange(ExchangeStatus::Pending);
        assert!(validate_transition(&e, ExchangeStatus::Rejected, 99, true).is_ok());

        let e = exchange(ExchangeStatus::Completed);
        let err = validate_transition(&e, ExchangeStatus::Pending, 99, true).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn sessions_schedule_only_while_underway() {
        use ExchangeStatus::*;
        assert!(can_schedule_session(Accepted));
        assert!(can_schedule_session(InProgress));
        assert!(!can_schedule_session(Pending));
        assert!(!can_schedule_session(Completed));
        assert!(!can_schedule_session(Rejected));
    }
}
