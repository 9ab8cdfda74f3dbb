// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::AuthState::{self, *};

#[yare::parameterized(
    login_from_idle        = { Idle, CodeRequested },
    code_to_polling        = { CodeRequested, Polling },
    poll_retry             = { Polling, Polling },
    poll_success           = { Polling, Authorized },
    poll_budget_exhausted  = { Polling, Abandoned },
    poll_error             = { Polling, Failed },
    expiry                 = { Authorized, TokenExpired },
    refresh_on_expiry      = { TokenExpired, Refreshing },
    refresh_from_storage   = { Idle, Refreshing },
    refresh_success        = { Refreshing, Authorized },
    refresh_failure        = { Refreshing, Failed },
    relogin_after_failure  = { Failed, CodeRequested },
    relogin_while_polling  = { Polling, CodeRequested },
    manual_refresh         = { Authorized, Refreshing },
    logout                 = { Refreshing, Idle },
)]
fn allowed(from: AuthState, to: AuthState) {
    assert!(from.can_transition_to(to), "{from} -> {to} should be allowed");
}

#[yare::parameterized(
    skip_code_pair          = { Idle, Polling },
    authorize_without_poll  = { CodeRequested, Authorized },
    expire_while_polling    = { Polling, TokenExpired },
    refresh_while_polling   = { Polling, Refreshing },
    double_refresh          = { Refreshing, Refreshing },
    login_during_refresh    = { Refreshing, CodeRequested },
    abandon_from_refresh    = { Refreshing, Abandoned },
    authorized_from_idle    = { Idle, Authorized },
)]
fn rejected(from: AuthState, to: AuthState) {
    assert!(!from.can_transition_to(to), "{from} -> {to} should be rejected");
}

#[test]
fn serializes_snake_case() -> anyhow::Result<()> {
    assert_eq!(serde_json::to_string(&TokenExpired)?, r#""token_expired""#);
    assert_eq!(CodeRequested.to_string(), "code_requested");
    Ok(())
}
