// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod auth;
pub mod binder;
pub mod config;
pub mod error;
pub mod hub;
pub mod panel;
pub mod run;
