// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device serial number presented to the identity provider.

use std::sync::OnceLock;

static DEVICE_SERIAL: OnceLock<String> = OnceLock::new();

/// Serial number of this process.
///
/// Random, generated on first use and stable until the process exits. It is
/// not persisted, so every restart looks like a new device to the provider.
pub fn device_serial() -> &'static str {
    DEVICE_SERIAL.get_or_init(|| uuid::Uuid::new_v4().to_string())
}
