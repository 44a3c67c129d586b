// Copyright (c) 2026 Warden Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod isolation;
pub mod ledger;

pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use isolation::InProcessBackend;
pub use ledger::InMemoryExecutionLedger;
