//! SQLite database for the `PressGate` gateway.

pressgate_core::define_database!(GatewayDatabase, "Gateway database migrations complete");
