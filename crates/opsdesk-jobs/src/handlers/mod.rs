//! Built-in action handlers.

pub mod mysql;
pub mod payloads;

use crate::handler::HandlerRegistry;
use crate::mysql::MySqlUnit;

pub use mysql::{
    ModuleToggleHandler, PageUpdateHandler, PayrollRecalculationHandler, PayrollUpdateHandler,
    SeoUpdateHandler, SettingsUpdateHandler,
};

/// Registry with a MySQL handler for every action type.
pub fn mysql_registry() -> HandlerRegistry<MySqlUnit> {
    HandlerRegistry::new()
        .with(SettingsUpdateHandler)
        .with(PageUpdateHandler)
        .with(ModuleToggleHandler)
        .with(PayrollUpdateHandler)
        .with(PayrollRecalculationHandler)
        .with(SeoUpdateHandler)
}
