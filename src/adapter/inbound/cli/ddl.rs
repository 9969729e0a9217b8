//! Handler for the `ddl` command.

use crate::adapter::inbound::cli::command::ConfigPathArg;
use crate::adapter::inbound::cli::{config, output};
use crate::adapter::outbound::sqlite::SqliteBackend;
use crate::error::Result;
use crate::port::Backend;

/// Print the load table DDL for the configured backend.
pub fn execute(args: &ConfigPathArg) -> Result<()> {
    let (config, _) = config::load(args.config.as_deref())?;
    let backend = SqliteBackend::new(&config.database);

    if output::is_json() {
        output::json_output(serde_json::json!({
            "backend": backend.name(),
            "ddl": backend.ddl(),
        }));
        return Ok(());
    }

    println!("-- {} DDL", backend.name());
    println!("{};", backend.ddl());
    Ok(())
}
