use crate::error::CliError;

use super::{CommandResult, Context};

pub fn run(context: &Context) -> Result<CommandResult, CliError> {
    let status = context.orchestrator.get_system_status();

    let mut result = CommandResult::ok(serde_json::to_value(&status)?);
    if status.cache.is_none() {
        result = result.with_warning("cache status could not be read");
    }
    if !status.sources.iter().any(|source| source.available) {
        result = result.with_warning("no live source is configured; serving cached or synthetic data");
    }
    Ok(result)
}
