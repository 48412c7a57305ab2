use crate::cli::BudgetArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

pub fn run(args: &BudgetArgs, context: &Context) -> Result<CommandResult, CliError> {
    let budget = context.orchestrator.budget();
    let states = match args.source {
        Some(source) => vec![budget.state(source)?],
        None => budget.states()?,
    };

    let exhausted = states
        .iter()
        .filter(|state| !state.has_budget())
        .map(|state| format!("{} has no calls left today", state.source))
        .collect::<Vec<_>>();

    Ok(CommandResult::ok(serde_json::to_value(&states)?).with_warnings(exhausted))
}
