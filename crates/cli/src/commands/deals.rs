use clap::{Args, Subcommand};
use dealpulse_core::domain::deal::{DealId, ReorderDirection};
use dealpulse_core::errors::DomainError;

use crate::commands::{
    application_failure, build_runtime, load_config, open_pool, service_for, CommandResult,
};

#[derive(Debug, Clone, Subcommand)]
pub enum DealsCommand {
    /// List every deal in display order
    List,
    /// Move a deal one slot up or down in display order
    Reorder(ReorderArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ReorderArgs {
    pub deal_id: String,
    /// `up` or `down`
    pub direction: String,
}

pub fn run(command: &DealsCommand) -> CommandResult {
    let name = match command {
        DealsCommand::List => "deals.list",
        DealsCommand::Reorder(_) => "deals.reorder",
    };

    let direction = match command {
        DealsCommand::Reorder(args) => match ReorderDirection::parse(&args.direction) {
            Some(direction) => Some(direction),
            None => {
                let error = DomainError::Validation(format!(
                    "direction must be `up` or `down`, got `{}`",
                    args.direction
                ));
                return CommandResult::from_failure(name, application_failure(name, error.into()));
            }
        },
        DealsCommand::List => None,
    };

    let config = match load_config(name) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime(name) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let service = service_for(&config, pool.clone());
        let deals = match (command, direction) {
            (DealsCommand::Reorder(args), Some(direction)) => {
                service.reorder_deal(&DealId(args.deal_id.clone()), direction).await
            }
            _ => service.list_deals().await,
        };
        pool.close().await;
        deals.map_err(|error| application_failure(name, error))
    });

    match result {
        Ok(deals) => CommandResult::success_with_data(name, format!("{} deals", deals.len()), &deals),
        Err(failure) => CommandResult::from_failure(name, failure),
    }
}
