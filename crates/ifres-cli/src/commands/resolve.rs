//! Resolve command implementation.

use anyhow::Result;
use tracing::{error, info};

use super::{Context, failure_hint};
use crate::retry::{Interrupt, NoRetry, Outcome, RetryStrategy, resolve_with_retry};

/// Run the resolve command
pub fn run(
    ctx: &Context,
    module: &str,
    interface: &str,
    wait: bool,
    json: bool,
    interrupt: &Interrupt,
) -> Result<()> {
    let resolver = ctx.resolver()?;

    let mut strategy: Box<dyn RetryStrategy> = if wait {
        ctx.config.retry.strategy()
    } else {
        Box::new(NoRetry)
    };

    let outcome = resolve_with_retry(
        || resolver.resolve(module, interface),
        strategy.as_mut(),
        interrupt,
    )
    .inspect_err(|e| {
        if let Some(err) = e.downcast_ref::<ifres::Error>() {
            error!("{}", failure_hint(err));
        }
    })?;

    let resolved = match outcome {
        Outcome::Resolved {
            interface,
            attempts,
        } => {
            if attempts > 1 {
                info!("Resolved after {} attempts", attempts);
            }
            interface
        }
        Outcome::Interrupted { attempts, waited } => {
            info!(
                "Interrupted after {} attempts ({:.1}s waiting for {})",
                attempts,
                waited.as_secs_f64(),
                module
            );
            return Ok(());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        println!(
            "{}!{} = 0x{:X}",
            resolved.module_name, resolved.interface_name, resolved.address
        );
    }

    Ok(())
}
