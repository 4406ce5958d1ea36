//! Process-wide trigger surface
//!
//! Hosts that cannot hold a scheduler reference (a UI button binding, an
//! external automation hook) call [`generate_report_number`]. The active
//! scheduler is installed once at startup.

use crate::fields::FieldStore;
use crate::scheduler::{AttemptOutcome, TriggerScheduler};
use crate::timer::Timer;
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::info;

/// Anything that can run a report number attempt on request
pub trait ReportNumberHost: Send + Sync {
    fn generate_report_number(&self, interactive: bool) -> AttemptOutcome;
}

impl<S, T> ReportNumberHost for TriggerScheduler<S, T>
where
    S: FieldStore + Send + 'static,
    T: Timer,
{
    fn generate_report_number(&self, interactive: bool) -> AttemptOutcome {
        self.generate(interactive)
    }
}

static HOST: OnceCell<Arc<dyn ReportNumberHost>> = OnceCell::new();

/// Register the process-wide host
///
/// Fails if a host is already installed.
pub fn install(host: Arc<dyn ReportNumberHost>) -> Result<()> {
    HOST.set(host)
        .map_err(|_| Error::InvalidInput("Report number host already installed".to_string()))?;
    info!("Report number host installed");
    Ok(())
}

/// Whether [`install`] has been called
pub fn is_installed() -> bool {
    HOST.get().is_some()
}

/// Run an attempt on the installed host
pub fn generate_report_number(interactive: bool) -> Result<AttemptOutcome> {
    let host = HOST
        .get()
        .ok_or_else(|| Error::Internal("No report number host installed".to_string()))?;
    Ok(host.generate_report_number(interactive))
}
