use crate::config::DiagnosticsConfig;
use crate::env::Environment;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

pub use tracing::subscriber::SetGlobalDefaultError;

/// Install a console subscriber for the crate's own diagnostics.
///
/// **Parameters**
/// - `config`: [`DiagnosticsConfig`] deciding whether lines are colored.
///
/// **Effects**
///
/// Installs a [`Registry`] with a `fmt` layer as the global default
/// subscriber. `WARN` and `ERROR` lines go to stderr, everything else to
/// stdout; each line carries its level.
///
/// **Returns**
/// - `Err(..)` if another global subscriber is already installed.
pub fn init_diagnostics_with_config(config: DiagnosticsConfig) -> Result<(), SetGlobalDefaultError> {
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(config.color)
        .with_target(true);

    let subscriber = Registry::default().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
}

/// Initialize diagnostics with color resolved from `NO_COLOR`/`FORCE_COLOR`.
pub fn init_diagnostics() -> Result<(), SetGlobalDefaultError> {
    init_diagnostics_with_config(DiagnosticsConfig::resolve(&Environment::from_process()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        init_diagnostics_with_config(DiagnosticsConfig { color: false }).unwrap();
        assert!(init_diagnostics().is_err());
    }
}
