//! Sink selection at process start.

use std::sync::Arc;

use crate::config::{CloudSinkConfig, LoggingConfig};
use crate::observability::cloud::CloudSink;
use crate::observability::environment::Environment;
use crate::observability::record::{Fields, Level, LogRecord};
use crate::observability::sink::{ConsoleSink, LogSink, SinkError};

/// Build the ordered sink list for this process.
///
/// The console sink is always first. The cloud sink is appended only when the
/// environment allows it and its construction succeeds.
pub fn build_sinks(env: &Environment, config: &LoggingConfig) -> Vec<Arc<dyn LogSink>> {
    build_sinks_with(env, config, Arc::new(ConsoleSink), |cfg, env| {
        CloudSink::connect(cfg, env).map(|sink| Arc::new(sink) as Arc<dyn LogSink>)
    })
}

/// Same as [`build_sinks`] with an explicit local sink and cloud constructor.
pub fn build_sinks_with<F>(
    env: &Environment,
    config: &LoggingConfig,
    local: Arc<dyn LogSink>,
    connect_cloud: F,
) -> Vec<Arc<dyn LogSink>>
where
    F: FnOnce(&CloudSinkConfig, &Environment) -> Result<Arc<dyn LogSink>, SinkError>,
{
    let mut sinks = vec![local.clone()];

    if !config.cloud.enabled || !env.is_managed_logging_available() {
        let _ = local.accept(&LogRecord::new(
            Level::Debug,
            "Cloud logging disabled: not in production or no managed environment detected",
        ));
        return sinks;
    }

    match connect_cloud(&config.cloud, env) {
        Ok(cloud) => sinks.push(cloud),
        Err(e) => {
            let warning = LogRecord::new(
                Level::Warn,
                "Failed to initialize cloud logging, falling back to console logging only",
            )
            .with_fields(Fields::new().with("error", e.to_string()));
            let _ = local.accept(&warning);
        }
    }

    sinks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use crate::observability::record::FieldValue;
    use crate::observability::sink::MemorySink;
    use std::cell::Cell;

    fn env_from(pairs: &'static [(&'static str, &'static str)]) -> Environment {
        Environment::from_lookup(&EnvironmentConfig::default(), |name| {
            pairs.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
        })
    }

    const PRODUCTION_CLOUD: &[(&str, &str)] = &[
        ("GOOGLE_CLOUD_PROJECT", "acme"),
        ("K_SERVICE", "pack-api"),
        ("NODE_ENV", "production"),
    ];

    #[test]
    fn test_unavailable_environment_is_console_only() {
        let calls = Cell::new(0);
        let local = Arc::new(MemorySink::new());

        let sinks = build_sinks_with(&env_from(&[]), &LoggingConfig::default(), local.clone(), |_, _| {
            calls.set(calls.get() + 1);
            Ok(Arc::new(MemorySink::new()) as Arc<dyn LogSink>)
        });

        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "memory");
        assert_eq!(calls.get(), 0, "cloud sink must not be constructed");
    }

    #[test]
    fn test_cloud_sink_appended_after_console() {
        let sinks = build_sinks_with(
            &env_from(PRODUCTION_CLOUD),
            &LoggingConfig::default(),
            Arc::new(ConsoleSink),
            |_, _| Ok(Arc::new(MemorySink::new()) as Arc<dyn LogSink>),
        );

        let names: Vec<_> = sinks.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["console", "memory"]);
    }

    #[test]
    fn test_cloud_construction_failure_degrades_to_local() {
        let local = Arc::new(MemorySink::new());

        let sinks = build_sinks_with(
            &env_from(PRODUCTION_CLOUD),
            &LoggingConfig::default(),
            local.clone(),
            |_, _| Err(SinkError::Init("credentials rejected".into())),
        );

        assert_eq!(sinks.len(), 1);
        let warning = local
            .records()
            .into_iter()
            .find(|r| r.level == Level::Warn)
            .expect("warning through local sink");
        assert_eq!(
            warning.fields.get("error"),
            Some(&FieldValue::from("sink initialization failed: credentials rejected"))
        );
    }

    #[test]
    fn test_disabled_in_config_skips_cloud() {
        let mut config = LoggingConfig::default();
        config.cloud.enabled = false;
        let calls = Cell::new(0);

        let sinks = build_sinks_with(&env_from(PRODUCTION_CLOUD), &config, Arc::new(ConsoleSink), |_, _| {
            calls.set(calls.get() + 1);
            Err(SinkError::Closed)
        });

        assert_eq!(sinks.len(), 1);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_default_builder_without_runtime_never_fails() {
        // no Tokio runtime here, so the real cloud sink cannot start
        let sinks = build_sinks(&env_from(PRODUCTION_CLOUD), &LoggingConfig::default());
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].name(), "console");
    }
}
