use crate::{
    error::RuntimeError,
    workflow::{EntryFailurePolicy, Workflow, DEFAULT_EXECUTION_TIMEOUT},
};
use std::time::Duration;

/// Settings the alert workflow reads from its environment
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Topic alerts are published to
    pub topic_arn: String,
    /// Wall-clock budget of one execution
    pub execution_timeout: Duration,
    /// What happens to entries that can't be parsed
    pub entry_failure_policy: EntryFailurePolicy,
}

impl Config {
    /// Load the configuration from the process environment.
    ///
    /// `TOPIC_ARN` is required. `EXECUTION_TIMEOUT_SECS` defaults to five
    /// minutes and `ENTRY_FAILURE_POLICY` to `abort`.
    pub fn from_env() -> Result<Config, RuntimeError> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Config, RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let topic_arn = lookup("TOPIC_ARN")
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| {
                RuntimeError::Configuration("missing environment variable TOPIC_ARN".into())
            })?;

        let execution_timeout = match lookup("EXECUTION_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    RuntimeError::Configuration(format!("invalid EXECUTION_TIMEOUT_SECS {secs}"))
                })?,
            None => DEFAULT_EXECUTION_TIMEOUT,
        };

        let entry_failure_policy = match lookup("ENTRY_FAILURE_POLICY") {
            Some(policy) => policy.parse()?,
            None => EntryFailurePolicy::default(),
        };

        Ok(Config {
            topic_arn,
            execution_timeout,
            entry_failure_policy,
        })
    }

    /// Workflow configured with these settings
    pub fn workflow(&self) -> Workflow {
        Workflow::new(self.execution_timeout, self.entry_failure_policy)
    }
}
