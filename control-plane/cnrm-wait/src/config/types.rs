use std::time::Duration;

use envconfig::Envconfig;

use crate::watch::{MAX_TIMEOUT, MIN_POLL_INTERVAL, WatchSettings};

#[derive(Envconfig, Clone, Debug)]
pub struct WaitConfig {
    /// dev | ci
    #[envconfig(from = "CNRM_WAIT_PROFILE", default = "dev")]
    pub profile: String,

    #[envconfig(from = "CNRM_WAIT_K8S_NAMESPACE", default = "default")]
    pub k8s_namespace: String,

    /// Budget for the whole wait, shared by every resource.
    /// Env: CNRM_WAIT_TIMEOUT_SECS
    #[envconfig(from = "CNRM_WAIT_TIMEOUT_SECS", default = "1200")]
    pub timeout_secs: u64,

    /// Colored progress lines (profile default: true in dev, false in ci)
    /// Env: CNRM_WAIT_COLOR
    #[envconfig(from = "CNRM_WAIT_COLOR")]
    pub color: Option<bool>,

    #[envconfig(nested)]
    pub tuning: WatchTuning,
}

#[derive(Envconfig, Clone, Debug)]
pub struct WatchTuning {
    /// Interval between status fetches while a resource is initializing.
    #[envconfig(from = "CNRM_WAIT_POLL_INTERVAL_MS", default = "500")]
    pub poll_interval_ms: u64,
    /// Pause before re-opening an interrupted watch stream.
    #[envconfig(from = "CNRM_WAIT_RETRY_BACKOFF_MS", default = "1000")]
    pub retry_backoff_ms: u64,
    /// Capacity of the shared event channel.
    #[envconfig(from = "CNRM_WAIT_EVENT_BUFFER", default = "16")]
    pub event_buffer: usize,
}

impl Default for WatchTuning {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            retry_backoff_ms: 1000,
            event_buffer: 16,
        }
    }
}

impl WaitConfig {
    /// Fill unset optional values from the profile, keeping explicit env overrides.
    ///
    /// - dev: color=true
    /// - ci: color=false
    pub fn apply_profile_defaults(mut self) -> Self {
        let def_color = !matches!(self.profile.as_str(), "ci");
        if self.color.is_none() {
            self.color = Some(def_color);
        }
        self
    }

    /// Capped at [`MAX_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs).min(MAX_TIMEOUT)
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            namespace: self.k8s_namespace.clone(),
            timeout: self.timeout(),
            poll_interval: Duration::from_millis(self.tuning.poll_interval_ms)
                .max(MIN_POLL_INTERVAL),
            retry_backoff: Duration::from_millis(self.tuning.retry_backoff_ms),
            event_buffer: self.tuning.event_buffer.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(profile: &str) -> WaitConfig {
        WaitConfig {
            profile: profile.to_string(),
            k8s_namespace: "default".into(),
            timeout_secs: 1200,
            color: None,
            tuning: WatchTuning::default(),
        }
    }

    #[test]
    fn profile_defaults_dev() {
        let cfg = base("dev").apply_profile_defaults();
        assert_eq!(cfg.color, Some(true));
    }

    #[test]
    fn profile_defaults_ci() {
        let cfg = base("ci").apply_profile_defaults();
        assert_eq!(cfg.color, Some(false));
    }

    #[test]
    fn profile_defaults_respect_env_overrides() {
        let mut cfg = base("ci");
        cfg.color = Some(true); // explicitly enabled via env
        let cfg = cfg.apply_profile_defaults();
        assert_eq!(cfg.color, Some(true));
    }

    #[test]
    fn watch_settings_from_config() {
        let mut cfg = base("dev");
        cfg.tuning.event_buffer = 0;
        let s = cfg.watch_settings();
        assert_eq!(s.timeout, Duration::from_secs(1200));
        assert_eq!(s.poll_interval, Duration::from_millis(500));
        assert_eq!(s.retry_backoff, Duration::from_secs(1));
        assert_eq!(s.event_buffer, 1);
        assert_eq!(s.namespace, "default");
    }

    #[test]
    fn watch_settings_clamp_degenerate_values() {
        let mut cfg = base("dev");
        cfg.tuning.poll_interval_ms = 0;
        cfg.timeout_secs = u64::MAX;
        let s = cfg.watch_settings();
        assert_eq!(s.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(s.timeout, MAX_TIMEOUT);
    }
}
