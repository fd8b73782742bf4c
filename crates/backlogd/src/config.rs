//! Daemon configuration.
//!
//! Every option is both a `--flag` and an environment variable; a `.env`
//! file in the working directory is loaded before parsing. Durations use
//! humantime syntax (`250ms`, `1s`, `1m`, `10m`).

use std::time::Duration;

use anyhow::{Context, bail};
use clap::Parser;

use backlog_core::config::{
    DEFAULT_MAX_INSTANCES, DEFAULT_MIN_INSTANCES, DEFAULT_NUM_SAMPLES,
    DEFAULT_WORKERS_PER_INSTANCE,
};
use backlog_core::{InstanceBounds, ScalerConfig};
use backlog_render::RenderConfig;
use backlog_render::client::DEFAULT_BASE_URL;
use backlog_resque::ResqueConfig;

#[derive(Debug, Parser)]
#[command(
    name = "backlogd",
    about = "Sizes a Render worker fleet to its Resque backlog",
    version
)]
pub struct Cli {
    /// Render service id of the worker fleet to scale.
    #[arg(long, env = "WORKER_SERVICE_ID")]
    pub worker_service_id: String,

    /// Render API key.
    #[arg(long, env = "RENDER_API_KEY", hide_env_values = true)]
    pub render_api_key: String,

    /// Redis address (host:port) holding the Resque keyspace.
    #[arg(long, env = "REDIS_ADDRESS")]
    pub redis_address: String,

    /// Redis password, sent with AUTH on connect.
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Resque key namespace.
    #[arg(long, env = "RESQUE_NAMESPACE", default_value = "resque")]
    pub resque_namespace: String,

    #[arg(long, env = "MIN_INSTANCES", default_value_t = DEFAULT_MIN_INSTANCES)]
    pub min_instances: u32,

    #[arg(long, env = "MAX_INSTANCES", default_value_t = DEFAULT_MAX_INSTANCES)]
    pub max_instances: u32,

    /// Jobs one instance can work concurrently.
    #[arg(long, env = "WORKERS_PER_INSTANCE", default_value_t = DEFAULT_WORKERS_PER_INSTANCE)]
    pub workers_per_instance: u32,

    /// Sampling interval.
    #[arg(long, env = "INTERVAL", default_value = "1s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Smoothing window length, in samples.
    #[arg(long, env = "NUM_SAMPLES", default_value_t = DEFAULT_NUM_SAMPLES)]
    pub num_samples: usize,

    /// Minimum time since the last scaling event before scaling up.
    #[arg(long, env = "SCALE_UP_DELAY", default_value = "1m", value_parser = humantime::parse_duration)]
    pub scale_up_delay: Duration,

    /// Minimum time since the last scaling event before scaling down.
    #[arg(long, env = "SCALE_DOWN_DELAY", default_value = "10m", value_parser = humantime::parse_duration)]
    pub scale_down_delay: Duration,

    /// Redis connect and command timeout.
    #[arg(long, env = "REDIS_TIMEOUT", default_value = "5s", value_parser = humantime::parse_duration)]
    pub redis_timeout: Duration,

    /// Render API base URL.
    #[arg(long, env = "RENDER_API_URL", default_value = DEFAULT_BASE_URL)]
    pub render_api_url: String,

    /// Render API request timeout.
    #[arg(long, env = "RENDER_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub render_timeout: Duration,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Validate the configuration, print it and exit.
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Build and validate the scaler config.
    pub fn scaler_config(&self) -> anyhow::Result<ScalerConfig> {
        for (name, value) in [
            ("WORKER_SERVICE_ID", &self.worker_service_id),
            ("RENDER_API_KEY", &self.render_api_key),
            ("REDIS_ADDRESS", &self.redis_address),
        ] {
            if value.trim().is_empty() {
                bail!("{name} must not be empty");
            }
        }

        let config = ScalerConfig {
            bounds: InstanceBounds {
                min: self.min_instances,
                max: self.max_instances,
            },
            workers_per_instance: self.workers_per_instance,
            interval: self.interval,
            num_samples: self.num_samples,
            scale_up_delay: self.scale_up_delay,
            scale_down_delay: self.scale_down_delay,
        };
        config.validate().context("invalid scaler configuration")?;
        Ok(config)
    }

    pub fn resque_config(&self) -> ResqueConfig {
        ResqueConfig {
            address: self.redis_address.clone(),
            password: self.redis_password.clone().filter(|p| !p.is_empty()),
            namespace: self.resque_namespace.clone(),
            timeout: self.redis_timeout,
        }
    }

    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            base_url: self.render_api_url.clone(),
            service_id: self.worker_service_id.clone(),
            api_key: self.render_api_key.clone(),
            timeout: self.render_timeout,
        }
    }

    /// Human-readable summary of the effective settings, secrets omitted.
    pub fn summary(&self) -> String {
        format!(
            "worker service:       {}\n\
             render api:           {} (timeout {})\n\
             redis:                {} (namespace {:?}, auth {}, timeout {})\n\
             instances:            {}..={}\n\
             workers per instance: {}\n\
             interval:             {}\n\
             sample window:        {}\n\
             scale-up delay:       {}\n\
             scale-down delay:     {}",
            self.worker_service_id,
            self.render_api_url,
            humantime::format_duration(self.render_timeout),
            self.redis_address,
            self.resque_namespace,
            if self.redis_password.is_some() { "on" } else { "off" },
            humantime::format_duration(self.redis_timeout),
            self.min_instances,
            self.max_instances,
            self.workers_per_instance,
            humantime::format_duration(self.interval),
            self.num_samples,
            humantime::format_duration(self.scale_up_delay),
            humantime::format_duration(self.scale_down_delay),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    use clap::CommandFactory;
    use clap::error::ErrorKind;

    const REQUIRED: [&str; 7] = [
        "backlogd",
        "--worker-service-id",
        "srv-123",
        "--render-api-key",
        "rnd_key",
        "--redis-address",
        "localhost:6379",
    ];

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(REQUIRED.iter().chain(extra).copied())
    }

    #[test]
    fn defaults_match_documented_values() {
        let cli = parse(&[]).unwrap();
        let config = cli.scaler_config().unwrap();

        assert_eq!(config.bounds, InstanceBounds { min: 2, max: 50 });
        assert_eq!(config.workers_per_instance, 1);
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.num_samples, 1);
        assert_eq!(config.scale_up_delay, Duration::from_secs(60));
        assert_eq!(config.scale_down_delay, Duration::from_secs(600));
        assert!(!cli.log_json);
        assert!(!cli.check_config);
    }

    #[test]
    fn parses_humantime_durations() {
        let cli = parse(&[
            "--interval",
            "250ms",
            "--scale-up-delay",
            "30s",
            "--scale-down-delay",
            "1h",
        ])
        .unwrap();
        let config = cli.scaler_config().unwrap();

        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.scale_up_delay, Duration::from_secs(30));
        assert_eq!(config.scale_down_delay, Duration::from_secs(3600));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(parse(&["--interval", "soon"]).is_err());
        assert!(parse(&["--min-instances", "-1"]).is_err());
        assert!(parse(&["--num-samples", "three"]).is_err());
    }

    #[test]
    fn missing_required_option_is_rejected() {
        // Detach the env fallback so an exported REDIS_ADDRESS cannot satisfy it.
        let err = Cli::command()
            .mut_arg("redis_address", |arg| arg.env(None::<&'static str>))
            .try_get_matches_from([
                "backlogd",
                "--worker-service-id",
                "srv-123",
                "--render-api-key",
                "rnd_key",
            ])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let command = Cli::command();
        let arg = command
            .get_arguments()
            .find(|a| a.get_id() == "redis_address")
            .unwrap();
        assert!(arg.is_required_set());
        assert_eq!(arg.get_env(), Some(OsStr::new("REDIS_ADDRESS")));
    }

    #[test]
    fn invariant_violations_fail_validation() {
        let cli = parse(&["--min-instances", "10", "--max-instances", "5"]).unwrap();
        assert!(cli.scaler_config().is_err());

        let cli = parse(&["--min-instances", "0"]).unwrap();
        assert!(cli.scaler_config().is_err());

        let cli = parse(&["--workers-per-instance", "0"]).unwrap();
        assert!(cli.scaler_config().is_err());

        let cli = parse(&["--num-samples", "0"]).unwrap();
        assert!(cli.scaler_config().is_err());
    }

    #[test]
    fn empty_required_value_fails_validation() {
        let cli = Cli::try_parse_from([
            "backlogd",
            "--worker-service-id",
            "",
            "--render-api-key",
            "rnd_key",
            "--redis-address",
            "localhost:6379",
        ])
        .unwrap();
        let err = cli.scaler_config().unwrap_err();
        assert!(err.to_string().contains("WORKER_SERVICE_ID"));
    }

    #[test]
    fn collaborator_configs_carry_settings() {
        let cli = parse(&[
            "--redis-password",
            "pw",
            "--resque-namespace",
            "jobs",
            "--render-api-url",
            "http://localhost:9000/v1",
        ])
        .unwrap();

        let resque = cli.resque_config();
        assert_eq!(resque.address, "localhost:6379");
        assert_eq!(resque.password.as_deref(), Some("pw"));
        assert_eq!(resque.namespace, "jobs");

        let render = cli.render_config();
        assert_eq!(render.service_id, "srv-123");
        assert_eq!(render.api_key, "rnd_key");
        assert_eq!(render.base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn summary_omits_secrets() {
        let cli = parse(&["--redis-password", "hunter2"]).unwrap();
        let summary = cli.summary();
        assert!(summary.contains("srv-123"));
        assert!(summary.contains("auth on"));
        assert!(!summary.contains("rnd_key"));
        assert!(!summary.contains("hunter2"));
    }
}
