//! Raw configuration file model
//!
//! Mirrors the on-disk TOML shape and converts it into core job
//! definitions. Unknown keys are rejected so typos surface at load time
//! instead of silently dropping a setting.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tickd_core::{
    ChatTarget, ConfigError, DockerOptions, JobDefinition, NotifyMode, NotifySettings,
    WebhookTarget, parse_duration,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    #[serde(default, rename = "job")]
    jobs: Vec<JobBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobBlock {
    #[serde(default)]
    name: String,
    #[serde(default)]
    spec: String,
    #[serde(default)]
    tz: Option<String>,
    #[serde(default)]
    command: String,
    #[serde(default)]
    shell: Option<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    dir: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    log: Option<PathBuf>,
    #[serde(default)]
    timeout: Option<String>,
    #[serde(default)]
    docker: Option<DockerBlock>,
    #[serde(default)]
    notify: Option<NotifyBlock>,
    #[serde(default)]
    disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DockerBlock {
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotifyBlock {
    #[serde(default)]
    on: Option<String>,
    #[serde(default)]
    webhook: Option<WebhookBlock>,
    #[serde(default)]
    chat: Option<ChatBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WebhookBlock {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChatBlock {
    url: String,
    username: String,
    channel: String,
}

impl ConfigFile {
    pub(crate) fn into_jobs(self) -> Result<Vec<JobDefinition>, ConfigError> {
        self.jobs.into_iter().map(JobBlock::into_definition).collect()
    }
}

impl JobBlock {
    fn into_definition(self) -> Result<JobDefinition, ConfigError> {
        let timeout = match self.timeout.as_deref() {
            None | Some("") => None,
            Some(text) => Some(parse_duration(text).map_err(|source| {
                ConfigError::InvalidTimeout {
                    name: self.name.clone(),
                    source,
                }
            })?),
        };

        let notify = match self.notify {
            Some(block) => Some(block.into_settings(&self.name)?),
            None => None,
        };

        Ok(JobDefinition {
            name: self.name,
            spec: self.spec,
            timezone: self.tz,
            command: self.command,
            shell: self.shell,
            environment: self.env,
            dir: self.dir,
            user: self.user,
            log: self.log,
            timeout,
            docker: self.docker.map(|d| DockerOptions { image: d.image }),
            notify,
            disabled: self.disabled,
        })
    }
}

impl NotifyBlock {
    fn into_settings(self, job: &str) -> Result<NotifySettings, ConfigError> {
        let mode = match self.on.as_deref() {
            // Notify on errors only by default
            None | Some("") | Some("error") => NotifyMode::Error,
            Some("all") => NotifyMode::All,
            Some(other) => {
                return Err(ConfigError::InvalidNotifyMode {
                    name: job.to_string(),
                    mode: other.to_string(),
                });
            }
        };

        Ok(NotifySettings {
            mode,
            webhook: self.webhook.map(|w| WebhookTarget { url: w.url }),
            chat: self.chat.map(|c| ChatTarget {
                url: c.url,
                username: c.username,
                channel: c.channel,
            }),
        })
    }
}
