use crate::{
    config::{Sources, BROKERS_ADDR},
    error::{BrokerError, ConfigError},
};
use backoff::{backoff::Backoff, ExponentialBackoff};
use kafka::producer::{AsBytes, ProduceConfirm, Producer, Record, RequiredAcks};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Acknowledgment and retry behaviour, fixed when the producer is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub require_all_acks: bool,
    pub return_successes: bool,
    pub return_errors: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            require_all_acks: true,
            return_successes: true,
            return_errors: true,
        }
    }
}

impl RetryPolicy {
    /// A synchronous producer reports both outcomes to its caller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.return_successes || !self.return_errors {
            return Err(ConfigError::InvalidPolicy(
                "a synchronous producer must return both successes and errors".to_string(),
            ));
        }
        Ok(())
    }

    fn required_acks(&self) -> RequiredAcks {
        if self.require_all_acks {
            RequiredAcks::All
        } else {
            RequiredAcks::One
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: Duration::from_millis(100),
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// One acknowledged record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Builds producers from resolved configuration.
#[derive(Debug, Clone)]
pub struct ProducerInitializer {
    policy: RetryPolicy,
    ack_timeout: Duration,
}

impl Default for ProducerInitializer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProducerInitializer {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Broker hosts from `brokers.addr`, split on commas.
    pub fn resolve_hosts(sources: &Sources<'_>) -> Result<Vec<String>, ConfigError> {
        let resolved = sources.resolve_required(&BROKERS_ADDR)?;
        let hosts: Vec<String> = resolved
            .value
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(String::from)
            .collect();

        if hosts.is_empty() {
            return Err(ConfigError::MissingField {
                flag: BROKERS_ADDR.flag,
                env: BROKERS_ADDR.env,
            });
        }
        Ok(hosts)
    }

    /// Resolves the hosts, checks the policy and builds the producer. Blocks
    /// until the broker metadata has been loaded.
    pub fn init(&self, sources: &Sources<'_>) -> Result<ProducerHandle, BrokerError> {
        let hosts = Self::resolve_hosts(sources)?;
        self.connect(hosts)
    }

    /// Same as [`init`](Self::init), with the blocking part moved off the
    /// async runtime.
    pub async fn init_async(&self, sources: &Sources<'_>) -> Result<ProducerHandle, BrokerError> {
        let hosts = Self::resolve_hosts(sources)?;
        let initializer = self.clone();
        tokio::task::spawn_blocking(move || initializer.connect(hosts)).await?
    }

    pub fn connect(&self, hosts: Vec<String>) -> Result<ProducerHandle, BrokerError> {
        self.policy.validate()?;

        info!(brokers = ?hosts, policy = ?self.policy, "Creating synchronous producer");
        let producer = Producer::from_hosts(hosts.clone())
            .with_ack_timeout(self.ack_timeout)
            .with_required_acks(self.policy.required_acks())
            .create()
            .map_err(|e| {
                error!(brokers = ?hosts, "Failed to create producer: {}", e);
                e
            })?;

        // Ownership moves into the handle only once construction succeeded
        Ok(ProducerHandle {
            hosts,
            policy: self.policy,
            producer: Some(producer),
        })
    }
}

/// Sole owner of a broker connection. Released exactly once, by `close` or
/// on drop.
pub struct ProducerHandle {
    hosts: Vec<String>,
    policy: RetryPolicy,
    producer: Option<Producer>,
}

impl ProducerHandle {
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn is_open(&self) -> bool {
        self.producer.is_some()
    }

    /// Sends one record, retrying up to `max_retries` times.
    pub fn send(
        &mut self,
        topic: &str,
        key: Option<&[u8]>,
        value: &[u8],
    ) -> Result<Vec<Delivery>, BrokerError> {
        let max_retries = self.policy.max_retries;
        let mut backoff = self.policy.backoff();
        let producer = self.producer.as_mut().ok_or(BrokerError::Released)?;

        let mut attempt = 0;
        loop {
            let result = match key {
                Some(key) => send_record(producer, &Record::from_key_value(topic, key, value)),
                None => send_record(producer, &Record::from_value(topic, value)),
            };

            match result {
                Ok(deliveries) => {
                    debug!(topic = %topic, attempt, "Record delivered");
                    return Ok(deliveries);
                }
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    let wait = backoff.next_backoff().unwrap_or(Duration::from_secs(2));
                    warn!(
                        "Send to '{}' failed (attempt {}/{}), retrying in {:?}: {}",
                        topic, attempt, max_retries, wait, e
                    );
                    std::thread::sleep(wait);
                }
                Err(e) => {
                    error!("Send to '{}' failed after {} retries: {}", topic, attempt, e);
                    return Err(e);
                }
            }
        }
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(producer) = self.producer.take() {
            drop(producer);
            info!(brokers = ?self.hosts, "Producer released");
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn send_record<K: AsBytes, V: AsBytes>(
    producer: &mut Producer,
    record: &Record<'_, K, V>,
) -> Result<Vec<Delivery>, BrokerError> {
    let confirms = producer.send_all(std::slice::from_ref(record))?;
    deliveries(confirms)
}

fn deliveries(confirms: Vec<ProduceConfirm>) -> Result<Vec<Delivery>, BrokerError> {
    let mut out = Vec::new();
    for confirm in confirms {
        for partition in confirm.partition_confirms {
            match partition.offset {
                Ok(offset) => out.push(Delivery {
                    topic: confirm.topic.clone(),
                    partition: partition.partition,
                    offset,
                }),
                Err(code) => {
                    return Err(BrokerError::Delivery {
                        topic: confirm.topic,
                        partition: partition.partition,
                        code,
                    })
                }
            }
        }
    }
    Ok(out)
}
