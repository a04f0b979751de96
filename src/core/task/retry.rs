use std::time::Duration;
use crate::config::Config;
use crate::core::error::EngineError;

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// 总尝试次数（含第一次）
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64, // 添加抖动因子避免重试风暴
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryStrategy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_count.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            ..Self::default()
        }
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// `attempt` 为已经完成的尝试次数
    pub fn should_retry(&self, error: &EngineError, attempt: usize) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    pub fn get_delay(&self, attempt: usize) -> Duration {
        let delay_secs = self.base_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let jitter = delay_secs * self.jitter_factor * (rand::random::<f64>() - 0.5);
        let final_delay = (delay_secs + jitter).max(0.0);

        Duration::from_secs_f64(final_delay).min(self.max_delay)
    }
}

/// 重试上下文
#[derive(Debug)]
pub struct RetryContext {
    pub strategy: RetryStrategy,
    pub attempts: usize,
    pub retry_history: Vec<(String, Duration)>, // 记录失败原因与随后的等待
    pub total_retry_time: Duration,
}

impl RetryContext {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            attempts: 0,
            retry_history: Vec::new(),
            total_retry_time: Duration::from_secs(0),
        }
    }

    pub fn begin_attempt(&mut self) -> usize {
        self.attempts += 1;
        self.attempts
    }

    pub fn should_retry(&self, error: &EngineError) -> bool {
        self.strategy.should_retry(error, self.attempts)
    }

    /// 记录一次失败并返回下一次尝试前的等待时间
    pub fn record_failure(&mut self, error: &EngineError) -> Duration {
        let delay = self.strategy.get_delay(self.attempts);
        self.retry_history.push((error.to_string(), delay));
        self.total_retry_time += delay;
        delay
    }

    pub fn get_retry_stats(&self) -> RetryStats {
        RetryStats {
            attempts: self.attempts,
            total_retry_time: self.total_retry_time,
            retry_history: self.retry_history.clone(),
        }
    }
}

/// 重试统计信息
#[derive(Debug, Clone)]
pub struct RetryStats {
    pub attempts: usize,
    pub total_retry_time: Duration,
    pub retry_history: Vec<(String, Duration)>,
}
