use std::time::Duration;

/// Construction-time configuration surface. Every field here has a spec
/// default; nothing is read from the environment or a filesystem layout
/// (that belongs to the binary, not the engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub status_reporting_interval: Duration,
    pub print_start_delay: Duration,
    pub validation_delay: Duration,
    pub busy_state_change_delay: Duration,
    pub tof_state_change_delay: Duration,
    pub paper_in_chute_set_delay: Duration,
    pub paper_in_chute_clear_delay: Duration,
    pub reassembly_timeout: Duration,
    pub min_message_size: usize,
    pub max_message_size: usize,
    pub unit_address: u8,
    pub software_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            status_reporting_interval: Duration::from_millis(2000),
            print_start_delay: Duration::from_millis(3000),
            validation_delay: Duration::from_millis(18000),
            busy_state_change_delay: Duration::from_millis(20000),
            tof_state_change_delay: Duration::from_millis(4000),
            paper_in_chute_set_delay: Duration::from_millis(2000),
            paper_in_chute_clear_delay: Duration::from_millis(10000),
            reassembly_timeout: Duration::from_millis(20),
            min_message_size: 4,
            max_message_size: 1024,
            unit_address: b'0',
            software_version: "PAY-6.22B".to_string(),
        }
    }
}
