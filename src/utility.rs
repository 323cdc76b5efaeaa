use approx::assert_relative_eq;
use config::Config;
use serde_json::{json, Value};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::enums::CommandStatus;

/// Trait for parsing the configuration value.
///
/// # Parameters
/// * `Self` - Type of the configuration value.
pub trait ConfigValue: Sized {
    /// Parse the configuration value.
    ///
    /// # Parameters
    /// * `s` - String to parse.
    ///
    /// # Returns
    /// The parsed configuration value.
    fn parse_value(s: &str) -> Self;
}

/// Implement the trait ConfigValue for String.
///
/// # Parameters
/// * `String` - Type of the configuration value.
impl ConfigValue for String {
    fn parse_value(s: &str) -> Self {
        s.to_string()
    }
}

/// Implement the trait ConfigValue for f64.
///
/// # Parameters
/// * `f64` - Type of the configuration value.
impl ConfigValue for f64 {
    fn parse_value(s: &str) -> Self {
        s.parse::<f64>().expect(&format!("{s} should parse as f64"))
    }
}

/// Implement the trait ConfigValue for usize.
///
/// # Parameters
/// * `usize` - Type of the configuration value.
impl ConfigValue for usize {
    fn parse_value(s: &str) -> Self {
        s.parse::<usize>()
            .expect(&format!("{s} should parse as usize"))
    }
}

/// Implement the trait ConfigValue for i32.
///
/// # Parameters
/// * `i32` - Type of the configuration value.
impl ConfigValue for i32 {
    fn parse_value(s: &str) -> Self {
        s.parse::<i32>().expect(&format!("{s} should parse as i32"))
    }
}

/// Implement the trait ConfigValue for u64.
///
/// # Parameters
/// * `u64` - Type of the configuration value.
///
/// # Panics
/// If the hex string does not start with 0x or 0X.
impl ConfigValue for u64 {
    fn parse_value(s: &str) -> Self {
        if !s.starts_with("0x") && !s.starts_with("0X") {
            panic!("Hex string {s} should start with 0x or 0X");
        }

        u64::from_str_radix(&s[2..], 16).expect(&format!("Hex string {s} should parse as u64"))
    }
}

/// Implement the trait ConfigValue for bool.
///
/// # Parameters
/// * `bool` - Type of the configuration value.
impl ConfigValue for bool {
    fn parse_value(s: &str) -> Self {
        s.parse::<bool>()
            .expect(&format!("{s} should parse as bool"))
    }
}

/// Get the configuation from the file.
///
/// # Parameters
/// * `filepath` - Path to the config file.
///
/// # Returns
/// The configuration.
pub fn get_config(filepath: &Path) -> Config {
    let name = filepath
        .to_str()
        .expect(&format!("Should have the file name in the {:?}", filepath));

    Config::builder()
        .add_source(config::File::with_name(name))
        .build()
        .expect(&format!("Should be able to read the {name}"))
}

/// Get the parameter from the file.
///
/// # Parameters
/// * `filepath` - Path to the config file.
/// * `key` - Key to find the parameter in the config file.
///
/// # Returns
/// The parameter.
pub fn get_parameter<T: ConfigValue>(filepath: &Path, key: &str) -> T {
    let config = get_config(filepath);

    config
        .get_string(key)
        .map(|v| T::parse_value(&v))
        .expect(&format!("Should find the {key} in the {:?}", filepath))
}

/// Get the array parameter from the file.
///
/// # Parameters
/// * `filepath` - Path to the config file.
/// * `key` - Key to find the parameter in the config file.
///
/// # Returns
/// The array parameter.
pub fn get_parameter_array<T: ConfigValue>(filepath: &Path, key: &str) -> Vec<T> {
    let config = get_config(filepath);
    let config_array = config
        .get_array(key)
        .expect(&format!("Should find the {key} in the {:?}", filepath));

    config_array
        .iter()
        .map(|x| T::parse_value(&x.clone().into_string().expect("Should be a string")))
        .collect()
}

/// Assert that two vectors are equal within a relative tolerance.
///
/// # Parameters
/// * `v1` - First vector.
/// * `v2` - Second vector.
/// * `epsilon` - Relative tolerance.
///
/// # Panics
/// If the two vectors are not equal within the relative tolerance.
pub fn assert_relative_eq_vector(v1: &[f64], v2: &[f64], epsilon: f64) {
    assert_eq!(v1.len(), v2.len());
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert_relative_eq!(a, b, epsilon = epsilon);
    }
}

/// Check if the message is a command.
///
/// # Arguments
/// * `name` - Name of the message.
///
/// # Returns
/// True if the message is a command, false otherwise.
pub fn is_command(name: &str) -> bool {
    name.starts_with("cmd_")
}

/// Acknowledge the command.
///
/// # Arguments
/// * `command_status` - Command status.
/// * `sequence_id` - Sequence ID.
///
/// # Returns
/// Acknowledged command.
pub fn acknowledge_command(command_status: CommandStatus, sequence_id: i64) -> Value {
    json!({"id": command_status.as_ref().to_lowercase(), "sequence_id": sequence_id})
}

/// Get the message name.
///
/// # Arguments
/// * `message` - Message that should have the "id" field.
///
/// # Returns
/// Message name. Return an empty string if the name is not found.
pub fn get_message_name(message: &Value) -> String {
    match message["id"].as_str() {
        Some(id) => String::from(id),
        None => String::new(),
    }
}

/// Get the message sequence ID.
///
/// # Arguments
/// * `message` - Message.
///
/// # Returns
/// Message sequence ID. Return -1 if the sequence ID is not found.
pub fn get_message_sequence_id(message: &Value) -> i64 {
    match message["sequence_id"].as_i64() {
        Some(sequence_id) => sequence_id,
        None => -1,
    }
}

/// Get the system time in milliseconds.
///
/// # Returns
/// System time in milliseconds since the UNIX epoch. Return 0 if fail.
pub fn get_system_time_ms() -> u64 {
    let now = SystemTime::now();
    match now.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis() as u64,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use std::f64::EPSILON;

    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_get_config() {
        let filepath = Path::new("config/parameters_control.yaml");
        let control_frequency = get_config(filepath).get_float("control_frequency").unwrap();

        assert_relative_eq!(control_frequency, 5.0, epsilon = EPSILON);
    }

    #[test]
    fn test_get_parameter() {
        let settings_file: String = get_parameter(
            Path::new("config/parameters_control.yaml"),
            "settings_file",
        );

        assert_eq!(settings_file, "config/persisted_settings.json");

        let control_frequency: f64 = get_parameter(
            Path::new("config/parameters_control.yaml"),
            "control_frequency",
        );

        assert_relative_eq!(control_frequency, 5.0, epsilon = EPSILON);

        let max_stale_ticks: i32 = get_parameter(
            Path::new("config/parameters_control.yaml"),
            "max_stale_ticks",
        );

        assert_eq!(max_stale_ticks, 5);

        let enabled_faults_mask: u64 = get_parameter(
            Path::new("config/parameters_control.yaml"),
            "enabled_faults_mask",
        );

        assert_eq!(enabled_faults_mask, 0x7f);
    }

    #[test]
    #[should_panic(expected = "Should be able to read the wrong.yaml")]
    fn test_get_config_panic() {
        get_config(Path::new("wrong.yaml"));
    }

    #[test]
    fn test_get_parameter_array() {
        let gains: Vec<f64> = get_parameter_array(
            Path::new("config/parameters_control.yaml"),
            "default_gains_heater",
        );

        assert_relative_eq_vector(&gains, &vec![1.4, 0.2, 0.8], EPSILON);
    }

    #[test]
    fn test_assert_relative_eq_vector() {
        assert_relative_eq_vector(&vec![1.0, 2.0, 3.0], &vec![1.0, 2.0, 3.0], EPSILON);
    }

    #[test]
    fn test_is_command() {
        assert_eq!(is_command("cmd_test"), true);
        assert_eq!(is_command("evt_test"), false);
        assert_eq!(is_command("test"), false);
    }

    #[test]
    fn test_acknowledge_command() {
        assert_eq!(
            acknowledge_command(CommandStatus::Success, 1),
            json!({"id": "success", "sequence_id": 1})
        );
        assert_eq!(
            acknowledge_command(CommandStatus::Fail, 2),
            json!({"id": "fail", "sequence_id": 2})
        );
        assert_eq!(
            acknowledge_command(CommandStatus::Ack, 3),
            json!({"id": "ack", "sequence_id": 3})
        );
        assert_eq!(
            acknowledge_command(CommandStatus::NoAck, 4),
            json!({"id": "noack", "sequence_id": 4})
        );
    }

    #[test]
    fn test_get_message_name() {
        // There is the "id" field.
        assert_eq!(get_message_name(&json!({"id": "cmd_test"})), "cmd_test");
        assert_eq!(get_message_name(&json!({"id": 1})), "");

        // There is no "id" field.
        assert_eq!(get_message_name(&json!({})), "");
        assert_eq!(get_message_name(&json!({"test": 1})), "");
    }

    #[test]
    fn test_get_message_sequence_id() {
        // There is the "sequence_id" field.
        assert_eq!(get_message_sequence_id(&json!({"sequence_id": 1})), 1);
        assert_eq!(get_message_sequence_id(&json!({"sequence_id": 1.0})), -1);

        // There is no "sequence_id" field.
        assert_eq!(get_message_sequence_id(&json!({})), -1);
        assert_eq!(get_message_sequence_id(&json!({"test": 1})), -1);
    }

    #[test]
    fn test_get_system_time_ms() {
        assert!(get_system_time_ms() > 0);
    }
}
