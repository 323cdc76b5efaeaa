// This file is part of fred_controller.
//
// Developed for the FrED fiber extrusion device.
// See the COPYRIGHT file at the top-level directory of this distribution
// for details of code ownership.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use csv::Writer;
use log::warn;
use serde_json::Value;
use std::fs::File;
use std::path::Path;

/// Sink of the telemetry messages. The push is fire-and-forget: a failing
/// sink logs and drops, it never propagates back to the scheduler.
pub trait TelemetrySink {
    /// Push the telemetry messages.
    ///
    /// # Arguments
    /// * `messages` - Telemetry messages.
    fn push(&mut self, messages: &[Value]);
}

/// CSV sink that records the per-tick channel tuples.
pub struct CsvTelemetrySink {
    // CSV writer.
    _writer: Writer<File>,
}

impl CsvTelemetrySink {
    /// Create a new CSV sink.
    ///
    /// # Arguments
    /// * `filepath` - Path of the CSV file to create.
    ///
    /// # Returns
    /// A new CSV sink.
    ///
    /// # Errors
    /// If the file cannot be created or the header cannot be written.
    pub fn new(filepath: &Path) -> Result<Self, csv::Error> {
        let mut writer = Writer::from_path(filepath)?;
        writer.write_record(&[
            "timestamp",
            "channel",
            "mode",
            "setpoint",
            "measured",
            "output",
        ])?;
        writer.flush()?;

        Ok(Self { _writer: writer })
    }
}

impl TelemetrySink for CsvTelemetrySink {
    fn push(&mut self, messages: &[Value]) {
        for message in messages {
            if message["id"] != "channelState" {
                continue;
            }

            let record = [
                message["timestamp"].to_string(),
                String::from(message["channel"].as_str().unwrap_or("")),
                message["mode"].to_string(),
                message["setpoint"].to_string(),
                message["measured"].to_string(),
                message["output"].to_string(),
            ];

            if let Err(csv_error) = self._writer.write_record(&record) {
                warn!("Failed to write the telemetry record: {csv_error}.");

                return;
            }
        }

        if let Err(io_error) = self._writer.flush() {
            warn!("Failed to flush the telemetry file: {io_error}.");
        }
    }
}
