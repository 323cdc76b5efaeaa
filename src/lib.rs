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

//! # FrED Control System
//!
//! This library is the closed-loop control core of the fiber extrusion
//! device (FrED): a periodic scheduler that reads the camera-derived
//! fiber diameter and the rig's sensor channels, advances one PID loop
//! per control channel, and drives the actuator outputs with
//! calibration, open-loop override, and safety interlocks.
pub mod application;
pub mod command;
pub mod config;
pub mod constants;
pub mod control;
pub mod enums;
pub mod error_handler;
pub mod event_queue;
pub mod interface;
pub mod measurement;
pub mod mock;
pub mod model;
pub mod settings;
pub mod telemetry;
pub mod utility;
