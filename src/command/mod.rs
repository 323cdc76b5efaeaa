pub mod command_control_loop;
pub mod command_schema;
