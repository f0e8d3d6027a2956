pub mod archive_op;
pub mod op_helper;
pub mod probe_op;
pub mod run_op;
pub mod sweep_op;
