pub mod gateway;
pub mod memory;
pub mod rpc;
pub mod submitter;
pub mod sync;
