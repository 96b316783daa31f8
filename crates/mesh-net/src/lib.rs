pub mod endpoint;
pub mod frame;
pub mod recv_buffer;
pub mod tcp;
