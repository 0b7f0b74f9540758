//! HTTP request handlers

pub mod result;

pub use result::receive_result_handler;
