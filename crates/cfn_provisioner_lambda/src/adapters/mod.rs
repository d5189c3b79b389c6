use std::future::Future;

pub mod catalog;
pub mod cluster;
pub mod http;
pub mod identity;
pub mod object_store;

/// Drives an async SDK or HTTP call from a synchronous adapter method.
///
/// Must run on a multi-threaded tokio runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
