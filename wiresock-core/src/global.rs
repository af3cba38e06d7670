use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::{TcpTransport, Transport};

lazy_static! {
    static ref TRANSPORT: Mutex<Option<Arc<dyn Transport>>> = Default::default();
}

// transport

/// Transport used by [`connect`](crate::connect); a [`TcpTransport`] trusting
/// the web PKI roots unless replaced.
pub fn get_transport() -> Arc<dyn Transport> {
    let mut transport = TRANSPORT.lock();
    transport
        .get_or_insert_with(|| Arc::new(TcpTransport::default()))
        .clone()
}

pub fn set_transport(transport: Arc<dyn Transport>) {
    let mut global = TRANSPORT.lock();
    *global = Some(transport);
}
