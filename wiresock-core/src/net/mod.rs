pub mod address;
pub mod io;
pub mod socket;
pub mod transport;
