/// Size of the buffer handed to every underlying read.
pub const RECV_BUFFER_SIZE: usize = 4 * 1024;

/// Port used when an address string carries none.
pub const DEFAULT_PORT: u16 = 443;
