pub mod exchange;
pub mod messaging;
pub mod review;
pub mod session;
