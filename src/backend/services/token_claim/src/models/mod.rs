pub mod account;
pub mod call;
pub mod rate;
pub mod receipt;
pub mod session;
pub mod token;
