//! 领域层

pub mod credential;
pub mod delegation;
pub mod lockout;
pub mod role;
pub mod unit_of_work;
