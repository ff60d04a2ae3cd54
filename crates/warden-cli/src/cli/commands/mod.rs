pub mod doctor;
pub mod key;
pub mod otp;
pub mod policy;
pub mod session;

mod dispatch;
pub use dispatch::dispatch;
