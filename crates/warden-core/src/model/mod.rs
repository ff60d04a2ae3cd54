pub mod app;
pub mod device;
pub mod policy;
pub mod session;

pub use app::{App, AppType};
pub use device::{ApprovalRequestInfo, Device, Notification, NotificationType};
pub use policy::{Policy, Rule, RuleAction, Task};
pub use session::{
    Session, SessionDeviceOtp, OTP_DELAY_WINDOW_SECONDS, OTP_VALUE_LENGTH,
    SESSION_DEVICE_OTP_DURATION,
};
