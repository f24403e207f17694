// Wed Aug 05 2026 - Alex

pub mod logging;
pub mod timing;

pub use logging::LoggingUtils;
pub use timing::ServiceTimes;
