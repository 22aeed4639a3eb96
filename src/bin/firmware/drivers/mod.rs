pub mod ahrs;
pub mod dshot;
pub mod icm42688;
pub mod spl06;
