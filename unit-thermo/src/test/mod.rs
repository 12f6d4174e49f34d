mod timer_mock;

pub(crate) use i2c_mock::{I2cOperation, MockRegisterBus};
pub(crate) use timer_mock::MockTimer;
