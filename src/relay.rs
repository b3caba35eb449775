//! Relay outputs driven from MQTT actions.
use embedded_hal::digital::{OutputPin, StatefulOutputPin};
use log::{info, warn};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("gpio error while driving relay")]
    Pin,
    #[error("payload is not an integer")]
    InvalidPayload,
}

/// Something the control surface can switch and read back.
pub trait Actuator {
    fn set_state(&mut self, on: bool) -> Result<(), RelayError>;
    fn get_state(&mut self) -> Result<bool, RelayError>;

    /// Applies an action payload: `1` switches on, any other integer off.
    fn apply_payload(&mut self, payload: &[u8]) -> Result<(), RelayError> {
        let on = parse_switch(payload)?;
        self.set_state(on)
    }
}

fn parse_switch(payload: &[u8]) -> Result<bool, RelayError> {
    let text = core::str::from_utf8(payload).map_err(|_| RelayError::InvalidPayload)?;
    let value: i64 = text.trim().parse().map_err(|_| RelayError::InvalidPayload)?;
    Ok(value == 1)
}

/// A relay on a push-pull output, optionally active low.
pub struct Relay<P> {
    pin: P,
    inverted: bool,
}

impl<P: StatefulOutputPin> Relay<P> {
    /// Takes the pin and switches the relay off.
    pub fn new(pin: P, inverted: bool) -> Result<Self, RelayError> {
        let mut relay = Relay { pin, inverted };
        relay.off()?;
        Ok(relay)
    }

    pub fn on(&mut self) -> Result<(), RelayError> {
        self.drive(true)
    }

    pub fn off(&mut self) -> Result<(), RelayError> {
        self.drive(false)
    }

    pub fn toggle(&mut self) -> Result<(), RelayError> {
        if self.state()? {
            self.off()
        } else {
            self.on()
        }
    }

    /// Logical state, inversion already applied.
    pub fn state(&mut self) -> Result<bool, RelayError> {
        let high = self.pin.is_set_high().map_err(|_| RelayError::Pin)?;
        Ok(high != self.inverted)
    }

    fn drive(&mut self, on: bool) -> Result<(), RelayError> {
        let high = on != self.inverted;
        let res = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        res.map_err(|_| {
            warn!("relay: failed to drive output {}", if on { "on" } else { "off" });
            RelayError::Pin
        })?;
        info!("relay: switched {}", if on { "on" } else { "off" });
        Ok(())
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: StatefulOutputPin> Actuator for Relay<P> {
    fn set_state(&mut self, on: bool) -> Result<(), RelayError> {
        self.drive(on)
    }

    fn get_state(&mut self) -> Result<bool, RelayError> {
        self.state()
    }
}
