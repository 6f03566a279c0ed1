//! Endpoint address allocation within one configuration.

use crate::error::Error;
use crate::usb::{Direction, EndpointAddr, EndpointNum, MAX_ENDPOINTS};

/// An allocated endpoint and the symbol naming it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// `EPNUM_<TAG>_<FIELD>`.
    pub symbol: String,
    pub addr: EndpointAddr,
}

/// Hands out endpoint numbers so that each number carries at most one
/// IN and one OUT endpoint.
///
/// A new number is only taken when the current one already holds an
/// endpoint of the requested direction, so a CDC data pair shares a slot.
#[derive(Debug)]
pub struct EndpointAllocator {
    counter: usize,
    last_in: usize,
    last_out: usize,
}

impl Default for EndpointAllocator {
    fn default() -> Self {
        EndpointAllocator::new()
    }
}

impl EndpointAllocator {
    pub fn new() -> EndpointAllocator {
        EndpointAllocator {
            counter: 1,
            last_in: 0,
            last_out: 0,
        }
    }

    pub fn allocate(&mut self, direction: Direction) -> EndpointAddr {
        let last = match direction {
            Direction::In => &mut self.last_in,
            Direction::Out => &mut self.last_out,
        };
        if self.counter == *last {
            self.counter += 1;
        }
        *last = self.counter;
        EndpointAddr::from_parts(EndpointNum((self.counter & 0x7F) as u8), direction)
    }

    /// Endpoint numbers in use, counting endpoint 0.
    pub fn slots(&self) -> usize {
        self.counter + 1
    }

    /// Check the configuration fits in the available endpoints.
    pub fn finish(&self, config: &str) -> Result<(), Error> {
        let slots = self.slots();
        if slots > MAX_ENDPOINTS {
            return Err(Error::TooManyEndpoints {
                config: config.to_string(),
                slots,
                max: MAX_ENDPOINTS,
            });
        }
        Ok(())
    }
}
