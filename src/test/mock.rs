// SPDX-License-Identifier: Apache-2.0
extern crate alloc;
extern crate std;

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use std::collections::BTreeMap;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;

use crate::common::{PowerControl, SensorVariant};
use crate::driver::Imx294;

/// Device address used by every test; deliberately not a "round" value so
/// no code path can get away with hardcoding one.
pub(crate) const TEST_DEVICE_ADDRESS: u8 = 0x1A;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MockBusError {
    /// The transfer addressed a different device.
    WrongDeviceAddress(u8),

    /// A failure injected with [`MockSensorBus::fail_writes_at`].
    InjectedFailure(u16),

    /// The transfer doesn't look like an address-prefixed register access.
    MalformedTransfer,
}

/// One bus transaction, as seen by the mock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum BusOp {
    Write { address: u16, data: Vec<u8> },
    Read { address: u16, length: usize },
}

#[derive(Debug, Default)]
struct BusState {
    registers: BTreeMap<u16, u8>,
    operations: Vec<BusOp>,
    fail_writes_at: Option<u16>,
}

/// Mock register bus backing a byte-per-address register file.
///
/// Clones share state, so a test can keep a handle for inspection after
/// moving the "bus" into the driver. Multi-byte writes land on consecutive
/// addresses, mirroring how the sensor's little-endian register groups are
/// laid out; unwritten registers read back as zero (which is also the
/// correct chip ID).
#[derive(Clone, Debug)]
pub(crate) struct MockSensorBus {
    device_address: u8,
    state: Rc<RefCell<BusState>>,
}

impl MockSensorBus {
    pub(crate) fn new(device_address: u8) -> Self {
        Self {
            device_address,
            state: Rc::new(RefCell::new(BusState::default())),
        }
    }

    pub(crate) fn set_register(&self, address: u16, value: u8) {
        self.state.borrow_mut().registers.insert(address, value);
    }

    pub(crate) fn register(&self, address: u16) -> u8 {
        *self.state.borrow().registers.get(&address).unwrap_or(&0)
    }

    /// Little-endian readback of a two-byte register group.
    pub(crate) fn register_u16(&self, address: u16) -> u16 {
        u16::from_le_bytes([self.register(address), self.register(address + 1)])
    }

    /// Little-endian readback of a three-byte register group.
    pub(crate) fn register_u24(&self, address: u16) -> u32 {
        u32::from_le_bytes([
            self.register(address),
            self.register(address + 1),
            self.register(address + 2),
            0,
        ])
    }

    pub(crate) fn operations(&self) -> Vec<BusOp> {
        self.state.borrow().operations.clone()
    }

    pub(crate) fn clear_operations(&self) {
        self.state.borrow_mut().operations.clear();
    }

    /// Number of write transactions that targeted the given register.
    pub(crate) fn writes_to(&self, address: u16) -> usize {
        self.state
            .borrow()
            .operations
            .iter()
            .filter(|op| matches!(op, BusOp::Write { address: a, .. } if *a == address))
            .count()
    }

    /// Make every write to `address` fail until cleared with `None`.
    ///
    /// Failed writes are neither recorded nor applied, like a transfer that
    /// never made it onto the wire.
    pub(crate) fn fail_writes_at(&self, address: Option<u16>) {
        self.state.borrow_mut().fail_writes_at = address;
    }
}

impl i2c::Write for MockSensorBus {
    type Error = MockBusError;

    fn write(&mut self, device_address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if device_address != self.device_address {
            return Err(MockBusError::WrongDeviceAddress(device_address));
        }
        if bytes.len() < 3 {
            return Err(MockBusError::MalformedTransfer);
        }
        let address = u16::from_be_bytes([bytes[0], bytes[1]]);
        let mut state = self.state.borrow_mut();
        if state.fail_writes_at == Some(address) {
            return Err(MockBusError::InjectedFailure(address));
        }
        for (offset, byte) in bytes[2..].iter().enumerate() {
            state.registers.insert(address + offset as u16, *byte);
        }
        state.operations.push(BusOp::Write {
            address,
            data: bytes[2..].to_vec(),
        });
        Ok(())
    }
}

impl i2c::WriteRead for MockSensorBus {
    type Error = MockBusError;

    fn write_read(
        &mut self,
        device_address: u8,
        write_buffer: &[u8],
        read_buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        if device_address != self.device_address {
            return Err(MockBusError::WrongDeviceAddress(device_address));
        }
        // Reads should only ever send the register address.
        if write_buffer.len() != 2 || read_buffer.is_empty() {
            return Err(MockBusError::MalformedTransfer);
        }
        let address = u16::from_be_bytes([write_buffer[0], write_buffer[1]]);
        let mut state = self.state.borrow_mut();
        state.operations.push(BusOp::Read {
            address,
            length: read_buffer.len(),
        });
        for (offset, byte) in read_buffer.iter_mut().enumerate() {
            *byte = *state
                .registers
                .get(&(address + offset as u16))
                .unwrap_or(&0);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PowerState {
    on_count: usize,
    off_count: usize,
    is_on: bool,
}

/// Mock power sequencer counting transitions.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockPower {
    state: Rc<RefCell<PowerState>>,
}

impl MockPower {
    pub(crate) fn on_count(&self) -> usize {
        self.state.borrow().on_count
    }

    pub(crate) fn off_count(&self) -> usize {
        self.state.borrow().off_count
    }

    pub(crate) fn is_on(&self) -> bool {
        self.state.borrow().is_on
    }
}

impl PowerControl for MockPower {
    type Error = core::convert::Infallible;

    fn power_on(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.on_count += 1;
        state.is_on = true;
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        state.off_count += 1;
        state.is_on = false;
        Ok(())
    }
}

/// Mock delay provider recording every requested pause.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockDelay {
    delays: Rc<RefCell<Vec<u8>>>,
}

impl MockDelay {
    pub(crate) fn delays(&self) -> Vec<u8> {
        self.delays.borrow().clone()
    }
}

impl DelayMs<u8> for MockDelay {
    fn delay_ms(&mut self, ms: u8) {
        self.delays.borrow_mut().push(ms);
    }
}

/// An attached driver plus inspection handles to all three mocks.
pub(crate) fn attached_sensor() -> (
    Imx294<MockSensorBus, MockPower, MockDelay>,
    MockSensorBus,
    MockPower,
    MockDelay,
) {
    let bus = MockSensorBus::new(TEST_DEVICE_ADDRESS);
    let power = MockPower::default();
    let delay = MockDelay::default();
    let sensor = Imx294::new(
        bus.clone(),
        TEST_DEVICE_ADDRESS,
        power.clone(),
        delay.clone(),
        SensorVariant::Imx294,
    )
    .expect("attaching to the mock sensor should succeed");
    (sensor, bus, power, delay)
}
