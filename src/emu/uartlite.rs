use axerrno::{AxError, AxResult};
use log::{info, warn};
use spin::Mutex;

use crate::descriptor::UartDescriptor;
use crate::driver::ConsoleDriver;

const UARTLITE_RX: usize = 0x0;
const UARTLITE_TX: usize = 0x4;
const UARTLITE_STAT: usize = 0x8;
const UARTLITE_CTRL: usize = 0xc;

const STAT_RX_VALID: u32 = 1 << 0;
const STAT_TX_FULL: u32 = 1 << 3;
const STAT_INTR_ENABLED: u32 = 1 << 4;

const CTRL_RST_TX: u32 = 1 << 0;
const CTRL_RST_RX: u32 = 1 << 1;
const CTRL_ENABLE_INTR: u32 = 1 << 4;

const TX_CAPACITY: usize = 256;

/// AXI UART-lite model. Transmitted bytes collect in a bounded buffer;
/// the TX FIFO reports full once it is exhausted.
pub struct EmuUartLite {
    pub base_addr: usize,
    inner: Mutex<UartInner>,
}

struct UartInner {
    ready: bool,
    ctrl: u32,
    rx: Option<u8>,
    tx: [u8; TX_CAPACITY],
    tx_len: usize,
}

impl EmuUartLite {
    pub fn new(base_addr: usize) -> Self {
        Self {
            base_addr,
            inner: Mutex::new(UartInner {
                ready: false,
                ctrl: 0,
                rx: None,
                tx: [0; TX_CAPACITY],
                tx_len: 0,
            }),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.lock().ready
    }

    pub fn status(&self) -> u32 {
        let inner = self.inner.lock();
        let mut stat = 0;
        if inner.rx.is_some() {
            stat |= STAT_RX_VALID;
        }
        if inner.tx_len == TX_CAPACITY {
            stat |= STAT_TX_FULL;
        }
        if inner.ctrl & CTRL_ENABLE_INTR != 0 {
            stat |= STAT_INTR_ENABLED;
        }
        stat
    }

    pub fn write_ctrl(&self, val: u32) {
        let mut inner = self.inner.lock();
        if val & CTRL_RST_TX != 0 {
            inner.tx_len = 0;
        }
        if val & CTRL_RST_RX != 0 {
            inner.rx = None;
        }
        inner.ctrl = val & CTRL_ENABLE_INTR;
    }

    pub fn putchar(&self, byte: u8) -> AxResult {
        let mut inner = self.inner.lock();
        if !inner.ready {
            return Err(AxError::BadState);
        }
        if inner.tx_len == TX_CAPACITY {
            return Err(AxError::WouldBlock);
        }
        let len = inner.tx_len;
        inner.tx[len] = byte;
        inner.tx_len += 1;
        Ok(())
    }

    pub fn puts(&self, s: &str) -> AxResult {
        s.bytes().try_for_each(|b| self.putchar(b))
    }

    /// Latches a byte into the receive register, dropping any unread one.
    pub fn feed(&self, byte: u8) {
        self.inner.lock().rx = Some(byte);
    }

    pub fn getchar(&self) -> Option<u8> {
        self.inner.lock().rx.take()
    }

    /// Register read at `offset` from the device base.
    pub fn read_reg(&self, offset: usize) -> u32 {
        match offset {
            UARTLITE_RX => self.getchar().map_or(0, u32::from),
            UARTLITE_STAT => self.status(),
            _ => 0,
        }
    }

    /// Register write at `offset` from the device base. A write to a full
    /// TX FIFO is dropped, as on hardware.
    pub fn write_reg(&self, offset: usize, val: u32) {
        match offset {
            UARTLITE_TX => match self.putchar(val as u8) {
                Ok(()) | Err(AxError::WouldBlock) => {}
                Err(err) => warn!("uartlite: tx write dropped: {err:?}"),
            },
            UARTLITE_CTRL => self.write_ctrl(val),
            _ => {}
        }
    }

    pub fn with_output<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.tx[..inner.tx_len])
    }
}

impl ConsoleDriver for EmuUartLite {
    fn init(&self, desc: &UartDescriptor) -> AxResult {
        if desc.base.as_usize() != self.base_addr || desc.baud_rate == 0 {
            return Err(AxError::InvalidInput);
        }
        if self.is_ready() {
            return Err(AxError::AlreadyExists);
        }
        self.write_ctrl(CTRL_RST_TX | CTRL_RST_RX);
        self.inner.lock().ready = true;
        info!(
            "EmuUartLite@{:#x}: {} baud from {} Hz",
            self.base_addr, desc.baud_rate, desc.input_frequency
        );
        Ok(())
    }
}
