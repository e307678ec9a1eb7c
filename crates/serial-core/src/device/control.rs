//! Control-plane access to the device file descriptor.
//!
//! The setup procedures in [`super::setup`] never issue syscalls directly.
//! They speak through the [`DeviceControl`] trait, so the per-kind logic can
//! be exercised in tests against a recording fake or a [`mockall`] mock
//! instead of a real device node. [`FdControl`] is the production
//! implementation backed by termios and `ioctl(2)`.

use std::io;
use std::os::fd::RawFd;

/// Line settings pushed to a plain UART via termios.
///
/// The control-character table is cleared entirely apart from the three
/// fields carried here, which disables every special input function except
/// end-of-file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    /// `c_iflag` bits (e.g. `IGNPAR`).
    pub input_flags: u32,
    /// `c_oflag` bits; zero disables all output processing.
    pub output_flags: u32,
    /// `c_cflag` bits (character size, flow control, modem handling).
    pub control_flags: u32,
    /// `c_lflag` bits; `ICANON` for cooked mode, zero for raw.
    pub local_flags: u32,
    /// Baud rate constant (a `B*` value), applied to both directions.
    pub speed: u32,
    /// `c_cc[VEOF]`.
    pub eof_char: u8,
    /// `c_cc[VMIN]` – minimum bytes before a read returns.
    pub min_read: u8,
    /// `c_cc[VTIME]` – inter-character timeout in deciseconds.
    pub read_timeout: u8,
}

/// Operating mode of the high-speed UART driver, as read from and written
/// back to the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct UartMode {
    /// Line speed in bits per second.
    pub speed: u32,
    /// Parity and flow-control bits (`HSUART_MODE_*`).
    pub flags: u32,
}

/// Tunable parameter of the CY8MRLN touch panel controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorParam {
    ScanRate,
    Verbose,
    TimestampMode,
    SleepMode,
    WotScanRate,
    WotThreshold,
}

/// Operations a setup procedure may perform on an opened device fd.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceControl {
    /// Replaces the termios state with `settings` (immediately, `TCSANOW`).
    fn set_line_settings(&mut self, settings: &LineSettings) -> io::Result<()>;

    /// Discards input received but not yet read (`TCIFLUSH`).
    fn flush_input(&mut self) -> io::Result<()>;

    /// Raises the given modem-control lines (`TIOCM_*` bits).
    fn raise_modem_lines(&mut self, lines: i32) -> io::Result<()>;

    /// Drops pending data from the high-speed UART queues and FIFOs selected
    /// by `mask` (`HSUART_RX_QUEUE` etc.).
    fn flush_uart_queues(&mut self, mask: u32) -> io::Result<()>;

    /// Reads the current high-speed UART operating mode.
    fn uart_mode(&mut self) -> io::Result<UartMode>;

    /// Writes the high-speed UART operating mode.
    fn set_uart_mode(&mut self, mode: &UartMode) -> io::Result<()>;

    /// Turns hardware receive flow control on or off.
    fn set_rx_flow(&mut self, enabled: bool) -> io::Result<()>;

    /// Sets one CY8MRLN controller parameter.
    fn set_sensor_param(&mut self, param: SensorParam, value: i32) -> io::Result<()>;
}

// ── ioctl request constants ───────────────────────────────────────────────────
//
// Linux `_IOC` encoding: direction in bits 30-31 (1 = write, 2 = read),
// argument size in bits 16-29, type byte in bits 8-15, sequence number in
// bits 0-7.

const fn ioc(dir: libc::c_ulong, ty: u8, nr: u8, size: usize) -> libc::c_ulong {
    (dir << 30) | ((size as libc::c_ulong) << 16) | ((ty as libc::c_ulong) << 8) | nr as libc::c_ulong
}

/// `_IOW(ty, nr, T)`
const fn iow(ty: u8, nr: u8, size: usize) -> libc::c_ulong {
    ioc(1, ty, nr, size)
}

/// `_IOR(ty, nr, T)`
const fn ior(ty: u8, nr: u8, size: usize) -> libc::c_ulong {
    ioc(2, ty, nr, size)
}

const INT_SIZE: usize = std::mem::size_of::<libc::c_int>();

// Requests understood by the webOS `hsuart` high-speed UART driver.
// Values mirror `<linux/hsuart.h>` from the Palm kernel tree.
pub const HSUART_IOCTL_GET_UARTMODE: libc::c_ulong =
    ior(b'h', 0x02, std::mem::size_of::<UartMode>());
pub const HSUART_IOCTL_SET_UARTMODE: libc::c_ulong =
    iow(b'h', 0x03, std::mem::size_of::<UartMode>());
pub const HSUART_IOCTL_FLUSH: libc::c_ulong = iow(b'h', 0x05, INT_SIZE);
pub const HSUART_IOCTL_RX_FLOW: libc::c_ulong = iow(b'h', 0x06, INT_SIZE);

/// Queue/FIFO selectors for [`HSUART_IOCTL_FLUSH`].
pub const HSUART_RX_QUEUE: u32 = 0x01;
pub const HSUART_TX_QUEUE: u32 = 0x02;
pub const HSUART_RX_FIFO: u32 = 0x04;
pub const HSUART_TX_FIFO: u32 = 0x08;

/// Parity and flow-control fields of [`UartMode::flags`].
pub const HSUART_MODE_PARITY_NONE: u32 = 0x0;
pub const HSUART_MODE_PARITY_MASK: u32 = 0x3;
pub const HSUART_MODE_FLOW_CTRL_HW: u32 = 0x4;
pub const HSUART_MODE_FLOW_CTRL_MASK: u32 = 0xC;

// Requests understood by the CY8MRLN touch panel driver.
// Values mirror tslib's `cy8mrln-palmpre` plugin header.
pub const CY8MRLN_IOCTL_SET_SCANRATE: libc::c_ulong = iow(b'c', 0x08, INT_SIZE);
pub const CY8MRLN_IOCTL_SET_SLEEPMODE: libc::c_ulong = iow(b'c', 0x09, INT_SIZE);
pub const CY8MRLN_IOCTL_SET_VERBOSE_MODE: libc::c_ulong = iow(b'c', 0x0e, INT_SIZE);
pub const CY8MRLN_IOCTL_SET_TIMESTAMP_MODE: libc::c_ulong = iow(b'c', 0x17, INT_SIZE);
pub const CY8MRLN_IOCTL_SET_WOT_THRESHOLD: libc::c_ulong = iow(b'c', 0x1d, INT_SIZE);
pub const CY8MRLN_IOCTL_SET_WOT_SCANRATE: libc::c_ulong = iow(b'c', 0x22, INT_SIZE);

/// CY8MRLN PSoC power states.
pub const CY8MRLN_ON_STATE: i32 = 2;

/// CY8MRLN wake-on-touch scan rate indices.
pub const WOT_SCANRATE_512HZ: i32 = 0;

impl SensorParam {
    fn request(self) -> libc::c_ulong {
        match self {
            SensorParam::ScanRate => CY8MRLN_IOCTL_SET_SCANRATE,
            SensorParam::Verbose => CY8MRLN_IOCTL_SET_VERBOSE_MODE,
            SensorParam::TimestampMode => CY8MRLN_IOCTL_SET_TIMESTAMP_MODE,
            SensorParam::SleepMode => CY8MRLN_IOCTL_SET_SLEEPMODE,
            SensorParam::WotScanRate => CY8MRLN_IOCTL_SET_WOT_SCANRATE,
            SensorParam::WotThreshold => CY8MRLN_IOCTL_SET_WOT_THRESHOLD,
        }
    }
}

// ── Production implementation ─────────────────────────────────────────────────

/// [`DeviceControl`] over a borrowed raw file descriptor.
///
/// Does not own the fd; the caller keeps it open for the lifetime of this
/// handle (setup runs before the fd is handed to the reactor).
pub struct FdControl {
    fd: RawFd,
}

impl FdControl {
    pub fn new(fd: RawFd) -> Self {
        Self { fd }
    }
}

fn cvt(rv: libc::c_int) -> io::Result<()> {
    if rv == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl DeviceControl for FdControl {
    fn set_line_settings(&mut self, settings: &LineSettings) -> io::Result<()> {
        let mut t: libc::termios = unsafe { std::mem::zeroed() };
        t.c_iflag = settings.input_flags as libc::tcflag_t;
        t.c_oflag = settings.output_flags as libc::tcflag_t;
        t.c_cflag = settings.control_flags as libc::tcflag_t;
        t.c_lflag = settings.local_flags as libc::tcflag_t;
        t.c_cc[libc::VEOF] = settings.eof_char as libc::cc_t;
        t.c_cc[libc::VMIN] = settings.min_read as libc::cc_t;
        t.c_cc[libc::VTIME] = settings.read_timeout as libc::cc_t;
        unsafe {
            cvt(libc::cfsetispeed(&mut t, settings.speed as libc::speed_t))?;
            cvt(libc::cfsetospeed(&mut t, settings.speed as libc::speed_t))?;
            cvt(libc::tcsetattr(self.fd, libc::TCSANOW, &t))
        }
    }

    fn flush_input(&mut self) -> io::Result<()> {
        unsafe { cvt(libc::tcflush(self.fd, libc::TCIFLUSH)) }
    }

    fn raise_modem_lines(&mut self, lines: i32) -> io::Result<()> {
        let bits: libc::c_int = lines;
        unsafe { cvt(libc::ioctl(self.fd, libc::TIOCMBIS as libc::c_ulong, &bits)) }
    }

    fn flush_uart_queues(&mut self, mask: u32) -> io::Result<()> {
        let arg: libc::c_int = mask as libc::c_int;
        unsafe { cvt(libc::ioctl(self.fd, HSUART_IOCTL_FLUSH, &arg)) }
    }

    fn uart_mode(&mut self) -> io::Result<UartMode> {
        let mut mode = UartMode { speed: 0, flags: 0 };
        unsafe { cvt(libc::ioctl(self.fd, HSUART_IOCTL_GET_UARTMODE, &mut mode))? };
        Ok(mode)
    }

    fn set_uart_mode(&mut self, mode: &UartMode) -> io::Result<()> {
        unsafe { cvt(libc::ioctl(self.fd, HSUART_IOCTL_SET_UARTMODE, mode)) }
    }

    fn set_rx_flow(&mut self, enabled: bool) -> io::Result<()> {
        let arg: libc::c_int = if enabled { 1 } else { 0 };
        unsafe { cvt(libc::ioctl(self.fd, HSUART_IOCTL_RX_FLOW, &arg)) }
    }

    fn set_sensor_param(&mut self, param: SensorParam, value: i32) -> io::Result<()> {
        let arg: libc::c_int = value;
        unsafe { cvt(libc::ioctl(self.fd, param.request(), &arg)) }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iow_matches_kernel_encoding_for_int() {
        // _IOW('c', 0x08, int) on x86-64: dir=1, size=4, type='c', nr=0x08
        let expected = (1u64 << 30) | (4u64 << 16) | ((b'c' as u64) << 8) | 0x08;
        assert_eq!(CY8MRLN_IOCTL_SET_SCANRATE as u64, expected);
    }

    #[test]
    fn test_ior_sets_read_direction_bit() {
        assert_eq!(HSUART_IOCTL_GET_UARTMODE as u64 >> 30, 2);
        assert_eq!(HSUART_IOCTL_SET_UARTMODE as u64 >> 30, 1);
    }

    #[test]
    fn test_uart_mode_has_c_layout_of_two_words() {
        // The GET/SET ioctls move this struct across the kernel boundary;
        // it must stay two packed 32-bit words.
        assert_eq!(std::mem::size_of::<UartMode>(), 8);
    }

    #[test]
    fn test_sensor_param_requests_are_distinct() {
        let all = [
            SensorParam::ScanRate,
            SensorParam::Verbose,
            SensorParam::TimestampMode,
            SensorParam::SleepMode,
            SensorParam::WotScanRate,
            SensorParam::WotThreshold,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.request(), b.request(), "{a:?} and {b:?} share a request");
            }
        }
    }
}
