//! One-shot hardware setup procedures, one per [`DeviceKind`].
//!
//! Each procedure pushes absolute operating parameters, so applying one
//! twice leaves the device in the same mode. There is no shared state
//! between the kinds, only the shared [`SetupProcedure`] contract.

use std::io;

use super::control::{
    DeviceControl, LineSettings, CY8MRLN_ON_STATE, HSUART_MODE_FLOW_CTRL_HW,
    HSUART_MODE_FLOW_CTRL_MASK, HSUART_MODE_PARITY_MASK, HSUART_MODE_PARITY_NONE,
    HSUART_RX_FIFO, HSUART_RX_QUEUE, HSUART_TX_FIFO, HSUART_TX_QUEUE, WOT_SCANRATE_512HZ,
};
use super::DeviceKind;

/// A device-kind-specific setup procedure.
pub trait SetupProcedure: Sync {
    /// Pushes the operating parameters for this device kind.
    ///
    /// # Errors
    ///
    /// Any failing control operation aborts the procedure; the device is
    /// left untouched beyond the operations already applied.
    fn apply(&self, ctl: &mut dyn DeviceControl, raw_mode: bool) -> io::Result<()>;
}

/// Selects the setup procedure for `kind`.
pub fn procedure_for(kind: DeviceKind) -> &'static dyn SetupProcedure {
    match kind {
        DeviceKind::Serial => &PlainSerial,
        DeviceKind::HsUart => &HsUart,
        DeviceKind::Cy8mrln => &Cy8mrln,
    }
}

/// Line speed shared by both UART kinds.
const UART_BAUD: u32 = 115_200;

// ── Plain UART ────────────────────────────────────────────────────────────────

/// termios-programmed UART: 8N1 at 115200 with hardware flow control, modem
/// lines raised so the far side knows we are ready.
pub struct PlainSerial;

impl SetupProcedure for PlainSerial {
    fn apply(&self, ctl: &mut dyn DeviceControl, raw_mode: bool) -> io::Result<()> {
        let settings = LineSettings {
            input_flags: libc::IGNPAR as u32,
            output_flags: 0,
            control_flags: (libc::CRTSCTS | libc::CS8 | libc::CLOCAL | libc::CREAD) as u32,
            local_flags: if raw_mode { 0 } else { libc::ICANON as u32 },
            speed: libc::B115200 as u32,
            // ^D is the only special character left enabled.
            eof_char: 4,
            // Reads block until at least one byte arrives, no inter-character
            // timer.
            min_read: 1,
            read_timeout: 0,
        };

        ctl.flush_input()?;
        ctl.set_line_settings(&settings)?;
        ctl.raise_modem_lines(libc::TIOCM_DTR | libc::TIOCM_RTS)
    }
}

// ── High-speed UART ───────────────────────────────────────────────────────────

/// ioctl-programmed high-speed UART: drain every queue and FIFO, then
/// rewrite the speed, parity and flow-control fields of the current mode.
pub struct HsUart;

impl SetupProcedure for HsUart {
    fn apply(&self, ctl: &mut dyn DeviceControl, _raw_mode: bool) -> io::Result<()> {
        ctl.flush_uart_queues(
            HSUART_RX_QUEUE | HSUART_TX_QUEUE | HSUART_RX_FIFO | HSUART_TX_FIFO,
        )?;

        let mut mode = ctl.uart_mode()?;
        mode.speed = UART_BAUD;
        mode.flags &= !(HSUART_MODE_PARITY_MASK | HSUART_MODE_FLOW_CTRL_MASK);
        mode.flags |= HSUART_MODE_PARITY_NONE | HSUART_MODE_FLOW_CTRL_HW;
        ctl.set_uart_mode(&mode)?;

        ctl.set_rx_flow(true)
    }
}

// ── CY8MRLN touch controller ──────────────────────────────────────────────────

/// Fixed operating parameters for the touch panel scan stream.
///
/// The device is opened read-only; the raw-mode flag and flow control do
/// not apply.
pub struct Cy8mrln;

impl Cy8mrln {
    const SCAN_RATE_HZ: i32 = 60;
    const VERBOSE: i32 = 0;
    const TIMESTAMPS: i32 = 1;
    const WOT_THRESHOLD: i32 = 22;
}

impl SetupProcedure for Cy8mrln {
    fn apply(&self, ctl: &mut dyn DeviceControl, _raw_mode: bool) -> io::Result<()> {
        use super::control::SensorParam::*;

        ctl.set_sensor_param(ScanRate, Self::SCAN_RATE_HZ)?;
        ctl.set_sensor_param(Verbose, Self::VERBOSE)?;
        ctl.set_sensor_param(TimestampMode, Self::TIMESTAMPS)?;
        ctl.set_sensor_param(SleepMode, CY8MRLN_ON_STATE)?;
        ctl.set_sensor_param(WotScanRate, WOT_SCANRATE_512HZ)?;
        ctl.set_sensor_param(WotThreshold, Self::WOT_THRESHOLD)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::super::control::{MockDeviceControl, SensorParam, UartMode};
    use super::*;

    /// Records every control operation so tests can assert exact sequences.
    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        FlushInput,
        SetLine(LineSettings),
        RaiseModem(i32),
        FlushUartQueues(u32),
        GetUartMode,
        SetUartMode(UartMode),
        SetRxFlow(bool),
        SetSensor(SensorParam, i32),
    }

    struct Recorder {
        ops: Vec<Op>,
        /// Mode handed back by `uart_mode`, standing in for driver state.
        current_mode: UartMode,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                ops: Vec::new(),
                current_mode: UartMode {
                    speed: 38_400,
                    flags: 0,
                },
            }
        }

        fn with_mode(mode: UartMode) -> Self {
            Self {
                ops: Vec::new(),
                current_mode: mode,
            }
        }
    }

    impl DeviceControl for Recorder {
        fn set_line_settings(&mut self, settings: &LineSettings) -> io::Result<()> {
            self.ops.push(Op::SetLine(*settings));
            Ok(())
        }

        fn flush_input(&mut self) -> io::Result<()> {
            self.ops.push(Op::FlushInput);
            Ok(())
        }

        fn raise_modem_lines(&mut self, lines: i32) -> io::Result<()> {
            self.ops.push(Op::RaiseModem(lines));
            Ok(())
        }

        fn flush_uart_queues(&mut self, mask: u32) -> io::Result<()> {
            self.ops.push(Op::FlushUartQueues(mask));
            Ok(())
        }

        fn uart_mode(&mut self) -> io::Result<UartMode> {
            self.ops.push(Op::GetUartMode);
            Ok(self.current_mode)
        }

        fn set_uart_mode(&mut self, mode: &UartMode) -> io::Result<()> {
            self.ops.push(Op::SetUartMode(*mode));
            Ok(())
        }

        fn set_rx_flow(&mut self, enabled: bool) -> io::Result<()> {
            self.ops.push(Op::SetRxFlow(enabled));
            Ok(())
        }

        fn set_sensor_param(&mut self, param: SensorParam, value: i32) -> io::Result<()> {
            self.ops.push(Op::SetSensor(param, value));
            Ok(())
        }
    }

    // ── Plain serial ──────────────────────────────────────────────────────────

    #[test]
    fn test_serial_flushes_before_pushing_line_settings() {
        let mut ctl = Recorder::new();
        procedure_for(DeviceKind::Serial)
            .apply(&mut ctl, false)
            .unwrap();

        assert_eq!(ctl.ops[0], Op::FlushInput);
        assert!(matches!(ctl.ops[1], Op::SetLine(_)));
        assert_eq!(
            ctl.ops[2],
            Op::RaiseModem(libc::TIOCM_DTR | libc::TIOCM_RTS)
        );
        assert_eq!(ctl.ops.len(), 3);
    }

    #[test]
    fn test_serial_cooked_mode_line_settings() {
        let mut ctl = Recorder::new();
        procedure_for(DeviceKind::Serial)
            .apply(&mut ctl, false)
            .unwrap();

        let Op::SetLine(s) = &ctl.ops[1] else {
            panic!("second op must push line settings");
        };
        assert_eq!(s.input_flags, libc::IGNPAR as u32);
        assert_eq!(s.output_flags, 0);
        assert_eq!(
            s.control_flags,
            (libc::CRTSCTS | libc::CS8 | libc::CLOCAL | libc::CREAD) as u32
        );
        assert_eq!(s.local_flags, libc::ICANON as u32);
        assert_eq!(s.speed, libc::B115200 as u32);
        assert_eq!(s.eof_char, 4, "^D must stay enabled");
        assert_eq!(s.min_read, 1, "reads must block for at least one byte");
        assert_eq!(s.read_timeout, 0, "no inter-character timer");
    }

    #[test]
    fn test_serial_raw_mode_clears_local_flags() {
        let mut ctl = Recorder::new();
        procedure_for(DeviceKind::Serial)
            .apply(&mut ctl, true)
            .unwrap();

        let Op::SetLine(s) = &ctl.ops[1] else {
            panic!("second op must push line settings");
        };
        assert_eq!(s.local_flags, 0);
    }

    // ── High-speed UART ───────────────────────────────────────────────────────

    #[test]
    fn test_hsuart_flushes_all_queues_and_fifos_first() {
        let mut ctl = Recorder::new();
        procedure_for(DeviceKind::HsUart)
            .apply(&mut ctl, false)
            .unwrap();

        assert_eq!(
            ctl.ops[0],
            Op::FlushUartQueues(
                HSUART_RX_QUEUE | HSUART_TX_QUEUE | HSUART_RX_FIFO | HSUART_TX_FIFO
            )
        );
        assert_eq!(ctl.ops[1], Op::GetUartMode);
    }

    #[test]
    fn test_hsuart_rewrites_speed_parity_and_flow_control() {
        let mut ctl = Recorder::new();
        procedure_for(DeviceKind::HsUart)
            .apply(&mut ctl, false)
            .unwrap();

        let Op::SetUartMode(mode) = &ctl.ops[2] else {
            panic!("third op must write the mode back");
        };
        assert_eq!(mode.speed, 115_200);
        assert_eq!(mode.flags & HSUART_MODE_PARITY_MASK, HSUART_MODE_PARITY_NONE);
        assert_eq!(
            mode.flags & HSUART_MODE_FLOW_CTRL_MASK,
            HSUART_MODE_FLOW_CTRL_HW
        );
        assert_eq!(ctl.ops[3], Op::SetRxFlow(true));
    }

    #[test]
    fn test_hsuart_preserves_unrelated_mode_bits() {
        // Bits outside the parity and flow-control fields belong to the
        // driver and must survive the read-modify-write.
        let mut ctl = Recorder::with_mode(UartMode {
            speed: 9_600,
            flags: 0x100 | 0x2 /* parity even, to be cleared */,
        });
        procedure_for(DeviceKind::HsUart)
            .apply(&mut ctl, false)
            .unwrap();

        let Op::SetUartMode(mode) = &ctl.ops[2] else {
            panic!("third op must write the mode back");
        };
        assert_ne!(mode.flags & 0x100, 0, "driver-private bit was dropped");
        assert_eq!(mode.flags & HSUART_MODE_PARITY_MASK, HSUART_MODE_PARITY_NONE);
    }

    // ── CY8MRLN ───────────────────────────────────────────────────────────────

    #[test]
    fn test_cy8mrln_pushes_parameters_in_order() {
        let mut ctl = Recorder::new();
        procedure_for(DeviceKind::Cy8mrln)
            .apply(&mut ctl, false)
            .unwrap();

        assert_eq!(
            ctl.ops,
            vec![
                Op::SetSensor(SensorParam::ScanRate, 60),
                Op::SetSensor(SensorParam::Verbose, 0),
                Op::SetSensor(SensorParam::TimestampMode, 1),
                Op::SetSensor(SensorParam::SleepMode, CY8MRLN_ON_STATE),
                Op::SetSensor(SensorParam::WotScanRate, WOT_SCANRATE_512HZ),
                Op::SetSensor(SensorParam::WotThreshold, 22),
            ]
        );
    }

    // ── Shared contract ───────────────────────────────────────────────────────

    #[test]
    fn test_every_procedure_is_idempotent_in_effect() {
        for (kind, raw) in [
            (DeviceKind::Serial, false),
            (DeviceKind::Serial, true),
            (DeviceKind::HsUart, false),
            (DeviceKind::Cy8mrln, false),
        ] {
            let mut first = Recorder::new();
            procedure_for(kind).apply(&mut first, raw).unwrap();
            let mut second = Recorder::new();
            procedure_for(kind).apply(&mut second, raw).unwrap();
            assert_eq!(
                first.ops, second.ops,
                "{kind} setup must push the same absolute parameters every time"
            );
        }
    }

    #[test]
    fn test_failing_operation_aborts_the_procedure() {
        let mut mock = MockDeviceControl::new();
        mock.expect_flush_input()
            .times(1)
            .returning(|| Err(io::Error::new(io::ErrorKind::Other, "tcflush failed")));
        // No further operations may be attempted after the failure.
        mock.expect_set_line_settings().times(0);
        mock.expect_raise_modem_lines().times(0);

        let result = procedure_for(DeviceKind::Serial).apply(&mut mock, false);
        assert!(result.is_err());
    }
}
