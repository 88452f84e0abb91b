//! USB HID output: device identities, report descriptors and the report
//! sink handed to the controller drivers.

use controller_core::{OutputError, Profile, ReportSink};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_usb::class::hid::{
    Config as HidConfig, HidBootProtocol, HidReader, HidReaderWriter, HidSubclass, HidWriter,
    ReadError, State,
};
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Config as UsbConfig, Handler};

pub type UsbDriver = Driver<'static, USB>;

/// Largest report on either profile.
pub const PRO_REPORT_SIZE: usize = 64;
pub const HORI_REPORT_SIZE: usize = 8;

/// HORIPAD S: 14 buttons, a hat nibble and four 8-bit axes, no report id.
pub const HORIPAD_S_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x05, // Usage (Gamepad)
    0xA1, 0x01, // Collection (Application)
    //
    // --- Buttons (14 + 2 padding bits) ---
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x35, 0x00, //   Physical Minimum (0)
    0x45, 0x01, //   Physical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x0E, //   Report Count (14)
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x0E, //   Usage Maximum (14)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x95, 0x02, //   Report Count (2)
    0x81, 0x01, //   Input (Constant)
    //
    // --- Hat switch (low nibble, 8 = centred) ---
    0x05, 0x01, //   Usage Page (Generic Desktop)
    0x25, 0x07, //   Logical Maximum (7)
    0x46, 0x3B, 0x01, //   Physical Maximum (315)
    0x75, 0x04, //   Report Size (4)
    0x95, 0x01, //   Report Count (1)
    0x65, 0x14, //   Unit (Degrees)
    0x09, 0x39, //   Usage (Hat Switch)
    0x81, 0x42, //   Input (Data, Variable, Absolute, Null State)
    0x65, 0x00, //   Unit (None)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x01, //   Input (Constant)
    //
    // --- Sticks (LX, LY, RX, RY) ---
    0x26, 0xFF, 0x00, //   Logical Maximum (255)
    0x46, 0xFF, 0x00, //   Physical Maximum (255)
    0x09, 0x30, //   Usage (X)
    0x09, 0x31, //   Usage (Y)
    0x09, 0x32, //   Usage (Z)
    0x09, 0x35, //   Usage (Rz)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x04, //   Report Count (4)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    // --- Vendor byte ---
    0x75, 0x08, //   Report Size (8)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x01, //   Input (Constant)
    0xC0, // End Collection
];

/// Pro Controller report descriptor (input 0x30/0x21/0x81, output
/// 0x01/0x10/0x80/0x82, 63 payload bytes each).
pub const PRO_CONTROLLER_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x15, 0x00, // Logical Minimum (0)
    0x09, 0x04, // Usage (Joystick)
    0xA1, 0x01, // Collection (Application)
    //
    // --- 0x30: full input report ---
    0x85, 0x30, //   Report ID (0x30)
    0x05, 0x01, //   Usage Page (Generic Desktop)
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x0A, //   Usage Maximum (10)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x0A, //   Report Count (10)
    0x55, 0x00, //   Unit Exponent (0)
    0x65, 0x00, //   Unit (None)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x0B, //   Usage Minimum (11)
    0x29, 0x0E, //   Usage Maximum (14)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x04, //   Report Count (4)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x02, //   Report Count (2)
    0x81, 0x03, //   Input (Constant, Variable)
    0x0B, 0x01, 0x00, 0x01, 0x00, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x0B, 0x30, 0x00, 0x01, 0x00, //     Usage (X)
    0x0B, 0x31, 0x00, 0x01, 0x00, //     Usage (Y)
    0x0B, 0x32, 0x00, 0x01, 0x00, //     Usage (Z)
    0x0B, 0x35, 0x00, 0x01, 0x00, //     Usage (Rz)
    0x15, 0x00, //     Logical Minimum (0)
    0x27, 0xFF, 0xFF, 0x00, 0x00, //     Logical Maximum (65535)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x04, //     Report Count (4)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0xC0, //   End Collection
    0x0B, 0x39, 0x00, 0x01, 0x00, //   Usage (Hat Switch)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x07, //   Logical Maximum (7)
    0x35, 0x00, //   Physical Minimum (0)
    0x46, 0x3B, 0x01, //   Physical Maximum (315)
    0x65, 0x14, //   Unit (Degrees)
    0x75, 0x04, //   Report Size (4)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x05, 0x09, //   Usage Page (Button)
    0x19, 0x0F, //   Usage Minimum (15)
    0x29, 0x12, //   Usage Maximum (18)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x04, //   Report Count (4)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x34, //   Report Count (52)
    0x81, 0x03, //   Input (Constant, Variable)
    //
    // --- Vendor reports ---
    0x06, 0x00, 0xFF, //   Usage Page (Vendor 0xFF00)
    0x85, 0x21, //   Report ID (0x21) subcommand reply
    0x09, 0x01, //   Usage (1)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x3F, //   Report Count (63)
    0x81, 0x03, //   Input (Constant, Variable)
    0x85, 0x81, //   Report ID (0x81) USB reply
    0x09, 0x02, //   Usage (2)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x3F, //   Report Count (63)
    0x81, 0x03, //   Input (Constant, Variable)
    0x85, 0x01, //   Report ID (0x01) rumble + subcommand
    0x09, 0x03, //   Usage (3)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x3F, //   Report Count (63)
    0x91, 0x83, //   Output (Constant, Variable, Volatile)
    0x85, 0x10, //   Report ID (0x10) rumble only
    0x09, 0x04, //   Usage (4)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x3F, //   Report Count (63)
    0x91, 0x83, //   Output (Constant, Variable, Volatile)
    0x85, 0x80, //   Report ID (0x80) USB command
    0x09, 0x05, //   Usage (5)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x3F, //   Report Count (63)
    0x91, 0x83, //   Output (Constant, Variable, Volatile)
    0x85, 0x82, //   Report ID (0x82)
    0x09, 0x06, //   Usage (6)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x3F, //   Report Count (63)
    0x91, 0x83, //   Output (Constant, Variable, Volatile)
    0xC0, // End Collection
];

/// Device identity the host sees for `profile`.
#[must_use]
pub fn usb_config(profile: Profile) -> UsbConfig<'static> {
    let mut config = match profile {
        Profile::ProController => {
            let mut c = UsbConfig::new(0x057E, 0x2009);
            c.manufacturer = Some("Nintendo Co., Ltd.");
            c.product = Some("Pro Controller");
            c.serial_number = Some("000000000001");
            c.device_release = 0x0200;
            c.max_power = 500;
            c
        }
        Profile::HoripadS => {
            let mut c = UsbConfig::new(0x0F0D, 0x00C1);
            c.manufacturer = Some("HORI CO.,LTD.");
            c.product = Some("HORIPAD S");
            c.max_power = 500;
            c
        }
    };
    config.max_packet_size_0 = 64;
    config
}

fn hid_config(descriptor: &'static [u8], poll_ms: u8, max_packet_size: u16) -> HidConfig<'static> {
    HidConfig {
        report_descriptor: descriptor,
        request_handler: None,
        poll_ms,
        max_packet_size,
        hid_subclass: HidSubclass::No,
        hid_boot_protocol: HidBootProtocol::None,
    }
}

/// Add the HORIPAD S interface (IN only).
pub fn configure_horipad(
    builder: &mut Builder<'static, UsbDriver>,
    state: &'static mut State<'static>,
) -> HidWriter<'static, UsbDriver, HORI_REPORT_SIZE> {
    let config = hid_config(HORIPAD_S_DESCRIPTOR, 1, HORI_REPORT_SIZE as u16);
    HidWriter::new(builder, state, config)
}

/// Add the Pro Controller interface (IN and OUT, 64-byte reports).
pub fn configure_pro_controller(
    builder: &mut Builder<'static, UsbDriver>,
    state: &'static mut State<'static>,
) -> (
    HidReader<'static, UsbDriver, PRO_REPORT_SIZE>,
    HidWriter<'static, UsbDriver, PRO_REPORT_SIZE>,
) {
    let config = hid_config(PRO_CONTROLLER_DESCRIPTOR, 8, PRO_REPORT_SIZE as u16);
    HidReaderWriter::<_, PRO_REPORT_SIZE, PRO_REPORT_SIZE>::new(builder, state, config).split()
}

fn endpoint_error(e: EndpointError) -> OutputError {
    match e {
        EndpointError::Disabled => OutputError::Disconnected,
        EndpointError::BufferOverflow => OutputError::Io,
    }
}

/// HID IN endpoint as a [`ReportSink`].
pub struct UsbReportSink<const N: usize> {
    writer: HidWriter<'static, UsbDriver, N>,
}

impl<const N: usize> UsbReportSink<N> {
    pub fn new(writer: HidWriter<'static, UsbDriver, N>) -> Self {
        Self { writer }
    }
}

impl<const N: usize> ReportSink for UsbReportSink<N> {
    async fn send_report(&mut self, report: &[u8]) -> Result<(), OutputError> {
        self.writer.write(report).await.map_err(endpoint_error)
    }
}

/// Read one host report into `buf`. Returns the report length.
pub async fn read_host_report(
    reader: &mut HidReader<'static, UsbDriver, PRO_REPORT_SIZE>,
    buf: &mut [u8; PRO_REPORT_SIZE],
) -> Result<usize, OutputError> {
    reader.read(buf).await.map_err(|e| match e {
        ReadError::Disabled => OutputError::Disconnected,
        ReadError::BufferOverflow | ReadError::Sync(_) => OutputError::Io,
    })
}

/// Raised once the host selects a configuration.
pub static USB_CONFIGURED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Tracks enumeration state for the autorun task.
pub struct UsbStateHandler;

impl Handler for UsbStateHandler {
    fn configured(&mut self, configured: bool) {
        if configured {
            defmt::info!("usb configured");
            USB_CONFIGURED.signal(());
        } else {
            defmt::info!("usb unconfigured");
            USB_CONFIGURED.reset();
        }
    }
}
