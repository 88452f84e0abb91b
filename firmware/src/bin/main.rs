#![no_std]
#![no_main]

use controller_core::{Config, Dispatcher, EmbassyClock, MacroRunner, Profile};
use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{UART1, USB};
use embassy_rp::uart::{Config as UartConfig, Uart};
use embassy_rp::usb::Driver;
use embassy_usb::class::hid::{HidReader, State};
use embassy_usb::{Builder, UsbDevice};
use macro_engine::ScriptStore;
use macro_pad_firmware::usb_output::{
    configure_horipad, configure_pro_controller, usb_config, UsbDriver, PRO_REPORT_SIZE,
};
use macro_pad_firmware::{
    assets, autorun, heap, serve_commands, serve_host_reports, Control, HoriPad, ProPad,
    UartCommandLink, UsbReportSink, UsbStateHandler,
};
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    UART1_IRQ => embassy_rp::uart::InterruptHandler<UART1>;
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

/// USB device configuration buffers.
static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

static HID_STATE: StaticCell<State> = StaticCell::new();
static USB_HANDLER: StaticCell<UsbStateHandler> = StaticCell::new();

static CONFIG: StaticCell<Config> = StaticCell::new();
static STORE: StaticCell<ScriptStore> = StaticCell::new();
static CONTROL: Control = Control::new();
static PRO_PAD: StaticCell<ProPad> = StaticCell::new();
static HORI_PAD: StaticCell<HoriPad> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    heap::init_heap();
    info!("macro-pad starting...");

    let config: &'static Config = CONFIG.init(Config::from_json_or_default(assets::CONFIG_JSON));
    let store: &'static ScriptStore = STORE.init(ScriptStore::load(assets::MACRO_FILES));
    info!(
        "profile {}, {} macros, heap {} bytes used",
        config.profile.name(),
        store.len(),
        heap::ALLOCATOR.used()
    );

    let p = embassy_rp::init(embassy_rp::config::Config::default());

    // --- UART Setup ---
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = 115_200;

    #[cfg(not(feature = "uart-flow-control"))]
    let uart = Uart::new(
        p.UART1,
        p.PIN_8, // TX
        p.PIN_9, // RX
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    #[cfg(feature = "uart-flow-control")]
    let uart = Uart::new_with_rtscts(
        p.UART1,
        p.PIN_8,  // TX
        p.PIN_9,  // RX
        p.PIN_11, // RTS
        p.PIN_10, // CTS
        Irqs,
        p.DMA_CH0,
        p.DMA_CH1,
        uart_config,
    );
    let (tx, rx) = uart.split();
    let link = UartCommandLink::new(rx, tx);

    // --- USB Setup ---
    let usb_driver = Driver::new(p.USB, Irqs);

    let mut builder = Builder::new(
        usb_driver,
        usb_config(config.profile),
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        MSOS_DESCRIPTOR.init([0; 256]),
        CONTROL_BUF.init([0; 64]),
    );
    builder.handler(USB_HANDLER.init(UsbStateHandler));

    let hid_state = HID_STATE.init(State::new());

    match config.profile {
        Profile::ProController => {
            let (reader, writer) = configure_pro_controller(&mut builder, hid_state);
            let pad: &'static ProPad = PRO_PAD.init(ProPad::new(
                UsbReportSink::new(writer),
                EmbassyClock,
                config.timing,
            ));
            spawner.spawn(usb_task(builder.build()).unwrap());
            spawner.spawn(pro_periodic_task(pad).unwrap());
            spawner.spawn(pro_host_task(reader, pad).unwrap());
            spawner.spawn(pro_runner_task(store, pad).unwrap());
            spawner.spawn(pro_command_task(link, store, config, pad).unwrap());
        }
        Profile::HoripadS => {
            let writer = configure_horipad(&mut builder, hid_state);
            let pad: &'static HoriPad = HORI_PAD.init(HoriPad::new(
                UsbReportSink::new(writer),
                EmbassyClock,
                config.timing,
            ));
            spawner.spawn(usb_task(builder.build()).unwrap());
            spawner.spawn(hori_realtime_task(pad).unwrap());
            spawner.spawn(hori_runner_task(store, pad).unwrap());
            spawner.spawn(hori_command_task(link, store, config, pad).unwrap());
        }
    }
    spawner.spawn(autorun_task(store, config).unwrap());

    if store.is_empty() {
        warn!("no macros bundled");
    }
    info!("macro-pad initialized, waiting for commands...");
}

/// USB device task - runs the USB stack.
#[embassy_executor::task]
async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) {
    device.run().await;
}

#[embassy_executor::task]
async fn autorun_task(store: &'static ScriptStore, config: &'static Config) {
    autorun(store, config, &CONTROL).await;
}

#[embassy_executor::task]
async fn pro_periodic_task(pad: &'static ProPad) {
    pad.run_periodic().await;
}

#[embassy_executor::task]
async fn pro_host_task(
    reader: HidReader<'static, UsbDriver, PRO_REPORT_SIZE>,
    pad: &'static ProPad,
) {
    serve_host_reports(reader, pad).await;
}

#[embassy_executor::task]
async fn pro_runner_task(store: &'static ScriptStore, pad: &'static ProPad) {
    MacroRunner::new(store, pad, &CONTROL).run().await;
}

#[embassy_executor::task]
async fn pro_command_task(
    link: UartCommandLink<'static>,
    store: &'static ScriptStore,
    config: &'static Config,
    pad: &'static ProPad,
) {
    serve_commands(link, Dispatcher::new(store, config, pad, &CONTROL)).await;
}

#[embassy_executor::task]
async fn hori_realtime_task(pad: &'static HoriPad) {
    pad.run_realtime().await;
}

#[embassy_executor::task]
async fn hori_runner_task(store: &'static ScriptStore, pad: &'static HoriPad) {
    MacroRunner::new(store, pad, &CONTROL).run().await;
}

#[embassy_executor::task]
async fn hori_command_task(
    link: UartCommandLink<'static>,
    store: &'static ScriptStore,
    config: &'static Config,
    pad: &'static HoriPad,
) {
    serve_commands(link, Dispatcher::new(store, config, pad, &CONTROL)).await;
}
