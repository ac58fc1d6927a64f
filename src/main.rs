#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::{
    clock::ClockControl,
    gpio::{Io, Level, Pull},
    peripherals::Peripherals,
    prelude::*,
    rng::Rng,
    system::SystemControl,
    timer::timg::TimerGroup,
};
use esp_wifi::{
    current_millis, initialize,
    wifi::{utils::create_network_interface, WifiStaDevice},
    wifi_interface::WifiStack,
    EspWifiInitFor,
};
use smoltcp::iface::SocketStorage;

use ultrasonic_telemetry::config::{self, BrokerConfig};
use ultrasonic_telemetry::{CommandOutput, Device, Session, Ultrasonic};

mod adapters;
use adapters::{DelayAdapter, InputAdapter, OutputAdapter, SocketAdapter, StationAdapter, SystemClock};

#[entry]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = Peripherals::take();
    let system = SystemControl::new(peripherals.SYSTEM);
    let clocks = ClockControl::max(system.clock_control).freeze();

    let io = Io::new(peripherals.GPIO, peripherals.IO_MUX);

    // GPIO numbers follow config::{LED_GPIO, TRIGGER_GPIO, ECHO_GPIO}
    // LED is active low, start with it off
    let led = OutputAdapter::new(io.pins.gpio8, Level::High);
    let trigger = OutputAdapter::new(io.pins.gpio1, Level::Low);
    let echo = InputAdapter::new(io.pins.gpio0, Pull::Down);

    let delay = DelayAdapter::new(&clocks);
    let sensor = Ultrasonic::new(trigger, echo, delay, SystemClock);

    // Bring up the radio
    let timg0 = TimerGroup::new(peripherals.TIMG0, &clocks, None);
    let init = initialize(
        EspWifiInitFor::Wifi,
        timg0.timer0,
        Rng::new(peripherals.RNG),
        peripherals.RADIO_CLK,
        &clocks,
    )
    .unwrap();

    let mut socket_set_entries: [SocketStorage; 3] = Default::default();
    let (iface, device, controller, sockets) =
        create_network_interface(&init, peripherals.WIFI, WifiStaDevice, &mut socket_set_entries).unwrap();
    let wifi_stack = WifiStack::new(iface, device, sockets, current_millis);
    let station = StationAdapter::new(controller, &wifi_stack);

    let mut rx_buffer = [0u8; 1536];
    let mut tx_buffer = [0u8; 1536];
    let socket = wifi_stack.get_socket(&mut rx_buffer, &mut tx_buffer);

    let broker = BrokerConfig::watson();
    let session = Session::new(
        SocketAdapter::new(socket, &wifi_stack),
        SystemClock,
        broker.host,
        broker.port,
    );

    let mut device = Device::new(
        broker,
        session,
        station,
        sensor,
        CommandOutput::active_low(led),
        delay,
    );

    device.associate(config::WIFI_SSID, config::WIFI_PASS).unwrap();

    device.run()
}
