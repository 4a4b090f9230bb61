#![no_std]
#![no_main]
#![feature(type_alias_impl_trait)]
#![feature(impl_trait_in_assoc_type)]

use anyhow::anyhow;
use embassy_executor::{task, Spawner};
use embassy_time::{Delay, Duration, Ticker, Timer};
use embedded_storage::ReadStorage as _;
use esp_backtrace as _;
use esp_hal::{
    gpio::{Io, Level, Output},
    peripherals::UART2,
    uart::{self, UartRx},
    Async,
};
use esp_hal_embassy::main;
use log::{error, info, warn};
pub use swauth as lib;

use lib::{
    auth::{AuthSession, AuthStatus},
    config::Config,
    identity::{DeviceId, UID_RECORD_SIZE},
    modem::{ByteQueue, FrameError, FrameReader, Modem, QueueTransport, RX_QUEUE_SIZE},
    tick::Ticks,
};

extern crate alloc;

const MODEM_BAUD: u32 = 115_200;
const HEAP_SIZE: usize = 32 * 1024;

const CONFIG: Config = Config::from_build_env();

static MODEM_RX: ByteQueue<RX_QUEUE_SIZE> = ByteQueue::new();
static TICKS: Ticks = Ticks::new(CONFIG.auth_period_ms);

#[export_name = "custom_halt"]
pub fn custom_halt() -> ! {
    loop {
        esp_hal::reset::software_reset();
    }
}

#[main]
async fn main_task(spawner: Spawner) {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    let timg0 = esp_hal::timer::timg::TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timg0.timer0);

    esp_alloc::heap_allocator!(HEAP_SIZE);

    esp_println::logger::init_logger(log::LevelFilter::Info);

    let io = Io::new(peripherals.GPIO, peripherals.IO_MUX);

    let modem_pwrkey = Output::new(io.pins.gpio4, Level::High);
    let mut led = Output::new(io.pins.gpio2, Level::Low);

    let (modem_rx, modem_tx) = esp_hal::uart::Uart::new_async_with_config(
        peripherals.UART2,
        uart::config::Config {
            baudrate: MODEM_BAUD,
            data_bits: uart::config::DataBits::DataBits8,
            parity: uart::config::Parity::ParityNone,
            stop_bits: uart::config::StopBits::STOP1,
            ..Default::default()
        },
        io.pins.gpio26,
        io.pins.gpio27,
    )
    .expect("Failed to initialize modem UART")
    .split();

    spawner.spawn(modem_rx_task(modem_rx)).unwrap();
    spawner.spawn(tick_task()).unwrap();

    let uid = match read_uid(CONFIG.uid_addr) {
        Ok(uid) => uid,
        Err(e) => {
            error!("Device identity unusable: {:?}", e);
            halt().await
        }
    };
    info!("Device UID: {}", uid);

    let transport = QueueTransport::new(modem_tx, &MODEM_RX);
    let mut modem = Modem::new(transport, Delay, modem_pwrkey, CONFIG);

    if let Err(e) = modem.bring_up().await {
        error!("Modem setup failed with code {}: {}", e.code(), e);
        halt().await
    }
    if let Err(e) = modem.open_socket().await {
        error!("Modem setup failed with code {}: {}", e.code(), e);
        halt().await
    }

    let mut session = AuthSession::new(CONFIG.api_id, CONFIG.auth_timeout_s);
    let mut frames = FrameReader::new(modem.config());
    loop {
        if TICKS.take_heartbeat_due() {
            info!("Sending heartbeat");
            if let Err(e) = session.heartbeat(&mut modem, uid.as_str()).await {
                warn!("Heartbeat failed with code {}: {}", e.code(), e);
            }
        }

        let seconds = TICKS.take_seconds();
        if seconds > 0 {
            for _ in 0..seconds {
                session.on_second();
            }
            match session.status() {
                AuthStatus::Success => led.set_high(),
                AuthStatus::Authorizing if session.first_attempt() => led.toggle(),
                AuthStatus::Authorizing => {}
                AuthStatus::Fail => led.set_low(),
            }
        }

        match frames.poll(modem.engine()).await {
            Ok(_) => session.on_frame(frames.payload()),
            Err(FrameError::NoData) => {}
            Err(e) => warn!("Dropped inbound data: {}", e),
        }

        Timer::after(Duration::from_millis(1)).await;
    }
}

async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

fn read_uid(addr: u32) -> anyhow::Result<DeviceId> {
    let mut flash = esp_storage::FlashStorage::new();
    let mut record = [0u8; UID_RECORD_SIZE];
    flash
        .read(addr, &mut record)
        .map_err(|e| anyhow!("Failed to read UID record: {:?}", e))?;
    DeviceId::from_record(&record).map_err(|e| anyhow!("{}", e))
}

#[task]
async fn modem_rx_task(mut modem_rx: UartRx<'static, UART2, Async>) {
    loop {
        use embedded_io_async::Read as _;

        let mut buf = [0u8; 64];
        let Ok(len) = modem_rx.read(&mut buf).await else {
            continue;
        };
        if MODEM_RX.push(&buf[..len]) < len {
            warn!("Modem RX queue full, {} bytes dropped so far", MODEM_RX.dropped());
        }
    }
}

#[task]
async fn tick_task() -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(1));
    loop {
        TICKS.on_tick();
        ticker.next().await;
    }
}
