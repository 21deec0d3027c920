#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod delay;
mod eth;
mod led;
mod link;
mod network;
mod settings;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2, USART3])]
mod app {
    use super::*;
    use defmt::{error, info};
    use embassy_futures::join::join5;
    use embassy_net::Stack;
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, OutputType, Pull, Speed};
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::{khz, Hertz};
    use embassy_stm32::timer::low_level::CountingMode;
    use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use hal_abstractions::{Color, RgbOutput, Unsupported};
    use linkcheck_core::{LinkEvents, NetworkAdapter, Orchestrator, Settings};
    use rtic_monotonics::fugit::ExtU64;
    use rtic_sync::channel::{Receiver, Sender};
    use rtic_sync::make_channel;

    use delay::MonoDelay;
    use led::{LedCommand, LedHandle, RgbLed, LED_QUEUE_DEPTH};
    use link::EthLink;
    use network::{HttpTransport, NetworkConfig, SntpTimeSource};

    type SpiPeripheral = embassy_stm32::Peri<'static, peripherals::SPI2>;
    type PinPB13 = embassy_stm32::Peri<'static, peripherals::PB13>;
    type PinPB15 = embassy_stm32::Peri<'static, peripherals::PB15>;
    type PinPB14 = embassy_stm32::Peri<'static, peripherals::PB14>;
    type PinPC6 = embassy_stm32::Peri<'static, peripherals::PC6>;
    type PinPC3 = embassy_stm32::Peri<'static, peripherals::PC3>;
    type PinPC2 = embassy_stm32::Peri<'static, peripherals::PC2>;
    type ExtiChannel = embassy_stm32::Peri<'static, peripherals::EXTI2>;
    type DmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH4>;
    type DmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH3>;

    type BoardOrchestrator<'a> =
        Orchestrator<'a, CriticalSectionRawMutex, Unsupported, EthLink, LedHandle, MonoDelay>;

    /// Bytes of probe response body kept for logging
    const PROBE_BODY_LEN: usize = 1024;

    /// Time the error pattern stays up before a boot failure resets the board
    const RESTART_BACKOFF_SECS: u64 = 60;

    /// Events from the link monitor and SNTP to the connectivity core
    static EVENTS: LinkEvents<CriticalSectionRawMutex> = LinkEvents::new();

    struct NetworkPeripherals {
        spi: SpiPeripheral,
        sck: PinPB13,
        mosi: PinPB15,
        miso: PinPB14,
        cs: PinPC6,
        reset: PinPC3,
        int: PinPC2,
        exti: ExtiChannel,
        dma_tx: DmaTx,
        dma_rx: DmaRx,
    }

    /// TIM4 channels 1/3/4 on the SCL, D9 and D10 pads
    struct LedPeripherals {
        tim: embassy_stm32::Peri<'static, peripherals::TIM4>,
        red: embassy_stm32::Peri<'static, peripherals::PB6>,
        green: embassy_stm32::Peri<'static, peripherals::PB8>,
        blue: embassy_stm32::Peri<'static, peripherals::PB9>,
    }

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        status_led: Output<'static>,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("linkcheck starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        // VCO / DIVQ(7) = 48 MHz (USB clock)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        let p = embassy_stm32::init(config);
        info!("System initialized: SYSCLK=84MHz from 12MHz HSE");

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        // On-board red LED stays lit until the RGB LED task takes over
        let status_led = Output::new(p.PC1, Level::High, Speed::Low);

        let led_periph = LedPeripherals {
            tim: p.TIM4,
            red: p.PB6,
            green: p.PB8,
            blue: p.PB9,
        };

        let net_periph = NetworkPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            int: p.PC2,
            exti: p.EXTI2,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        let (led_tx, led_rx) = make_channel!(LedCommand, LED_QUEUE_DEPTH);

        led_task::spawn(led_periph, led_rx).ok();
        network_task::spawn(net_periph, led_tx).ok();

        (Shared {}, Local { status_led })
    }

    /// RGB LED task - owns the PWM timer and runs animations
    #[task(priority = 2, local = [status_led])]
    async fn led_task(
        cx: led_task::Context,
        periph: LedPeripherals,
        commands: Receiver<'static, LedCommand, LED_QUEUE_DEPTH>,
    ) {
        let pwm = SimplePwm::new(
            periph.tim,
            Some(PwmPin::new(periph.red, OutputType::PushPull)),
            None,
            Some(PwmPin::new(periph.green, OutputType::PushPull)),
            Some(PwmPin::new(periph.blue, OutputType::PushPull)),
            khz(1),
            CountingMode::EdgeAlignedUp,
        );
        let channels = pwm.split();
        let (mut red, mut green, mut blue) = (channels.ch1, channels.ch3, channels.ch4);
        red.enable();
        green.enable();
        blue.enable();

        cx.local.status_led.set_low();
        let mut led = RgbLed::new(red, green, blue);
        led.run(commands).await;
    }

    /// Network task - owns the stack and runs the connectivity core
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn network_task(
        _cx: network_task::Context,
        periph: NetworkPeripherals,
        led: Sender<'static, LedCommand, LED_QUEUE_DEPTH>,
    ) -> ! {
        use embassy_net::{Config, StackResources};
        use static_cell::StaticCell;

        info!("Network task started");
        let net_config = NetworkConfig::default();
        let mut led = LedHandle::new(led);

        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000); // 10 MHz for W5500

        let spi = Spi::new(
            periph.spi,
            periph.sck,
            periph.mosi,
            periph.miso,
            periph.dma_tx,
            periph.dma_rx,
            spi_config,
        );

        let cs = Output::new(periph.cs, Level::High, Speed::VeryHigh);
        let reset = Output::new(periph.reset, Level::High, Speed::Low);
        let int = ExtiInput::new(periph.int, periph.exti, Pull::Up);

        let eth_periph = eth::EthPeripherals {
            spi,
            cs,
            reset,
            int,
        };

        let (device, w5500_runner) = match eth::init_w5500(eth_periph, net_config.mac_addr).await
        {
            Ok(parts) => parts,
            Err(e) => {
                error!("Ethernet bring-up failed: {}", e);
                led.set_color(Color::RED);
                restart().await
            }
        };

        static RESOURCES: StaticCell<StackResources<5>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            net_config.seed,
        );
        info!("Network stack initialized with DHCP");

        let settings = Settings::from_source(settings::SETTINGS);
        let mut sntp = SntpTimeSource::new();
        let mut orchestrator: BoardOrchestrator<'_> = Orchestrator::new(
            &settings,
            NetworkAdapter::Cellular(EthLink::new(stack)),
            led,
            &EVENTS,
            MonoDelay,
        );
        orchestrator.attach_time_source(&mut sntp);

        let (_, _, _, _, never) = join5(
            w5500_runner.run(),
            net_runner.run(),
            sntp.run(stack),
            link::monitor(stack, &EVENTS),
            run_app(&mut orchestrator, stack),
        )
        .await;
        never
    }

    /// Boot, then probe forever; a failed boot shows the error pattern and resets
    async fn run_app(orchestrator: &mut BoardOrchestrator<'_>, stack: Stack<'static>) -> ! {
        if let Err(e) = orchestrator.boot().await {
            error!("Boot failed: {}", e);
            restart().await;
        }

        let mut http = HttpTransport::new(stack);
        let mut body = [0u8; PROBE_BODY_LEN];
        orchestrator.run(&mut http, &mut body).await
    }

    /// Hold the error pattern for [`RESTART_BACKOFF_SECS`], then reset the MCU
    async fn restart() -> ! {
        info!("Resetting in {} s", RESTART_BACKOFF_SECS);
        Mono::delay(RESTART_BACKOFF_SECS.secs()).await;
        cortex_m::peripheral::SCB::sys_reset()
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
