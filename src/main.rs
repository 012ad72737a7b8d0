//! Demo binary for `relaybridge`.
//!
//! Bridges both ends of an in-memory channel pair, sends a few packets that
//! exceed the channel's frame limit and reports what the far side
//! reassembled.

mod cli;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use relaybridge::{
    BridgeConfig,
    BridgeRegistry,
    DeviceBridge,
    DeviceId,
    HEADER_SIZE,
    LogMessage,
    Relay,
    RelayError,
    TypeNameHash,
    loopback::LoopbackChannel,
};

/// Relay printing everything it routes.
#[derive(Debug, Default)]
struct PrintingRelay {
    bridges: BridgeRegistry,
    received: AtomicUsize,
}

impl Relay for PrintingRelay {
    fn on_packet_received(&self, packet: &[u8], sender: &Arc<DeviceBridge>) -> Result<(), RelayError> {
        self.received.fetch_add(1, Ordering::SeqCst);
        println!("bridge {} reassembled {} bytes", sender.did(), packet.len());
        Ok(())
    }

    fn post_command_to_connector(&self, packet: &[u8], sender: &Arc<DeviceBridge>) -> Result<(), RelayError> {
        println!("bridge {} posted a {}-byte command", sender.did(), packet.len());
        Ok(())
    }

    fn detach_device(&self, did: DeviceId) { self.bridges.detach(did); }

    fn log(&self, message: LogMessage, did: DeviceId) { println!("bridge {did}: {message}"); }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    if cli.frame_limit <= HEADER_SIZE || cli.min_frame_size > cli.frame_limit {
        return Err(format!(
            "frame limit {} must exceed the {HEADER_SIZE}-byte header and the minimum frame size {}",
            cli.frame_limit, cli.min_frame_size
        )
        .into());
    }
    let relay = Arc::new(PrintingRelay::default());
    let config = BridgeConfig::default().with_min_frame_size(cli.min_frame_size);
    let delay = Duration::from_millis(cli.update_delay_ms);
    let hash = TypeNameHash::of("LoopbackChannel");

    let (near, far) = LoopbackChannel::pair(cli.frame_limit);
    let sender = DeviceBridge::builder(&relay, DeviceId::new(1), hash, Box::new(near))
        .config(config.clone())
        .build()?;
    let receiver = DeviceBridge::builder(&relay, DeviceId::new(2), hash, Box::new(far))
        .config(config)
        .build()?;

    for bridge in [&sender, &receiver] {
        bridge.attach();
        bridge.set_update_delay(delay);
        bridge.start_updating_in_separate_thread()?;
        relay.bridges.insert(Arc::clone(bridge));
    }

    for n in 0..cli.count {
        let packet: Vec<u8> = b"0123456789abcdef"
            .iter()
            .copied()
            .cycle()
            .skip(n)
            .take(cli.packet_size)
            .collect();
        sender.send_framed(&packet)?;
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while relay.received.load(Ordering::SeqCst) < cli.count && Instant::now() < deadline {
        thread::sleep(delay.max(Duration::from_millis(1)));
    }
    println!(
        "sent {} packets, far side reassembled {}",
        cli.count,
        relay.received.load(Ordering::SeqCst)
    );

    relay.bridges.shutdown_all();
    Ok(())
}
