//! W5500/DHCP link presented to the core as a polled link adapter
//!
//! The core never drives DHCP; it only observes whether the stack has an
//! address. That is the same contract as a cellular modem that attaches on
//! its own, so the link implements `CellularAdapter`.

use defmt::{info, warn};
use embassy_net::Stack;
use hal_abstractions::{CellularAdapter, EventSink, Ipv4Address, LinkInfo, NetworkEvent};

pub struct EthLink {
    stack: Stack<'static>,
}

impl EthLink {
    pub fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }
}

impl CellularAdapter for EthLink {
    fn is_connected(&self) -> bool {
        self.stack.is_link_up() && self.stack.is_config_up()
    }

    fn link_info(&self) -> Option<LinkInfo> {
        link_info(self.stack)
    }
}

fn link_info(stack: Stack<'_>) -> Option<LinkInfo> {
    let config = stack.config_v4()?;
    Some(LinkInfo {
        address: config.address.address().into(),
        subnet_mask: Ipv4Address::netmask(config.address.prefix_len()),
        gateway: config
            .gateway
            .map(Ipv4Address::from)
            .unwrap_or(Ipv4Address::UNSPECIFIED),
    })
}

/// Post `Disconnected`/`Connected` as DHCP leases are lost and regained
///
/// The initial bring-up is observed by polling; this only reports changes
/// after the first lease.
pub async fn monitor(stack: Stack<'static>, sink: &'static dyn EventSink) -> ! {
    stack.wait_config_up().await;
    loop {
        stack.wait_config_down().await;
        warn!("Network configuration lost");
        sink.post(NetworkEvent::Disconnected);

        stack.wait_config_up().await;
        match link_info(stack) {
            Some(link) => {
                info!("Network configuration regained: {}", link.address);
                sink.post(NetworkEvent::Connected(link));
            }
            None => warn!("Configuration up without an IPv4 address"),
        }
    }
}
