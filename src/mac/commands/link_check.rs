//! LinkCheckReq: link margin and gateway count of the uplink carrying the request.

use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

use super::queue_response;
use crate::mac::adr::demodulation_floor;
use crate::mac::command::{LinkCheckAns, MacCommand};
use crate::mac::device::EndDevice;
use crate::mac::event::Event;
use crate::mac::types::{DataRate, RxMetadata, UplinkMessage, PACKET_BROKER_GATEWAY_ID};
use crate::Error;

/// Distinct receiver of an uplink. Packet Broker forwarders count as one gateway each.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum GatewayKey<'a> {
    Gateway(&'a str),
    Forwarder { net_id: u32, tenant_id: &'a str, cluster_id: &'a str },
}

impl<'a> From<&'a RxMetadata> for GatewayKey<'a> {
    fn from(md: &'a RxMetadata) -> Self {
        match &md.packet_broker {
            Some(pb) if md.gateway_id == PACKET_BROKER_GATEWAY_ID => GatewayKey::Forwarder {
                net_id: pb.forwarder_net_id,
                tenant_id: &pb.forwarder_tenant_id,
                cluster_id: &pb.forwarder_cluster_id,
            },
            _ => GatewayKey::Gateway(&md.gateway_id),
        }
    }
}

fn link_check_ans(up: &UplinkMessage) -> Result<LinkCheckAns, Error> {
    let DataRate::Lora(data_rate) = up.settings.data_rate else {
        return Err(Error::InvalidDataRate);
    };
    let floor = demodulation_floor(&data_rate).ok_or(Error::InvalidDataRate)?;
    let margin = up
        .max_snr()
        .map_or(0, |snr| (snr - floor).clamp(0.0, f32::from(u8::MAX)) as u8);
    let gateways: BTreeSet<GatewayKey> = up.rx_metadata.iter().map(GatewayKey::from).collect();
    Ok(LinkCheckAns {
        margin,
        gateway_count: gateways.len().min(usize::from(u8::MAX)) as u8,
    })
}

/// Queues a LinkCheckAns describing the uplink that carried the request.
pub fn handle_link_check_req(dev: &mut EndDevice, up: &UplinkMessage) -> Result<Vec<Event>, Error> {
    let answer = link_check_ans(up)?;
    trace!("link check: margin {}, {} gateways", answer.margin, answer.gateway_count);
    let state = dev.mac_state_mut()?;
    Ok(vec![
        Event::IndicationReceived(MacCommand::LinkCheckReq),
        queue_response(state, MacCommand::LinkCheckAns(answer)),
    ])
}
